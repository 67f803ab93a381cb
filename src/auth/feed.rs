//! Session-change feed. A credential store publishes [`AuthChange`]s; every
//! subscriber gets its own ordered channel and a [`SubscriptionHandle`] that
//! removes it from the feed exactly once, either explicitly or on drop.

use crate::auth::principal::Session;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// One notification: what happened and the session that is current after it.
#[derive(Clone, Debug)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    senders: HashMap<u64, mpsc::UnboundedSender<AuthChange>>,
}

#[derive(Clone, Default)]
pub struct ChangeFeed {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl ChangeFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();

        let id = {
            let mut subscribers = self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            subscribers.senders.insert(id, tx);
            id
        };

        let feed: Weak<Mutex<Subscribers>> = Arc::downgrade(&self.subscribers);
        let handle = SubscriptionHandle::new(move || {
            if let Some(subscribers) = feed.upgrade() {
                subscribers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .senders
                    .remove(&id);
            }
        });

        Subscription { events: rx, handle }
    }

    /// Deliver a change to every live subscriber, dropping closed ones.
    pub fn publish(&self, change: &AuthChange) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .senders
            .retain(|_, tx| tx.send(change.clone()).is_ok());
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .senders
            .len()
    }
}

impl fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Releases a subscription. Release runs at most once.
pub struct SubscriptionHandle {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<AuthChange>,
    handle: SubscriptionHandle,
}

impl Subscription {
    pub async fn next(&mut self) -> Option<AuthChange> {
        self.events.recv().await
    }

    #[must_use]
    pub fn into_parts(self) -> (SubscriptionHandle, mpsc::UnboundedReceiver<AuthChange>) {
        (self.handle, self.events)
    }
}
