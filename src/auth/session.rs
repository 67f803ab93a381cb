//! Session manager: the single source of truth for who is signed in.
//!
//! Flow Overview: `initialize` publishes `Loading`, subscribes to the credential
//! store's change feed, then asks for the current session once. Every later
//! notification overwrites the published state (last write wins). Consumers
//! read the state through `watch` receivers and never mutate it.
//!
//! The local fallback administrator is resolved here, before the credential
//! store is contacted, so the admin area stays reachable when the provider is
//! down or not provisioned yet.

use crate::auth::{
    config::{normalize_email, AuthConfig},
    feed::SubscriptionHandle,
    policy,
    principal::{LocalAdmin, Principal, User},
    provider::{CredentialStore, ProfileData, ProviderError},
};
use std::sync::Arc;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, instrument, warn};
use url::Url;

#[derive(Clone, Debug, Default, PartialEq)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Loading,
    Ready(Option<Principal>),
}

impl SessionState {
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Ready(principal) => principal.as_ref(),
            Self::Uninitialized | Self::Loading => None,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Live change subscription plus the task applying its events.
struct ActiveSubscription {
    _handle: SubscriptionHandle,
    forwarder: JoinHandle<()>,
}

impl Drop for ActiveSubscription {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

pub struct SessionManager<S> {
    store: Arc<S>,
    config: Arc<AuthConfig>,
    state: Arc<watch::Sender<SessionState>>,
    subscription: Mutex<Option<ActiveSubscription>>,
}

impl<S: CredentialStore + 'static> SessionManager<S> {
    #[must_use]
    pub fn new(store: Arc<S>, config: Arc<AuthConfig>) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);

        Self {
            store,
            config,
            state: Arc::new(state),
            subscription: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Read-only view of the session state that follows every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn current_principal(&self) -> Option<Principal> {
        self.state.borrow().principal().cloned()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        policy::is_admin(self.state.borrow().principal(), self.config.admins())
    }

    /// Subscribe to the credential store and resolve the current session.
    /// Calling it again on an initialized manager does nothing.
    ///
    /// # Errors
    /// Propagates the credential store error if the current session cannot be
    /// read; the subscription is released and the state returns to
    /// `Uninitialized`.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<(), ProviderError> {
        let mut active = self.subscription.lock().await;
        if active.is_some() {
            debug!("Session manager already initialized");
            return Ok(());
        }

        self.state.send_replace(SessionState::Loading);

        let (handle, mut events) = self.store.on_session_change().into_parts();
        let state = self.state.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(change) = events.recv().await {
                debug!(event = ?change.event, "Session change");
                state.send_replace(SessionState::Ready(
                    change.session.map(|session| Principal::Provider(session.user)),
                ));
            }
        });
        let subscription = ActiveSubscription {
            _handle: handle,
            forwarder,
        };

        match self.store.current_session().await {
            Ok(session) => {
                let principal = session.map(|session| Principal::Provider(session.user));
                // a notification that already arrived is newer than this answer
                self.state.send_if_modified(|current| {
                    if matches!(current, SessionState::Loading) {
                        *current = SessionState::Ready(principal);
                        true
                    } else {
                        false
                    }
                });
                *active = Some(subscription);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to read the current session: {e}");
                drop(subscription);
                self.state.send_replace(SessionState::Uninitialized);
                Err(e)
            }
        }
    }

    /// Release the change subscription. The last published state is kept.
    pub async fn shutdown(&self) {
        if self.subscription.lock().await.take().is_some() {
            debug!("Session subscription released");
        }
    }

    /// Create an account and, when the provider returns the new user, its
    /// profile row. A failed profile insert is returned as is; the account
    /// itself stays created.
    ///
    /// # Errors
    /// Propagates credential store errors unchanged.
    #[instrument(skip_all)]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &ProfileData,
    ) -> Result<Option<User>, ProviderError> {
        let user = self.store.sign_up(email, password, profile).await?;

        if let Some(user) = &user {
            if let Err(e) = self.store.insert_profile(user, profile).await {
                warn!(user_id = %user.id, "Account created but profile insert failed: {e}");
                return Err(e);
            }
            info!(user_id = %user.id, "Account created");
        }

        Ok(user)
    }

    /// Sign in with email and password.
    ///
    /// The email is trimmed and lower-cased first. An exact match on the
    /// configured fallback administrator signs in locally without contacting
    /// the credential store; that session lasts until `sign_out` or restart.
    ///
    /// # Errors
    /// Propagates credential store errors unchanged, including invalid
    /// credentials for the fallback email with a wrong password.
    #[instrument(skip_all)]
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Principal>, ProviderError> {
        let email = normalize_email(email);

        if let Some(admin) = self
            .config
            .fallback()
            .filter(|admin| admin.matches(&email, password))
        {
            info!("Signed in with the local administrator credential");
            let principal = Principal::Local(LocalAdmin::new(admin.email()));
            self.publish(Some(principal.clone()));
            return Ok(Some(principal));
        }

        let principal = self
            .store
            .sign_in_with_password(&email, password)
            .await?
            .map(Principal::Provider);

        if principal.is_some() {
            self.publish(principal.clone());
        } else {
            debug!("Provider accepted the credentials without returning a user");
        }

        Ok(principal)
    }

    /// URL of the federated sign-in flow for `provider`. The caller navigates
    /// to it; the state changes later through the change feed.
    ///
    /// # Errors
    /// Returns the credential store error if the redirect cannot be set up.
    #[instrument(skip(self))]
    pub async fn sign_in_with_provider(&self, provider: &str) -> Result<Url, ProviderError> {
        self.store
            .sign_in_with_oauth(provider, &self.config.oauth_return_url())
            .await
    }

    /// Sign out. Always ends with no current principal, whatever the
    /// credential store answers.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        match self.store.sign_out().await {
            Ok(()) => debug!("Provider session closed"),
            Err(ProviderError::NotLoggedIn) => debug!("No provider session to close"),
            Err(e) => warn!("Provider sign-out failed, clearing local session anyway: {e}"),
        }

        self.publish(None);
    }

    fn publish(&self, principal: Option<Principal>) {
        self.state.send_replace(SessionState::Ready(principal));
    }
}
