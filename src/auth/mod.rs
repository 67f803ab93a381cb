//! Session and authorization core for the client and admin areas.
//!
//! Flow Overview: [`SessionManager`] initializes from a [`CredentialStore`]
//! (normally [`HostedStore`]), follows its change feed and publishes a
//! [`SessionState`]. [`RouteGuard`] reads that state and asks [`is_admin`]
//! whether the principal may see an admin view. Configuration is loaded once
//! into [`AuthConfig`] and passed in explicitly.
//!
//! This module handles passwords and provider tokens; neither may be logged.

mod config;
mod feed;
mod guard;
mod hosted;
mod policy;
mod principal;
mod provider;
mod session;

pub use config::{
    normalize_email, AdminAllowList, AuthConfig, FallbackAdmin, CLIENT_AREA_PATH, SIGN_IN_PATH,
};
pub use feed::{AuthChange, AuthEvent, ChangeFeed, Subscription, SubscriptionHandle};
pub use guard::{Access, GuardOutcome, RouteGuard, REDIRECT_PARAM};
pub use hosted::{HostedStore, HostedStoreConfig};
pub use policy::is_admin;
pub use principal::{LocalAdmin, Principal, RoleClaim, Session, User};
pub use provider::{CredentialStore, ProfileData, ProfileRow, ProviderError};
pub use session::{SessionManager, SessionState};
