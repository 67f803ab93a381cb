//! Route guard for the client and admin areas. Evaluated on every render of a
//! protected view; it never errors, it only picks one outcome.

use crate::auth::{
    config::{AuthConfig, CLIENT_AREA_PATH, SIGN_IN_PATH},
    policy,
    principal::Principal,
    session::SessionState,
};
use std::sync::Arc;
use url::form_urlencoded;

/// Query parameter carrying the originally requested location.
pub const REDIRECT_PARAM: &str = "redirect";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Any signed-in principal.
    Client,
    /// Principals the authorization policy accepts as administrators.
    Admin,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GuardOutcome {
    /// Session still resolving: show a neutral waiting indicator only.
    Waiting,
    /// Nobody signed in: go to the sign-in entry point, then come back.
    SignIn { location: String },
    /// Signed in without the privilege: silent move to the client area.
    Downgrade { location: String },
    Render(Principal),
}

impl GuardOutcome {
    #[must_use]
    pub fn redirect(&self) -> Option<&str> {
        match self {
            Self::SignIn { location } | Self::Downgrade { location } => Some(location),
            Self::Waiting | Self::Render(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RouteGuard {
    config: Arc<AuthConfig>,
    sign_in_path: String,
    landing_path: String,
}

impl RouteGuard {
    #[must_use]
    pub fn new(config: Arc<AuthConfig>) -> Self {
        Self {
            config,
            sign_in_path: SIGN_IN_PATH.to_string(),
            landing_path: CLIENT_AREA_PATH.to_string(),
        }
    }

    #[must_use]
    pub fn with_paths(mut self, sign_in_path: &str, landing_path: &str) -> Self {
        self.sign_in_path = sign_in_path.to_string();
        self.landing_path = landing_path.to_string();
        self
    }

    #[must_use]
    pub fn evaluate(&self, state: &SessionState, requested: &str, access: Access) -> GuardOutcome {
        let principal = match state {
            SessionState::Uninitialized | SessionState::Loading => return GuardOutcome::Waiting,
            SessionState::Ready(None) => {
                return GuardOutcome::SignIn {
                    location: self.sign_in_location(requested),
                }
            }
            SessionState::Ready(Some(principal)) => principal,
        };

        if access == Access::Admin && !policy::is_admin(Some(principal), self.config.admins()) {
            return GuardOutcome::Downgrade {
                location: self.landing_path.clone(),
            };
        }

        GuardOutcome::Render(principal.clone())
    }

    fn sign_in_location(&self, requested: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(requested.as_bytes()).collect();
        format!("{}?{REDIRECT_PARAM}={encoded}", self.sign_in_path)
    }
}
