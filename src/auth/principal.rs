//! Provider-owned records (users, sessions) and the authenticated principal
//! the rest of the crate works with. Records are read-only snapshots; tokens
//! are never printed by `Debug`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::SystemTime;
use uuid::Uuid;

pub const ADMIN_ROLE: &str = "admin";
pub const ROLE_KEY: &str = "role";
pub const ADMIN_FLAG_KEY: &str = "is_admin";

/// User record as returned by the hosted identity provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Provider-controlled metadata.
    #[serde(default)]
    pub app_metadata: Map<String, Value>,
    /// Self-service metadata.
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds.
    pub expires_at: i64,
    pub user: User,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

pub(crate) fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Administrator signed in through the local fallback credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalAdmin {
    id: Uuid,
    email: String,
}

impl LocalAdmin {
    /// The identifier is a UUID v5 of the email, so it is stable across restarts.
    #[must_use]
    pub fn new(email: &str) -> Self {
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("mailto:{email}").as_bytes()),
            email: email.to_string(),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Principal {
    Provider(User),
    Local(LocalAdmin),
}

impl Principal {
    #[must_use]
    pub fn id(&self) -> String {
        match self {
            Self::Provider(user) => user.id.clone(),
            Self::Local(admin) => admin.id().to_string(),
        }
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        match self {
            Self::Provider(user) => user.email.as_deref(),
            Self::Local(admin) => Some(admin.email()),
        }
    }

    /// Role claims, application metadata first, then user metadata.
    /// A local administrator always reports `admin` with the flag set.
    #[must_use]
    pub fn role_claims(&self) -> [RoleClaim<'_>; 2] {
        match self {
            Self::Provider(user) => [
                RoleClaim::from_metadata(&user.app_metadata),
                RoleClaim::from_metadata(&user.user_metadata),
            ],
            Self::Local(_) => [LOCAL_ADMIN_CLAIM, RoleClaim::default()],
        }
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

/// Role and admin flag read from one metadata map. Missing keys and values
/// of the wrong JSON type read as `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoleClaim<'a> {
    pub role: Option<&'a str>,
    pub is_admin: Option<bool>,
}

const LOCAL_ADMIN_CLAIM: RoleClaim<'static> = RoleClaim {
    role: Some(ADMIN_ROLE),
    is_admin: Some(true),
};

impl<'a> RoleClaim<'a> {
    #[must_use]
    pub fn from_metadata(metadata: &'a Map<String, Value>) -> Self {
        Self {
            role: metadata.get(ROLE_KEY).and_then(Value::as_str),
            is_admin: metadata.get(ADMIN_FLAG_KEY).and_then(Value::as_bool),
        }
    }

    #[must_use]
    pub fn grants_admin(&self) -> bool {
        self.role == Some(ADMIN_ROLE) || self.is_admin == Some(true)
    }
}
