//! # Courtier
//!
//! Backend pieces of an insurance brokerage website: the session and
//! authorization core guarding the client area (`/espace-client`) and the
//! admin area (`/admin`), a client for the hosted identity provider that owns
//! the accounts, and the notification dispatcher that turns quote requests
//! into emails for the brokers.
//!
//! ## Authentication
//!
//! Accounts, password hashes, OAuth identities and tokens live in the hosted
//! identity provider. [`auth::SessionManager`] keeps the current principal in
//! sync with it, [`auth::is_admin`] decides privileges from the admin
//! allow-list and role metadata, and [`auth::RouteGuard`] turns both into a
//! render or redirect decision.
//!
//! A single locally configured administrator (first allow-listed email plus
//! `COURTIER_ADMIN_PASSWORD`) can sign in without the provider, which keeps
//! the admin area reachable while the provider is misconfigured.
//!
//! ## Quote notifications
//!
//! `POST /send-email` validates a quote request and forwards it to the
//! transactional email provider. See [`courtier`].

pub mod auth;
pub mod cli;
pub mod courtier;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
