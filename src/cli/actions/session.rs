//! Session commands run against the hosted identity provider.
//!
//! Each invocation builds a [`SessionManager`] over a [`HostedStore`] whose
//! session file carries the provider session from one command to the next.
//! The local administrator session is process-scoped and ends with the command.

use crate::{
    auth::{
        is_admin, Access, AuthConfig, GuardOutcome, HostedStore, Principal, ProfileData,
        RouteGuard, SessionManager,
    },
    cli::commands::auth::Options,
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug)]
pub enum Command {
    Login {
        email: String,
        password: SecretString,
    },
    SignUp {
        email: String,
        password: SecretString,
        profile: ProfileData,
    },
    OAuth {
        provider: String,
    },
    WhoAmI {
        path: String,
        access: Access,
    },
    Logout,
}

#[derive(Debug)]
pub struct Args {
    pub auth: Options,
    pub command: Command,
}

/// Execute a session command.
/// # Errors
/// Returns an error if the provider cannot be reached or rejects the request.
pub async fn execute(args: Args) -> Result<()> {
    let store = HostedStore::new(args.auth.store_config())
        .context("Failed to build the identity provider client")?;
    let config = Arc::new(args.auth.auth_config());
    let manager = SessionManager::new(Arc::new(store), config.clone());

    if let Err(e) = manager.initialize().await {
        // the local administrator signs in without any provider state
        if !matches!(args.command, Command::Login { .. }) {
            return Err(e).context("Failed to load the current session");
        }
        warn!("Current session unavailable, continuing with sign-in: {e}");
    }

    let result = run(&manager, &config, args.command).await;

    manager.shutdown().await;

    result
}

async fn run(
    manager: &SessionManager<HostedStore>,
    config: &Arc<AuthConfig>,
    command: Command,
) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let principal = manager
                .sign_in(&email, password.expose_secret())
                .await
                .context("Sign-in failed")?;
            match principal {
                Some(principal) => println!("Signed in as {}", describe(&principal, config)),
                None => println!("Credentials accepted, no session returned yet"),
            }
        }
        Command::SignUp {
            email,
            password,
            profile,
        } => {
            let user = manager
                .sign_up(&email, password.expose_secret(), &profile)
                .await
                .context("Sign-up failed")?;
            match user {
                Some(user) => println!("Account created: {}", user.id),
                None => println!("Account requested, confirm the email address to finish"),
            }
        }
        Command::OAuth { provider } => {
            let url = manager
                .sign_in_with_provider(&provider)
                .await
                .context("Federated sign-in unavailable")?;
            println!("{url}");
        }
        Command::WhoAmI { path, access } => {
            let guard = RouteGuard::new(config.clone());
            println!("{}", outcome_line(&guard.evaluate(&manager.state(), &path, access), config));
        }
        Command::Logout => {
            manager.sign_out().await;
            println!("Signed out");
        }
    }

    Ok(())
}

fn outcome_line(outcome: &GuardOutcome, config: &AuthConfig) -> String {
    match outcome {
        GuardOutcome::Waiting => "Session still loading".to_string(),
        GuardOutcome::SignIn { location } => format!("Not signed in, redirect to {location}"),
        GuardOutcome::Downgrade { location } => {
            format!("Not an administrator, redirect to {location}")
        }
        GuardOutcome::Render(principal) => describe(principal, config),
    }
}

fn describe(principal: &Principal, config: &AuthConfig) -> String {
    let mut line = format!(
        "{} <{}>",
        principal.id(),
        principal.email().unwrap_or("no email")
    );
    if is_admin(Some(principal), config.admins()) {
        line.push_str(" [admin]");
    }
    if principal.is_local() {
        line.push_str(" [local]");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{LocalAdmin, User};
    use serde_json::Map;
    use url::Url;

    fn config() -> AuthConfig {
        AuthConfig::new(
            "admin@x.com",
            Some("secret123"),
            Url::parse("https://courtier.example").unwrap(),
        )
    }

    #[test]
    fn describe_flags_local_admin() {
        let admin = Principal::Local(LocalAdmin::new("admin@x.com"));
        let line = describe(&admin, &config());
        assert!(line.contains("<admin@x.com>"));
        assert!(line.ends_with("[admin] [local]"));
    }

    #[test]
    fn describe_plain_client() {
        let client = Principal::Provider(User {
            id: "u-1".to_string(),
            email: None,
            app_metadata: Map::new(),
            user_metadata: Map::new(),
        });
        assert_eq!(describe(&client, &config()), "u-1 <no email>");
    }

    #[test]
    fn outcome_lines() {
        let line = outcome_line(
            &GuardOutcome::SignIn {
                location: "/connexion?redirect=%2Fadmin".to_string(),
            },
            &config(),
        );
        assert_eq!(line, "Not signed in, redirect to /connexion?redirect=%2Fadmin");
        assert_eq!(outcome_line(&GuardOutcome::Waiting, &config()), "Session still loading");
    }
}
