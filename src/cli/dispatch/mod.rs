//! Maps validated CLI matches to an [`Action`].

use crate::auth::{Access, ProfileData};
use crate::cli::actions::{
    server,
    session::{self, Command},
    Action,
};
use crate::cli::commands::{
    auth, mail, CMD_LOGIN, CMD_LOGOUT, CMD_OAUTH, CMD_SERVER, CMD_SIGNUP, CMD_WHOAMI,
};
use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let (name, sub) = matches
        .subcommand()
        .context("missing subcommand, see --help")?;

    if name == CMD_SERVER {
        let port = sub.get_one::<u16>("port").copied().unwrap_or(8080);
        let mail = mail::Options::parse(sub)?.into_config();
        return Ok(Action::Server(server::Args { port, mail }));
    }

    let command = match name {
        CMD_LOGIN => Command::Login {
            email: required(sub, "email")?,
            password: secret(sub, "password")?,
        },
        CMD_SIGNUP => Command::SignUp {
            email: required(sub, "email")?,
            password: secret(sub, "password")?,
            profile: ProfileData {
                first_name: optional(sub, "first-name"),
                last_name: optional(sub, "last-name"),
                phone: optional(sub, "phone"),
                ..ProfileData::default()
            },
        },
        CMD_OAUTH => Command::OAuth {
            provider: required(sub, "provider")?,
        },
        CMD_WHOAMI => Command::WhoAmI {
            path: required(sub, "path")?,
            access: if sub.get_flag("admin") {
                Access::Admin
            } else {
                Access::Client
            },
        },
        CMD_LOGOUT => Command::Logout,
        other => return Err(anyhow!("unknown subcommand: {other}")),
    };

    Ok(Action::Session(session::Args {
        auth: auth::Options::parse(sub)?,
        command,
    }))
}

fn optional(matches: &ArgMatches, id: &str) -> Option<String> {
    matches
        .get_one::<String>(id)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(matches: &ArgMatches, id: &str) -> Result<String> {
    optional(matches, id).with_context(|| format!("missing required argument: --{id}"))
}

// kept verbatim, surrounding spaces belong to the secret
fn secret(matches: &ArgMatches, id: &str) -> Result<SecretString> {
    matches
        .get_one::<String>(id)
        .filter(|v| !v.is_empty())
        .map(|v| SecretString::from(v.clone()))
        .with_context(|| format!("missing required argument: --{id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    const AUTH_ENV: [(&str, Option<&str>); 2] = [
        ("COURTIER_AUTH_URL", Some("https://project.supabase.co")),
        ("COURTIER_AUTH_ANON_KEY", Some("anon")),
    ];

    #[test]
    fn server_action() {
        temp_env::with_vars(
            [
                ("COURTIER_PORT", Some("9090")),
                ("COURTIER_MAIL_TO", Some("broker@courtier.example")),
            ],
            || {
                let matches = commands::new().get_matches_from(vec!["courtier", "server"]);
                match handler(&matches) {
                    Ok(Action::Server(args)) => {
                        assert_eq!(args.port, 9090);
                        assert_eq!(args.mail.to, vec!["broker@courtier.example".to_string()]);
                    }
                    other => panic!("unexpected action: {other:?}"),
                }
            },
        );
    }

    #[test]
    fn signup_action_collects_profile() {
        temp_env::with_vars(AUTH_ENV, || {
            let matches = commands::new().get_matches_from(vec![
                "courtier",
                "signup",
                "--email",
                "jean@example.com",
                "--password",
                "hunter22",
                "--first-name",
                "Jean",
                "--phone",
                " ",
            ]);
            match handler(&matches) {
                Ok(Action::Session(session::Args {
                    command: Command::SignUp { email, profile, .. },
                    ..
                })) => {
                    assert_eq!(email, "jean@example.com");
                    assert_eq!(profile.first_name.as_deref(), Some("Jean"));
                    assert_eq!(profile.last_name, None);
                    assert_eq!(profile.phone, None);
                }
                other => panic!("unexpected action: {other:?}"),
            }
        });
    }

    #[test]
    fn whoami_admin_flag() {
        temp_env::with_vars(AUTH_ENV, || {
            let matches = commands::new().get_matches_from(vec![
                "courtier", "whoami", "--path", "/admin", "--admin",
            ]);
            match handler(&matches) {
                Ok(Action::Session(session::Args {
                    command: Command::WhoAmI { path, access },
                    ..
                })) => {
                    assert_eq!(path, "/admin");
                    assert_eq!(access, Access::Admin);
                }
                other => panic!("unexpected action: {other:?}"),
            }
        });
    }

    #[test]
    fn login_password_is_not_trimmed() {
        temp_env::with_vars(AUTH_ENV, || {
            let matches = commands::new().get_matches_from(vec![
                "courtier",
                "login",
                "--email",
                " a@x.com ",
                "--password",
                "  secret123  ",
            ]);
            match handler(&matches) {
                Ok(Action::Session(session::Args {
                    command: Command::Login { email, password },
                    ..
                })) => {
                    assert_eq!(email, "a@x.com");
                    assert_eq!(password.expose_secret(), "  secret123  ");
                }
                other => panic!("unexpected action: {other:?}"),
            }
        });
    }

    #[test]
    fn blank_auth_url_is_rejected() {
        temp_env::with_vars(
            [
                ("COURTIER_AUTH_URL", Some(" ")),
                ("COURTIER_AUTH_ANON_KEY", Some("anon")),
            ],
            || {
                let matches = commands::new().get_matches_from(vec!["courtier", "logout"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err
                        .to_string()
                        .contains("missing required argument: --auth-url"));
                }
            },
        );
    }
}
