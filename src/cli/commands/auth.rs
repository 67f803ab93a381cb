use crate::auth::{AuthConfig, HostedStoreConfig};
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use url::Url;

pub const ARG_ADMIN_EMAILS: &str = "admin-emails";
pub const ARG_ADMIN_PASSWORD: &str = "admin-password";
pub const ARG_AUTH_URL: &str = "auth-url";
pub const ARG_AUTH_ANON_KEY: &str = "auth-anon-key";
pub const ARG_PROFILE_TABLE: &str = "profile-table";
pub const ARG_SITE_URL: &str = "site-url";
pub const ARG_SESSION_FILE: &str = "session-file";

#[derive(Debug)]
pub struct Options {
    pub admin_emails: String,
    pub admin_password: Option<SecretString>,
    pub auth_url: Url,
    pub anon_key: SecretString,
    pub profile_table: String,
    pub site_url: Url,
    pub session_file: Option<PathBuf>,
}

impl Options {
    /// Parse identity provider and admin arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing or a URL is invalid.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        // Helper to filter empty strings which clap might pass through if env vars are set to ""
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let auth_url = get_non_empty(ARG_AUTH_URL)
            .with_context(|| format!("missing required argument: --{ARG_AUTH_URL}"))?;
        let auth_url = Url::parse(&auth_url).context("invalid COURTIER_AUTH_URL")?;

        let anon_key = get_non_empty(ARG_AUTH_ANON_KEY)
            .with_context(|| format!("missing required argument: --{ARG_AUTH_ANON_KEY}"))?;

        let site_url = get_non_empty(ARG_SITE_URL)
            .with_context(|| format!("missing required argument: --{ARG_SITE_URL}"))?;
        let site_url = Url::parse(&site_url).context("invalid COURTIER_SITE_URL")?;

        let session_file = matches
            .get_one::<PathBuf>(ARG_SESSION_FILE)
            .cloned()
            .or_else(default_session_file);

        Ok(Self {
            admin_emails: get_non_empty(ARG_ADMIN_EMAILS).unwrap_or_default(),
            admin_password: get_non_empty(ARG_ADMIN_PASSWORD).map(SecretString::from),
            auth_url,
            anon_key: SecretString::from(anon_key),
            profile_table: get_non_empty(ARG_PROFILE_TABLE)
                .unwrap_or_else(|| "profiles".to_string()),
            site_url,
            session_file,
        })
    }

    #[must_use]
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(
            &self.admin_emails,
            self.admin_password.as_ref().map(|p| p.expose_secret()),
            self.site_url.clone(),
        )
    }

    #[must_use]
    pub fn store_config(&self) -> HostedStoreConfig {
        HostedStoreConfig::new(self.auth_url.clone(), self.anon_key.clone())
            .with_profile_table(&self.profile_table)
            .with_session_file(self.session_file.clone())
    }
}

fn default_session_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join(env!("CARGO_PKG_NAME")).join("session.json"))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AUTH_URL)
                .long(ARG_AUTH_URL)
                .help("Hosted identity provider base URL, example: https://<project>.supabase.co")
                .env("COURTIER_AUTH_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_AUTH_ANON_KEY)
                .long(ARG_AUTH_ANON_KEY)
                .help("Public (anon) API key of the identity provider")
                .env("COURTIER_AUTH_ANON_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_PROFILE_TABLE)
                .long(ARG_PROFILE_TABLE)
                .help("Table receiving the profile row of new accounts")
                .env("COURTIER_PROFILE_TABLE")
                .default_value("profiles"),
        )
        .arg(
            Arg::new(ARG_SITE_URL)
                .long(ARG_SITE_URL)
                .help("Public site URL, used as the OAuth return target base")
                .env("COURTIER_SITE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_SESSION_FILE)
                .long(ARG_SESSION_FILE)
                .help("Provider session file [default: <cache dir>/courtier/session.json]")
                .env("COURTIER_SESSION_FILE")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_ADMIN_EMAILS)
                .long(ARG_ADMIN_EMAILS)
                .help("Comma-separated administrator emails")
                .env("COURTIER_ADMIN_EMAILS")
                .default_value(""),
        )
        .arg(
            Arg::new(ARG_ADMIN_PASSWORD)
                .long(ARG_ADMIN_PASSWORD)
                .help("Local password of the first administrator, for sign-in without the provider")
                .env("COURTIER_ADMIN_PASSWORD")
                .hide_env_values(true),
        )
}
