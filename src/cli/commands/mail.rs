use crate::courtier::mail::{MailConfig, DEFAULT_MAIL_API_URL, DEFAULT_MAIL_FROM};
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use url::Url;

pub const ARG_MAIL_API_URL: &str = "mail-api-url";
pub const ARG_MAIL_API_KEY: &str = "mail-api-key";
pub const ARG_MAIL_FROM: &str = "mail-from";
pub const ARG_MAIL_TO: &str = "mail-to";

#[derive(Debug)]
pub struct Options {
    pub api_url: Url,
    pub api_key: Option<SecretString>,
    pub from: String,
    pub to: String,
}

impl Options {
    /// Parse email provider arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the API URL is invalid.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let api_url = get_non_empty(ARG_MAIL_API_URL)
            .unwrap_or_else(|| DEFAULT_MAIL_API_URL.to_string());

        Ok(Self {
            api_url: Url::parse(&api_url).context("invalid COURTIER_MAIL_API_URL")?,
            api_key: get_non_empty(ARG_MAIL_API_KEY).map(SecretString::from),
            from: get_non_empty(ARG_MAIL_FROM).unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
            to: get_non_empty(ARG_MAIL_TO).unwrap_or_default(),
        })
    }

    #[must_use]
    pub fn into_config(self) -> MailConfig {
        MailConfig::new(self.api_url, self.api_key)
            .with_from(&self.from)
            .with_recipients(&self.to)
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MAIL_API_URL)
                .long(ARG_MAIL_API_URL)
                .help("Transactional email API endpoint")
                .env("COURTIER_MAIL_API_URL")
                .default_value(DEFAULT_MAIL_API_URL),
        )
        .arg(
            Arg::new(ARG_MAIL_API_KEY)
                .long(ARG_MAIL_API_KEY)
                .help("Transactional email API key; without it every send answers 500")
                .env("COURTIER_MAIL_API_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM)
                .long(ARG_MAIL_FROM)
                .help("Sender of the quote notifications")
                .env("COURTIER_MAIL_FROM")
                .default_value(DEFAULT_MAIL_FROM),
        )
        .arg(
            Arg::new(ARG_MAIL_TO)
                .long(ARG_MAIL_TO)
                .help("Comma-separated recipients of the quote notifications")
                .env("COURTIER_MAIL_TO"),
        )
}
