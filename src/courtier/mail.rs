//! Outbound quote notifications through a transactional email API.
//!
//! The provider is any HTTP API accepting `{from, to, subject, html, reply_to}`
//! with a bearer key (Resend by default). The API key is optional at startup so
//! the server can still answer health checks; sends then fail as not configured.

use crate::APP_USER_AGENT;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_MAIL_API_URL: &str = "https://api.resend.com/emails";
pub const DEFAULT_MAIL_FROM: &str = "Courtier <onboarding@resend.dev>";

const MAX_PROVIDER_BODY_LENGTH: usize = 1024;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("email delivery is not configured: missing {0}")]
    NotConfigured(&'static str),
    #[error("email provider unreachable: {0}")]
    Transport(String),
    #[error("email provider rejected the message (HTTP {status})")]
    Rejected { status: u16, body: String },
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub api_url: Url,
    pub api_key: Option<SecretString>,
    pub from: String,
    pub to: Vec<String>,
    pub timeout: Duration,
}

impl MailConfig {
    #[must_use]
    pub fn new(api_url: Url, api_key: Option<SecretString>) -> Self {
        Self {
            api_url,
            api_key,
            from: DEFAULT_MAIL_FROM.to_string(),
            to: Vec::new(),
            timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_from(mut self, from: &str) -> Self {
        self.from = from.to_string();
        self
    }

    /// Comma-separated recipients, blanks dropped.
    #[must_use]
    pub fn with_recipients(mut self, to: &str) -> Self {
        self.to = to
            .split(',')
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A validated quote request, every field non-blank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quote {
    pub nom: String,
    pub email: String,
    pub message: String,
    pub file_url: String,
}

#[derive(Serialize)]
struct OutboundEmail<'a> {
    from: &'a str,
    to: &'a [String],
    subject: String,
    html: String,
    reply_to: &'a str,
}

#[derive(Debug)]
pub struct Mailer {
    client: Client,
    config: MailConfig,
}

impl Mailer {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: MailConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    /// Send one notification per quote. No retry.
    ///
    /// # Errors
    /// `NotConfigured` without an API key or recipient, `Transport` when the
    /// provider cannot be reached, `Rejected` for any non-2xx answer
    #[instrument(skip(self, quote), fields(api_url = %self.config.api_url))]
    pub async fn send_quote(&self, quote: &Quote) -> Result<(), MailError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or(MailError::NotConfigured("mail API key"))?;

        if self.config.to.is_empty() {
            return Err(MailError::NotConfigured("recipient"));
        }

        let email = OutboundEmail {
            from: &self.config.from,
            to: &self.config.to,
            subject: subject(quote),
            html: render_html(quote),
            reply_to: &quote.email,
        };

        let response = self
            .client
            .post(self.config.api_url.clone())
            .bearer_auth(api_key.expose_secret())
            .json(&email)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("quote notification accepted: {}", status);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MailError::Rejected {
            status: status.as_u16(),
            body: truncate_body(&body),
        })
    }
}

#[must_use]
pub fn subject(quote: &Quote) -> String {
    format!("Nouvelle demande de devis - {}", quote.nom)
}

#[must_use]
pub fn render_html(quote: &Quote) -> String {
    format!(
        "<h2>Nouvelle demande de devis</h2>\
         <p><strong>Nom :</strong> {}</p>\
         <p><strong>Email :</strong> {}</p>\
         <p><strong>Message :</strong></p><p>{}</p>\
         <p><strong>Fichier :</strong> <a href=\"{}\">{}</a></p>",
        escape_html(&quote.nom),
        escape_html(&quote.email),
        escape_html(&quote.message).replace('\n', "<br>"),
        escape_html(&quote.file_url),
        escape_html(&quote.file_url),
    )
}

#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_PROVIDER_BODY_LENGTH {
        return body.to_string();
    }

    let mut end = MAX_PROVIDER_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote() -> Quote {
        Quote {
            nom: "Jean <Dupont>".to_string(),
            email: "jean@example.com".to_string(),
            message: "Assurance auto\n& habitation".to_string(),
            file_url: "https://files.example/devis.pdf?a=1&b=2".to_string(),
        }
    }

    #[test]
    fn subject_carries_the_name() {
        assert_eq!(subject(&quote()), "Nouvelle demande de devis - Jean <Dupont>");
    }

    #[test]
    fn html_escapes_every_field() {
        let html = render_html(&quote());
        assert!(html.contains("Jean &lt;Dupont&gt;"));
        assert!(html.contains("Assurance auto<br>&amp; habitation"));
        assert!(html.contains("href=\"https://files.example/devis.pdf?a=1&amp;b=2\""));
        assert!(!html.contains("<Dupont>"));
    }

    #[test]
    fn escape_html_quotes() {
        assert_eq!(escape_html(r#"a"b'c"#), "a&quot;b&#39;c");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn recipients_are_split_and_trimmed() {
        let config = MailConfig::new(Url::parse(DEFAULT_MAIL_API_URL).unwrap(), None)
            .with_recipients(" a@x.com, ,b@x.com ");
        assert_eq!(config.to, vec!["a@x.com".to_string(), "b@x.com".to_string()]);
        assert_eq!(config.from, DEFAULT_MAIL_FROM);
    }

    #[test]
    fn long_provider_bodies_are_truncated() {
        assert_eq!(truncate_body("short"), "short");

        let long = "é".repeat(MAX_PROVIDER_BODY_LENGTH);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with(&format!("(truncated, {} total bytes)", long.len())));
        assert!(truncated.len() < long.len());
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let config = MailConfig::new(Url::parse("http://127.0.0.1:9/emails").unwrap(), None)
            .with_recipients("broker@x.com");
        let mailer = Mailer::new(config).unwrap();
        let err = mailer.send_quote(&quote()).await.unwrap_err();
        assert!(matches!(err, MailError::NotConfigured("mail API key")));
    }

    #[tokio::test]
    async fn missing_recipient_is_not_configured() {
        let config = MailConfig::new(
            Url::parse("http://127.0.0.1:9/emails").unwrap(),
            Some(SecretString::from("re_test")),
        );
        let mailer = Mailer::new(config).unwrap();
        let err = mailer.send_quote(&quote()).await.unwrap_err();
        assert!(matches!(err, MailError::NotConfigured("recipient")));
    }
}
