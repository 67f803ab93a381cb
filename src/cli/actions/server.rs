use crate::courtier::{
    self,
    mail::{MailConfig, Mailer},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub mail: MailConfig,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the email client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    if args.mail.api_key.is_none() {
        warn!("COURTIER_MAIL_API_KEY is not set, quote notifications will answer 500");
    }
    if args.mail.to.is_empty() {
        warn!("COURTIER_MAIL_TO is not set, quote notifications will answer 500");
    }
    debug!(api_url = %args.mail.api_url, recipients = args.mail.to.len(), "Email provider");

    let mailer = Mailer::new(args.mail).context("Failed to build the email client")?;

    courtier::new(args.port, Arc::new(mailer)).await
}
