use crate::courtier::mail::{MailError, Mailer, Quote};
use axum::{
    extract::Extension,
    http::{
        header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct QuoteRequest {
    nom: Option<String>,
    email: Option<String>,
    message: Option<String>,
    #[serde(rename = "fileUrl")]
    file_url: Option<String>,
}

impl QuoteRequest {
    /// Returns the name of the first missing or blank field on failure.
    fn into_quote(self) -> Result<Quote, &'static str> {
        fn required(value: Option<String>, name: &'static str) -> Result<String, &'static str> {
            match value {
                Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
                _ => Err(name),
            }
        }

        Ok(Quote {
            nom: required(self.nom, "nom")?,
            email: required(self.email, "email")?,
            message: required(self.message, "message")?,
            file_url: required(self.file_url, "fileUrl")?,
        })
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SendEmailResponse {
    success: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SendEmailError {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    details: Option<Value>,
}

#[utoipa::path(
    post,
    path= "/send-email",
    request_body = QuoteRequest,
    responses (
        (status = 200, description = "Notification accepted by the email provider", body = SendEmailResponse),
        (status = 400, description = "Missing or blank field, or unreadable payload", body = SendEmailError),
        (status = 500, description = "Email delivery not configured or provider unreachable", body = SendEmailError),
        (status = 502, description = "Email provider rejected the message", body = SendEmailError),
    ),
    tag= "quote"
)]
// axum handler for quote notifications
#[instrument(skip(mailer, payload))]
pub async fn send_email(
    mailer: Extension<Arc<Mailer>>,
    payload: Option<Json<QuoteRequest>>,
) -> (StatusCode, Json<Value>) {
    let request: QuoteRequest = match payload {
        Some(Json(payload)) => payload,
        None => return bad_request("Missing payload".to_string()),
    };

    let quote = match request.into_quote() {
        Ok(quote) => quote,
        Err(field) => return bad_request(format!("Missing required field: {field}")),
    };

    match mailer.send_quote(&quote).await {
        Ok(()) => {
            info!("Quote notification sent");
            (StatusCode::OK, Json(json!({ "success": true })))
        }
        Err(err) => failure(&err),
    }
}

/// Pre-flight answer for clients that send a bare `OPTIONS`.
pub async fn preflight() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    (StatusCode::OK, headers)
}

fn bad_request(message: String) -> (StatusCode, Json<Value>) {
    warn!("Rejected quote request: {}", message);
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn failure(err: &MailError) -> (StatusCode, Json<Value>) {
    match err {
        MailError::NotConfigured(_) | MailError::Transport(_) => {
            error!("Quote notification failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
        }
        MailError::Rejected { body, .. } => {
            error!("Quote notification rejected: {}", err);
            let details =
                serde_json::from_str::<Value>(body).unwrap_or_else(|_| Value::String(body.clone()));
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": err.to_string(), "details": details })),
            )
        }
    }
}
