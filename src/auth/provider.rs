//! Contract with the hosted identity provider. The session core only talks to
//! the provider through [`CredentialStore`]; errors come back as
//! [`ProviderError`] and are passed through unchanged unless a caller
//! documents otherwise.

use crate::auth::{
    feed::Subscription,
    principal::{Session, User},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("invalid login credentials")]
    InvalidCredentials,
    #[error("not logged in")]
    NotLoggedIn,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("provider request failed ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Self-service profile fields captured at sign-up.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Row written to the profile table for a newly created account.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProfileRow<'a> {
    pub id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(flatten)]
    pub profile: &'a ProfileData,
}

impl<'a> ProfileRow<'a> {
    #[must_use]
    pub fn new(user: &'a User, profile: &'a ProfileData) -> Self {
        Self {
            id: &user.id,
            email: user.email.as_deref(),
            profile,
        }
    }
}

/// Operations consumed from the hosted identity provider.
pub trait CredentialStore: Send + Sync {
    /// Session the provider currently holds for this context, if any.
    fn current_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, ProviderError>> + Send;

    /// Push feed of session changes, in the order they happen.
    fn on_session_change(&self) -> Subscription;

    fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &ProfileData,
    ) -> impl Future<Output = Result<Option<User>, ProviderError>> + Send;

    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Option<User>, ProviderError>> + Send;

    /// URL of the provider's federated sign-in flow for `provider`, returning
    /// to `redirect_to` once done.
    fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: &str,
    ) -> impl Future<Output = Result<Url, ProviderError>> + Send;

    /// Fails with [`ProviderError::NotLoggedIn`] when no session exists.
    fn sign_out(&self) -> impl Future<Output = Result<(), ProviderError>> + Send;

    fn insert_profile(
        &self,
        user: &User,
        profile: &ProfileData,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;
}
