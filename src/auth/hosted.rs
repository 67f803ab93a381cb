//! REST client for the hosted identity provider (`/auth/v1/*` for accounts and
//! sessions, `/rest/v1/<table>` for the profile table).
//!
//! The store keeps the current session in memory, optionally mirrored to a JSON
//! file so separate CLI invocations share it, and publishes every change on its
//! [`ChangeFeed`]. Expired sessions are refreshed lazily by `current_session`.
//! Tokens and passwords must never reach the logs.

use crate::{
    auth::{
        feed::{AuthChange, AuthEvent, ChangeFeed, Subscription},
        principal::{now_unix_seconds, Session, User},
        provider::{CredentialStore, ProfileData, ProfileRow, ProviderError},
    },
    APP_USER_AGENT,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
    time::Duration,
};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Lifetime assumed when the provider omits both `expires_at` and `expires_in`.
const DEFAULT_SESSION_TTL_SECONDS: i64 = 3600;

#[derive(Clone, Debug)]
pub struct HostedStoreConfig {
    pub base_url: Url,
    pub anon_key: SecretString,
    pub profile_table: String,
    pub session_file: Option<PathBuf>,
    pub timeout: Duration,
}

impl HostedStoreConfig {
    #[must_use]
    pub fn new(base_url: Url, anon_key: SecretString) -> Self {
        Self {
            base_url,
            anon_key,
            profile_table: "profiles".to_string(),
            session_file: None,
            timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_profile_table(mut self, table: &str) -> Self {
        self.profile_table = table.to_string();
        self
    }

    #[must_use]
    pub fn with_session_file(mut self, path: Option<PathBuf>) -> Self {
        self.session_file = path;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug)]
pub struct HostedStore {
    client: Client,
    base_url: Url,
    anon_key: SecretString,
    profile_table: String,
    session_file: Option<PathBuf>,
    session: Mutex<Option<Session>>,
    feed: ChangeFeed,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: &'a ProfileData,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Session {
        let expires_at = self.expires_at.unwrap_or_else(|| {
            now.saturating_add(self.expires_in.unwrap_or(DEFAULT_SESSION_TTL_SECONDS))
        });

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Sign-up answers with a session when email confirmation is disabled and
/// with the bare user otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(User),
}

#[derive(Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    error_code: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

/// Map a non-2xx provider answer to a [`ProviderError`].
pub(crate) fn error_from_response(status: StatusCode, body: &str) -> ProviderError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    let code = parsed.error_code.as_deref().or(parsed.error.as_deref());
    if matches!(code, Some("invalid_grant" | "invalid_credentials")) {
        return ProviderError::InvalidCredentials;
    }

    let message = parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| body.trim().to_string());

    ProviderError::Api {
        status: status.as_u16(),
        message,
    }
}

fn valid_provider_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn load_session(path: &Path) -> Option<Session> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Failed to read session file {}: {e}", path.display());
            return None;
        }
    };

    match serde_json::from_str(&contents) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!("Ignoring unreadable session file {}: {e}", path.display());
            None
        }
    }
}

fn save_session(path: &Path, session: &Session) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = serde_json::to_vec_pretty(session)?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // mode() only applies on creation
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(&contents)
}

impl HostedStore {
    /// Build the store, restoring a persisted session if one exists.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: HostedStoreConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        // Url::join drops the last segment unless the base ends with a slash
        let mut base_url = config.base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let session = config.session_file.as_deref().and_then(load_session);
        if session.is_some() {
            debug!("Restored persisted session");
        }

        Ok(Self {
            client,
            base_url,
            anon_key: config.anon_key,
            profile_table: config.profile_table,
            session_file: config.session_file,
            session: Mutex::new(session),
            feed: ChangeFeed::new(),
        })
    }

    #[must_use]
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::InvalidRequest(format!("invalid endpoint {path}: {e}")))
    }

    fn snapshot(&self) -> Option<Session> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the held session, mirror it to disk and notify subscribers.
    fn replace_session(&self, session: Option<Session>, event: AuthEvent) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = session.clone();

        if let Some(path) = &self.session_file {
            let result = match &session {
                Some(session) => save_session(path, session),
                None => match fs::remove_file(path) {
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                    other => other,
                },
            };
            if let Err(e) = result {
                warn!("Failed to update session file {}: {e}", path.display());
            }
        }

        self.feed.publish(&AuthChange { event, session });
    }

    fn request(&self, request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        let anon_key = self.anon_key.expose_secret();
        request
            .header("apikey", anon_key)
            .bearer_auth(bearer.unwrap_or(anon_key))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(error_from_response(status, &body))
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    async fn grant<P: Serialize + Sync>(
        &self,
        grant_type: &str,
        payload: &P,
    ) -> Result<Session, ProviderError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let token: TokenResponse = self
            .send_json(self.request(self.client.post(url).json(payload), None))
            .await?;

        Ok(token.into_session(now_unix_seconds()))
    }

    #[instrument(skip(self, session))]
    async fn refresh(&self, session: Session) -> Result<Option<Session>, ProviderError> {
        let Some(refresh_token) = session.refresh_token.as_deref() else {
            debug!("Session expired without a refresh token");
            self.replace_session(None, AuthEvent::SignedOut);
            return Ok(None);
        };

        match self
            .grant("refresh_token", &RefreshRequest { refresh_token })
            .await
        {
            Ok(refreshed) => {
                debug!("Session refreshed");
                self.replace_session(Some(refreshed.clone()), AuthEvent::TokenRefreshed);
                Ok(Some(refreshed))
            }
            // keep the session so a later call can retry
            Err(ProviderError::Network(e)) => Err(ProviderError::Network(e)),
            Err(e) => {
                info!("Refresh rejected, dropping session: {e}");
                self.replace_session(None, AuthEvent::SignedOut);
                Ok(None)
            }
        }
    }
}

impl CredentialStore for HostedStore {
    async fn current_session(&self) -> Result<Option<Session>, ProviderError> {
        match self.snapshot() {
            Some(session) if session.is_expired(now_unix_seconds()) => self.refresh(session).await,
            other => Ok(other),
        }
    }

    fn on_session_change(&self) -> Subscription {
        self.feed.subscribe()
    }

    #[instrument(skip(self, password, profile))]
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &ProfileData,
    ) -> Result<Option<User>, ProviderError> {
        let url = self.endpoint("auth/v1/signup")?;
        let body = SignUpRequest {
            email,
            password,
            data: profile,
        };

        let response: SignUpResponse = self
            .send_json(self.request(self.client.post(url).json(&body), None))
            .await?;

        match response {
            SignUpResponse::Session(token) => {
                let session = token.into_session(now_unix_seconds());
                let user = session.user.clone();
                self.replace_session(Some(session), AuthEvent::SignedIn);
                Ok(Some(user))
            }
            SignUpResponse::User(user) => {
                debug!("Account created, confirmation pending");
                Ok(Some(user))
            }
        }
    }

    #[instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, ProviderError> {
        let session = self
            .grant("password", &Credentials { email, password })
            .await?;

        let user = session.user.clone();
        self.replace_session(Some(session), AuthEvent::SignedIn);

        Ok(Some(user))
    }

    async fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: &str,
    ) -> Result<Url, ProviderError> {
        if !valid_provider_name(provider) {
            return Err(ProviderError::InvalidRequest(format!(
                "unsupported provider name: {provider:?}"
            )));
        }

        Url::parse(redirect_to)
            .map_err(|e| ProviderError::InvalidRequest(format!("invalid redirect target: {e}")))?;

        let mut url = self.endpoint("auth/v1/authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to);

        Ok(url)
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), ProviderError> {
        let Some(session) = self.snapshot() else {
            return Err(ProviderError::NotLoggedIn);
        };

        let url = self.endpoint("auth/v1/logout")?;
        let result = self
            .send(self.request(self.client.post(url), Some(&session.access_token)))
            .await;

        self.replace_session(None, AuthEvent::SignedOut);

        match result {
            Ok(_) => Ok(()),
            // the token is already invalid on the provider side
            Err(ProviderError::Api {
                status: 401 | 403 | 404,
                ..
            }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, user, profile), fields(user_id = %user.id))]
    async fn insert_profile(
        &self,
        user: &User,
        profile: &ProfileData,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(&format!("rest/v1/{}", self.profile_table))?;
        let bearer = self.snapshot().map(|session| session.access_token);

        self.send(
            self.request(self.client.post(url), bearer.as_deref())
                .header("Prefer", "return=minimal")
                .json(&ProfileRow::new(user, profile)),
        )
        .await?;

        Ok(())
    }
}
