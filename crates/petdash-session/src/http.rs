//! Generic JSON-over-HTTP client for a session-authenticated device API.
//!
//! Failures are classified into [`RemoteError`] kinds here, at the point the
//! response is seen, so callers never have to inspect error text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::error::{RemoteError, Result};
use crate::session::Authenticator;
use crate::store::Credentials;

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default marker text some vendors return with a 200 when the session died.
pub const DEFAULT_EXPIRED_MARKER: &str = "session expired";

/// Connection settings for one remote API.
#[derive(Debug, Clone)]
pub struct HttpApiConfig {
    /// Name used in logs and as the session store key.
    pub name: String,

    /// Base URL, e.g. `https://api.example.com/v1`.
    pub base_url: String,

    /// Path of the login endpoint, relative to `base_url`.
    pub login_path: String,

    pub username: String,
    pub password: String,

    /// JSON pointer to the session token in the login response.
    pub token_pointer: String,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Case-insensitive text that marks an expired session inside a
    /// successful response body.
    pub expired_marker: Option<String>,
}

impl HttpApiConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            login_path: "/login".to_string(),
            username: String::new(),
            password: String::new(),
            token_pointer: "/token".to_string(),
            timeout: DEFAULT_TIMEOUT,
            expired_marker: Some(DEFAULT_EXPIRED_MARKER.to_string()),
        }
    }

    pub fn with_login(
        mut self,
        login_path: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.login_path = login_path.into();
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_token_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.token_pointer = pointer.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_expired_marker(mut self, marker: Option<String>) -> Self {
        self.expired_marker = marker;
        self
    }
}

/// JSON client for one remote API.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    config: HttpApiConfig,
    http: reqwest::Client,
}

impl HttpApiClient {
    /// Build a client. Fails only if the TLS backend can't be initialized.
    pub fn new(config: HttpApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Protocol(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    /// Connection settings.
    pub fn config(&self) -> &HttpApiConfig {
        &self.config
    }

    /// Build a URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Authenticated GET returning the JSON body.
    pub async fn get_json(&self, credentials: &Credentials, path: &str) -> Result<Value> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&credentials.token)
            .send()
            .await?;
        self.handle_response(path, response).await
    }

    /// Authenticated POST of a JSON body, returning the JSON response.
    pub async fn post_json(
        &self,
        credentials: &Credentials,
        path: &str,
        body: &Value,
    ) -> Result<Value> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&credentials.token)
            .json(body)
            .send()
            .await?;
        self.handle_response(path, response).await
    }

    async fn handle_response(&self, path: &str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_status(status, path, &body);
            tracing::debug!(api = %self.config.name, path = %path, status = status.as_u16(), error = %err, "Remote call failed");
            return Err(err);
        }

        let value: Value = response.json().await?;

        if let Some(marker) = &self.config.expired_marker
            && body_signals_expiry(&value, marker)
        {
            return Err(RemoteError::AuthExpired(format!(
                "{} reported an expired session",
                path
            )));
        }

        Ok(value)
    }
}

/// Map a non-success status to a failure kind.
pub fn classify_status(status: StatusCode, path: &str, body: &str) -> RemoteError {
    let detail = if body.is_empty() {
        format!("{} returned {}", path, status)
    } else {
        format!("{} returned {}: {}", path, status, truncate(body, 200))
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::AuthExpired(detail),
        StatusCode::NOT_FOUND => RemoteError::NotFound(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            RemoteError::Transient(detail)
        }
        s if s.is_server_error() => RemoteError::Transient(detail),
        _ => RemoteError::Protocol(detail),
    }
}

/// Whether an otherwise successful body carries the vendor's expiry marker
/// in one of its error/message fields.
fn body_signals_expiry(value: &Value, marker: &str) -> bool {
    let marker = marker.to_lowercase();
    ["/error", "/msg", "/message", "/error/msg", "/error/message"]
        .iter()
        .filter_map(|pointer| value.pointer(pointer).and_then(Value::as_str))
        .any(|text| text.to_lowercase().contains(&marker))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl Authenticator for HttpApiClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn login(&self) -> Result<Credentials> {
        let path = &self.config.login_path;
        let response = self
            .http
            .post(self.url(path))
            .json(&json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RemoteError::AuthFailed(format!(
                "{} rejected credentials for '{}'",
                self.config.name, self.config.username
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, path, &body));
        }

        let value: Value = response.json().await?;
        let token = value
            .pointer(&self.config.token_pointer)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RemoteError::Protocol(format!(
                    "login response has no token at '{}'",
                    self.config.token_pointer
                ))
            })?;

        Ok(Credentials::new(token))
    }
}
