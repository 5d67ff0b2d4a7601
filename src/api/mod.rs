//! Backend API client.
//!
//! [`ApiClient`] wraps the shared [`HttpClient`] with the two interceptors
//! every call goes through:
//! - requests that need auth get `Authorization: Bearer <token>` from the
//!   persisted `auth_token` key;
//! - a 401 answer to a request that carried a bearer token is broadcast as an
//!   [`UnauthorizedEvent`] so the session layer can sign out.
//!
//! The endpoint groups live in submodules and are exposed as traits so the
//! session and workspace containers can be driven by fakes in tests.

pub mod envelope;
pub mod google;
pub mod identity;
pub mod resources;
pub mod workspace;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;

pub use envelope::ListEnvelope;
pub use google::{GoogleCredential, GoogleProfile};
pub use identity::{AuthPayload, GoogleAuthPayload, IdentityBackend, SignUpPayload};
pub use resources::{Resource, ResourceKind};
pub use workspace::WorkspaceBackend;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::net::HttpClient;
use crate::storage::{KeyValueStore, keys};

/// Broadcast when the backend rejects a bearer-carrying request with 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnauthorizedEvent {
    /// Path of the rejected request.
    pub path: String,
}

/// How a request is authenticated.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Auth<'a> {
    /// No Authorization header.
    None,
    /// Bearer token read from the persisted `auth_token` key.
    Stored,
    /// Caller-supplied bearer token.
    Token(&'a str),
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the promptdesk backend.
pub struct ApiClient {
    http: HttpClient,
    base_url: Url,
    store: Arc<dyn KeyValueStore>,
    unauthorized: broadcast::Sender<UnauthorizedEvent>,
}

impl ApiClient {
    /// Build a client from the `[api]` config section.
    pub fn new(config: &ApiConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::with_http(HttpClient::from_config(config), &config.base_url, store)
    }

    /// Build a client around an existing HTTP client.
    pub fn with_http(http: HttpClient, base_url: &str, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid API base URL '{base_url}': {e}")))?;
        let (unauthorized, _) = broadcast::channel(16);
        Ok(Self {
            http,
            base_url,
            store,
            unauthorized,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Subscribe to 401 events.
    pub fn subscribe_unauthorized(&self) -> broadcast::Receiver<UnauthorizedEvent> {
        self.unauthorized.subscribe()
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.inner().request(method, self.url(path))
    }

    fn stored_token(&self) -> Option<String> {
        match self.store.get(keys::AUTH_TOKEN) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read stored auth token");
                None
            }
        }
    }

    /// Send a request through the interceptors. Non-2xx answers become errors.
    pub(crate) async fn send(&self, path: &str, request: RequestBuilder, auth: Auth<'_>) -> Result<Response> {
        let token = match auth {
            Auth::None => None,
            Auth::Stored => self.stored_token(),
            Auth::Token(token) => Some(token.to_string()),
        };
        let carried_bearer = token.is_some();
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let resp = request.send().await?;
        let status = resp.status();
        debug!(path, status = status.as_u16(), "API response");

        if status.is_success() {
            return Ok(resp);
        }

        if status == StatusCode::UNAUTHORIZED && carried_bearer {
            warn!(path, "Bearer token rejected");
            if matches!(auth, Auth::Stored) {
                let _ = self.unauthorized.send(UnauthorizedEvent {
                    path: path.to_string(),
                });
            }
            return Err(Error::Unauthorized);
        }

        let text = resp.text().await.unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            message: error_detail(status, &text),
        })
    }

    /// Send and decode a JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
        auth: Auth<'_>,
    ) -> Result<T> {
        let resp = self.send(path, request, auth).await?;
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::UnexpectedResponse(format!("{path}: {e}")))
    }
}

/// Pull a readable message out of an error body.
///
/// Accepts `{"detail": "..."}`, `{"detail": [..]}`, `{"message": "..."}`, or
/// falls back to the raw text and finally the status reason.
fn error_detail(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        match parsed.detail {
            Some(serde_json::Value::String(s)) if !s.is_empty() => return s,
            Some(serde_json::Value::Null) | None => {}
            Some(other) => return other.to_string(),
        }
        if let Some(message) = parsed.message.filter(|m| !m.is_empty()) {
            return message;
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() && !trimmed.starts_with('{') {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}

/// Replace a backend rejection with a credential error, keeping the detail
/// message when there is one and using `fallback` otherwise.
pub(crate) fn credential_error(err: Error, fallback: &str) -> Error {
    match err {
        Error::Api { status, message } if !is_bare_reason(status, &message) => {
            Error::InvalidCredentials(message)
        }
        Error::Api { .. } | Error::Unauthorized => Error::InvalidCredentials(fallback.to_string()),
        other => other,
    }
}

/// True when `message` carries nothing beyond the status line.
fn is_bare_reason(status: u16, message: &str) -> bool {
    message.is_empty()
        || StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            == Some(message)
}
