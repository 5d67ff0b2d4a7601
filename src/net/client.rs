//! Shared reqwest client.

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

use crate::config::ApiConfig;

/// Sent on every backend and Google call.
pub const USER_AGENT: &str = concat!("promptdesk/", env!("CARGO_PKG_VERSION"));

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One connection pool for the whole client core.
///
/// Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    pub fn new() -> Self {
        HttpClientBuilder::default().build()
    }

    /// Timeouts taken from the `[api]` section.
    pub fn from_config(config: &ApiConfig) -> Self {
        HttpClientBuilder::default()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .build()
    }

    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`HttpClient`]. Starts from JSON `Accept`, the crate user
/// agent and default timeouts.
pub struct HttpClientBuilder {
    builder: ClientBuilder,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Self {
            builder: Client::builder()
                .user_agent(USER_AGENT)
                .default_headers(headers)
                .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
                .timeout(DEFAULT_TIMEOUT),
        }
    }
}

impl HttpClientBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.builder = self.builder.connect_timeout(timeout);
        self
    }

    /// Whole-request deadline, body included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.builder = self.builder.timeout(timeout);
        self
    }

    /// Falls back to reqwest's defaults if the TLS backend cannot be set up
    /// with these settings.
    pub fn build(self) -> HttpClient {
        let inner = self.builder.build().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "HTTP client settings rejected, using reqwest defaults");
            Client::new()
        });
        HttpClient { inner }
    }
}
