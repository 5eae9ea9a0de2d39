//! Production Rancher API client backed by reqwest

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;

use super::{ApiClient, ApiResponse};
use crate::{Error, Result};

/// Default connect timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default per-request timeout
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for a Rancher API endpoint
///
/// Built with chained setters and turned into a [`RancherClient`]:
///
/// ```no_run
/// use steer::api::RancherConfig;
///
/// let client = RancherConfig::new("https://rancher.example.com", "token-abc:secret")
///     .validate_certs(false)
///     .build()
///     .unwrap();
/// ```
pub struct RancherConfig {
    url: String,
    bearer_token: String,
    validate_certs: bool,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl RancherConfig {
    /// Create a config for the given Rancher URL and bearer token
    pub fn new(url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer_token: bearer_token.into(),
            validate_certs: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Toggle TLS certificate validation (on by default)
    pub fn validate_certs(mut self, validate: bool) -> Self {
        self.validate_certs = validate;
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build the client with the configured HTTP settings
    pub fn build(self) -> Result<RancherClient> {
        let http = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .danger_accept_invalid_certs(!self.validate_certs)
            .build()
            .map_err(|e| Error::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(RancherClient {
            base_url: self.url.trim_end_matches('/').to_string(),
            bearer_token: self.bearer_token,
            http,
        })
    }
}

/// Rancher v3 API client
///
/// Sends bearer-authorized JSON requests and decodes every response body,
/// whatever the status code — the reconcilers interpret non-2xx statuses
/// themselves.
pub struct RancherClient {
    base_url: String,
    bearer_token: String,
    http: reqwest::Client,
}

impl RancherClient {
    fn absolute(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn dispatch(&self, request: reqwest::RequestBuilder) -> Result<ApiResponse> {
        let response = request
            .header(AUTHORIZATION, format!("Bearer {}", self.bearer_token))
            .send()
            .await
            .map_err(|e| Error::transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| Error::transport(e.to_string()))?;

        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| Error::decode(format!("response was not valid JSON: {e}")))?
        };

        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl ApiClient for RancherClient {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<ApiResponse> {
        self.dispatch(self.http.get(self.absolute(path)).query(query))
            .await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.dispatch(self.http.post(self.absolute(path)).json(body))
            .await
    }

    async fn post_url(&self, url: &str, body: &Value) -> Result<ApiResponse> {
        self.dispatch(self.http.post(url).json(body)).await
    }

    async fn delete(&self, url: &str) -> Result<ApiResponse> {
        self.dispatch(self.http.delete(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_trims_trailing_slash() {
        let client = RancherConfig::new("https://rancher.example.com/", "token-abc:secret")
            .build()
            .unwrap();
        assert_eq!(
            client.absolute("/v3/clusters"),
            "https://rancher.example.com/v3/clusters"
        );
    }

    #[test]
    fn test_build_with_relaxed_tls() {
        // The toggle only configures the underlying client; building must
        // succeed either way.
        assert!(RancherConfig::new("https://rancher.local", "t")
            .validate_certs(false)
            .build()
            .is_ok());
    }

    #[test]
    fn test_timeouts_are_configurable() {
        let config = RancherConfig::new("https://rancher.local", "t")
            .connect_timeout(Duration::from_secs(1))
            .request_timeout(Duration::from_secs(2));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert!(config.build().is_ok());
    }
}
