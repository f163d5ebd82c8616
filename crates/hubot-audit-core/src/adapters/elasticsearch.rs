//! # Elasticsearch Index Client
//!
//! Indexes audit documents with `POST {base}/{index}/{doc_type}`, sending
//! the group id in the `X-HUBOT-AUTH-TOKEN` header.

use crate::index_client::{IndexClient, IndexError, IndexRequest, IndexResponse};
use crate::settings::AuditSettings;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Header carrying the audit auth token (`X-HUBOT-AUTH-TOKEN`)
pub const AUTH_TOKEN_HEADER: &str = "x-hubot-auth-token";

/// Connection settings for the Elasticsearch backend
///
/// # Examples
///
/// ```
/// use hubot_audit_core::{AuditSettings, ElasticsearchConfig};
///
/// let settings = AuditSettings::default();
/// let config = ElasticsearchConfig::from_audit_endpoint("https://audit.example.com/ingest", &settings)
///     .unwrap();
/// assert_eq!(config.base_url.as_str(), "https://audit.example.com/");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticsearchConfig {
    /// Scheme, host and port of the backend
    pub base_url: Url,

    /// Value of the auth token header
    pub auth_token: String,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Idle connections kept per host
    pub max_idle_connections: usize,
}

impl ElasticsearchConfig {
    /// Create a config for an explicit base URL
    pub fn new(base_url: &str, auth_token: impl Into<String>) -> Result<Self, IndexError> {
        let base_url = Url::parse(base_url).map_err(|e| IndexError::InvalidEndpoint {
            endpoint: base_url.to_string(),
            message: e.to_string(),
        })?;

        let defaults = AuditSettings::default();
        Ok(Self {
            base_url,
            auth_token: auth_token.into(),
            request_timeout: defaults.request_timeout(),
            max_idle_connections: defaults.max_connections,
        })
    }

    /// Derive the backend location from the audit endpoint
    ///
    /// Only the endpoint's host name is kept; scheme and port come from the
    /// settings. The group id is the auth token. An endpoint without a scheme
    /// is read as `https://{endpoint}`.
    pub fn from_audit_endpoint(
        endpoint: &str,
        settings: &AuditSettings,
    ) -> Result<Self, IndexError> {
        let endpoint = endpoint.trim();
        let qualified = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("https://{}", endpoint)
        };

        let parsed = Url::parse(&qualified).map_err(|e| IndexError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| IndexError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                message: "endpoint has no host name".to_string(),
            })?;

        let base_url = format!(
            "{}://{}:{}",
            settings.backend_protocol, host, settings.backend_port
        );

        Ok(Self::new(&base_url, settings.identity_tags().group_id)?
            .with_request_timeout(settings.request_timeout())
            .with_max_idle_connections(settings.max_connections))
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the idle connection pool size
    pub fn with_max_idle_connections(mut self, max: usize) -> Self {
        self.max_idle_connections = max;
        self
    }
}

/// Elasticsearch-backed index client
#[derive(Debug, Clone)]
pub struct ElasticsearchIndexClient {
    client: reqwest::Client,
    config: ElasticsearchConfig,
}

impl ElasticsearchIndexClient {
    /// Create the client
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::ClientInitialization`] if the auth token is not
    /// a valid header value or the HTTP client cannot be built.
    pub fn new(config: ElasticsearchConfig) -> Result<Self, IndexError> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&config.auth_token).map_err(|e| {
            IndexError::ClientInitialization {
                message: format!("invalid auth token header: {}", e),
            }
        })?;
        headers.insert(HeaderName::from_static(AUTH_TOKEN_HEADER), token);

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.max_idle_connections)
            .default_headers(headers)
            .build()
            .map_err(|e| IndexError::ClientInitialization {
                message: e.to_string(),
            })?;

        Ok(Self { client, config })
    }

    /// Client configuration
    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }

    /// URL a document of the given collection and kind is posted to
    pub fn document_url(&self, index: &str, doc_type: &str) -> Result<Url, IndexError> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| IndexError::InvalidEndpoint {
                endpoint: self.config.base_url.to_string(),
                message: "base URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .push(index)
            .push(doc_type);
        Ok(url)
    }

    fn map_send_error(&self, error: reqwest::Error) -> IndexError {
        if error.is_timeout() {
            IndexError::Timeout {
                duration: self.config.request_timeout,
            }
        } else {
            IndexError::Transport {
                message: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl IndexClient for ElasticsearchIndexClient {
    async fn index(&self, request: IndexRequest) -> Result<IndexResponse, IndexError> {
        let url = self.document_url(&request.index, &request.doc_type)?;
        debug!(url = %url, "Posting audit document");

        let response = self
            .client
            .post(url)
            .json(&request.body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(IndexError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        // Acknowledgement bodies vary across backend versions
        let acknowledgement = response.json::<IndexResponse>().await.unwrap_or_default();
        Ok(acknowledgement)
    }
}

#[cfg(test)]
#[path = "elasticsearch_tests.rs"]
mod tests;
