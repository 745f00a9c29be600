//! HTTP transports and the bounded retry helper used by every source.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header, Client};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

const USER_AGENT: &str = "social-stream-importer/0.1";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {status}")]
    Status { status: u16 },
    #[error("empty response body")]
    EmptyBody,
}

/// A single way of performing HTTP requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a URL, returning the response body.
    async fn get(&self, url: &str, authorization: Option<&str>) -> Result<String, TransportError>;

    /// POST form fields to a URL, returning the response body.
    async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> Result<String, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Primary transport: connect and total timeouts, compressed responses.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    pub fn primary(config: &Config) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(config.http_connect_timeout)
            .timeout(config.http_timeout)
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::new(client))
    }

    /// Fallback transport: a plain HTTP/1 client with only a total timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    pub fn fallback(config: &Config) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .http1_only()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::new(client))
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, TransportError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
        });
    }

    let body = response.text().await?;
    if body.trim().is_empty() {
        return Err(TransportError::EmptyBody);
    }
    Ok(body)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, authorization: Option<&str>) -> Result<String, TransportError> {
        let mut request = self.client.get(url);
        if let Some(value) = authorization {
            request = request.header(header::AUTHORIZATION, value);
        }
        read_body(request.send().await?).await
    }

    async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> Result<String, TransportError> {
        let response = self.client.post(url).form(fields).send().await?;
        read_body(response).await
    }
}

/// How hard to try before giving up on a GET.
///
/// The primary transport is tried once, then the fallback once, then the
/// fallback up to `fallback_retries` more times. There is no delay between
/// attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub fallback_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            fallback_retries: 5,
        }
    }
}

/// HTTP client that absorbs transport failures into empty results.
#[derive(Clone)]
pub struct ApiClient {
    primary: Arc<dyn Transport>,
    fallback: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl ApiClient {
    #[must_use]
    pub fn new(
        primary: Arc<dyn Transport>,
        fallback: Arc<dyn Transport>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            primary,
            fallback,
            policy,
        }
    }

    /// Build the client from configuration using `reqwest` transports.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        Ok(Self::new(
            Arc::new(ReqwestTransport::primary(config)?),
            Arc::new(ReqwestTransport::fallback(config)?),
            RetryPolicy {
                fallback_retries: config.http_fallback_retries,
            },
        ))
    }

    /// GET a URL following the retry policy.
    ///
    /// Returns `None` when every attempt failed.
    pub async fn get(&self, url: &str, authorization: Option<&str>) -> Option<String> {
        match self.primary.get(url, authorization).await {
            Ok(body) => return Some(body),
            Err(e) => debug!(url = %redact(url), error = %e, "Primary transport failed"),
        }

        let attempts = 1 + self.policy.fallback_retries;
        for attempt in 1..=attempts {
            match self.fallback.get(url, authorization).await {
                Ok(body) => return Some(body),
                Err(e) => {
                    debug!(url = %redact(url), attempt, error = %e, "Fallback transport failed");
                }
            }
        }

        warn!(url = %redact(url), "No response after retries");
        None
    }

    /// GET a URL and decode the body as JSON.
    ///
    /// Undecodable bodies count as no response.
    pub async fn get_json(&self, url: &str, authorization: Option<&str>) -> Option<serde_json::Value> {
        let body = self.get(url, authorization).await?;
        match serde_json::from_str(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(url = %redact(url), error = %e, "Response is not valid JSON");
                None
            }
        }
    }

    /// POST form fields once and decode the JSON response.
    pub async fn post_form_json(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> Option<serde_json::Value> {
        let body = match self.primary.post_form(url, fields).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %redact(url), error = %e, "POST failed");
                return None;
            }
        };
        serde_json::from_str(&body).ok()
    }
}

/// Strip the query string so tokens and keys never reach the logs.
fn redact(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
