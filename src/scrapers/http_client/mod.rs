//! HTTP client used for listing pages and artifact payloads.

mod user_agent;

pub use user_agent::resolve_user_agent;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

use super::rate_limiter::{RateLimitConfig, RateLimiter};
use super::{FetchError, PayloadFetcher};

/// HTTP client with per-domain politeness delays.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter,
}

impl HttpClient {
    /// Create a new HTTP client with the default user agent.
    pub fn new(timeout: Duration, request_delay: Duration) -> Result<Self, FetchError> {
        Self::with_user_agent(timeout, request_delay, None)
    }

    /// Create a client whose `User-Agent` follows the `user_agent` setting
    /// (see [`resolve_user_agent`]).
    pub fn with_user_agent(
        timeout: Duration,
        request_delay: Duration,
        user_agent_config: Option<&str>,
    ) -> Result<Self, FetchError> {
        let limiter = RateLimiter::with_config(RateLimitConfig::with_base_delay(request_delay));
        Self::with_rate_limiter(timeout, limiter, user_agent_config)
    }

    /// Create a new HTTP client sharing an existing rate limiter.
    pub fn with_rate_limiter(
        timeout: Duration,
        rate_limiter: RateLimiter,
        user_agent_config: Option<&str>,
    ) -> Result<Self, FetchError> {
        let user_agent = resolve_user_agent(user_agent_config);
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| FetchError::Other(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rate_limiter,
        })
    }

    /// GET a URL, failing on any non-2xx status.
    pub async fn get(&self, url: &str) -> Result<Response, FetchError> {
        let domain = self.rate_limiter.acquire(url).await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        debug!("GET {} -> {}", url, status.as_u16());

        if let Some(ref domain) = domain {
            if RateLimiter::is_rate_limit(status.as_u16()) {
                self.rate_limiter
                    .report_rate_limit(domain, status.as_u16())
                    .await;
            } else if status.is_success() {
                self.rate_limiter.report_success(domain).await;
            }
        }

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    /// GET a URL and return its body.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get(url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl PayloadFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.get_bytes(url).await
    }
}
