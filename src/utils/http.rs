//! HTTP client utilities.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::sources::SourceError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared HTTP client with an optional client-side request rate limit
#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("client", &self.client)
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::with_user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
    }

    /// Create a new HTTP client with a custom user agent
    pub fn with_user_agent(user_agent: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            limiter: None,
        })
    }

    /// Create from an existing reqwest Client
    pub fn from_client(client: Arc<Client>) -> Self {
        Self {
            client,
            limiter: None,
        }
    }

    /// Limit outgoing requests to `per_second` (fractional rates allowed)
    ///
    /// Non-positive rates leave the client unlimited.
    pub fn with_rate_limit(mut self, per_second: f64, burst: u32) -> Self {
        if per_second > 0.0 && per_second.is_finite() {
            let period = Duration::from_secs_f64(1.0 / per_second);
            if let Some(quota) = Quota::with_period(period) {
                let burst = NonZeroU32::new(burst).unwrap_or(nonzero!(1u32));
                self.limiter = Some(Arc::new(RateLimiter::direct(quota.allow_burst(burst))));
            }
        }
        self
    }

    pub fn is_rate_limited(&self) -> bool {
        self.limiter.is_some()
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Issue a GET, waiting for the rate limiter first
    ///
    /// Non-success statuses are mapped onto [`SourceError`] so the retry
    /// layer can tell transient failures from permanent ones.
    pub async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Response, SourceError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        check_status(response)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let body = self.get_text(url, query).await?;
        serde_json::from_str(&body).map_err(SourceError::from)
    }

    pub async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, SourceError> {
        self.get(url, query)
            .await?
            .text()
            .await
            .map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Network(err.to_string())
    }
}

fn check_status(response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            Err(SourceError::RateLimited { retry_after })
        }
        StatusCode::NOT_FOUND => Err(SourceError::NotFound(response.url().to_string())),
        s if s.is_server_error() => Err(SourceError::Server(s.as_u16())),
        s => Err(SourceError::Api(format!("status {}", s))),
    }
}
