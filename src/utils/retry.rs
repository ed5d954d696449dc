//! Retry utilities with exponential backoff for resilient provider calls.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};

use crate::sources::SourceError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(with = "duration_secs")]
    pub initial_delay: Duration,
    /// Upper bound for a single backoff delay
    #[serde(with = "duration_secs")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Random extra delay as a fraction of the backoff (0.1 = up to +10%)
    pub jitter: f64,
    /// Maximum total time to spend on attempts and delays
    #[serde(with = "duration_secs")]
    pub max_total_time: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
            jitter: 0.1,
            max_total_time: Duration::from_secs(15),
        }
    }
}

impl RetryConfig {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_total_time(mut self, total: Duration) -> Self {
        self.max_total_time = total;
        self
    }

    /// Backoff before retry number `attempt` (1-based), without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.initial_delay.as_secs_f64()
            * self
                .backoff_multiplier
                .powf(attempt.saturating_sub(1) as f64);
        Duration::from_secs_f64(exp.min(self.max_delay.as_secs_f64()))
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(0.0..=self.jitter);
        delay.mul_f64(1.0 + factor)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, PartialEq)]
pub enum TransientError {
    /// Network connectivity issues
    Network,
    /// Rate limit exceeded (with optional retry-after seconds)
    RateLimit(Option<u64>),
    /// Server error (5xx)
    ServerError(u16),
    /// Request timeout
    Timeout,
}

impl TransientError {
    /// Check if a SourceError represents a transient error
    pub fn from_source_error(err: &SourceError) -> Option<Self> {
        match err {
            SourceError::RateLimited { retry_after } => {
                Some(TransientError::RateLimit(*retry_after))
            }
            SourceError::Network(_) => Some(TransientError::Network),
            SourceError::Timeout => Some(TransientError::Timeout),
            SourceError::Server(status) => Some(TransientError::ServerError(*status)),
            _ => None,
        }
    }

    /// Minimum wait the upstream asked for, if any
    pub fn recommended_delay(&self) -> Option<Duration> {
        match self {
            TransientError::RateLimit(Some(seconds)) => Some(Duration::from_secs(*seconds)),
            _ => None,
        }
    }
}

/// Result of a retry operation
#[derive(Debug)]
pub enum RetryResult<T> {
    /// Operation succeeded
    Success(T),
    /// Operation failed with a transient error after all retries
    TransientFailure(SourceError, TransientError, u32),
    /// Operation failed with a permanent error
    PermanentFailure(SourceError),
}

impl<T> RetryResult<T> {
    pub fn into_result(self) -> Result<T, SourceError> {
        match self {
            RetryResult::Success(value) => Ok(value),
            RetryResult::TransientFailure(err, _, _) | RetryResult::PermanentFailure(err) => {
                Err(err)
            }
        }
    }
}

/// Execute an async operation, retrying transient failures
///
/// Permanent errors return immediately. Transient errors are retried after
/// an exponential, jittered backoff (or the upstream `Retry-After`, whichever
/// is longer) until `max_attempts` or `max_total_time` is exhausted.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, operation: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    with_retry_detailed(config, operation).await.into_result()
}

/// Like [`with_retry`] but reports how the operation ended
pub async fn with_retry_detailed<T, F, Fut>(config: RetryConfig, operation: F) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    let mut attempts = 0;
    let mut total_elapsed = Duration::ZERO;
    let mut operation = operation;
    let max_attempts = config.max_attempts.max(1);

    loop {
        attempts += 1;

        let error = match timeout(config.max_total_time, operation()).await {
            Ok(Ok(result)) => {
                if attempts > 1 {
                    tracing::info!(attempts, "Operation succeeded after transient failures");
                }
                return RetryResult::Success(result);
            }
            Ok(Err(error)) => error,
            Err(_) => SourceError::Timeout,
        };

        let Some(transient) = TransientError::from_source_error(&error) else {
            return RetryResult::PermanentFailure(error);
        };

        let mut delay = config.jittered(config.backoff(attempts));
        if let Some(requested) = transient.recommended_delay() {
            delay = delay.max(requested);
        }
        total_elapsed += delay;

        if attempts >= max_attempts || total_elapsed >= config.max_total_time {
            tracing::warn!(
                attempts,
                elapsed_ms = total_elapsed.as_millis() as u64,
                error = %error,
                "Giving up after transient failures"
            );
            return RetryResult::TransientFailure(error, transient, attempts);
        }

        tracing::debug!(
            attempt = attempts,
            ?transient,
            delay_ms = delay.as_millis() as u64,
            "Transient error, retrying"
        );
        sleep(delay).await;
    }
}

/// Retry configuration for public bibliographic APIs
pub fn api_retry_config() -> RetryConfig {
    RetryConfig::default()
}
