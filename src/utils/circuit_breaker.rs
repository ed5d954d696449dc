//! Circuit breaker gating calls to a single provider.
//!
//! The breaker has three states:
//!
//! - **Closed**: normal operation, requests pass through
//! - **Open**: the provider is failing, requests are rejected immediately
//! - **Half-Open**: one trial request is let through to test recovery
//!
//! Callers consult [`CircuitBreaker::allow_request`] before every call and
//! report the outcome with [`CircuitBreaker::record_success`] or
//! [`CircuitBreaker::record_failure`].
//!
//! ```rust
//! use reference_assistant::utils::{CircuitBreaker, CircuitState};
//!
//! let breaker = CircuitBreaker::new("crossref", 5, std::time::Duration::from_secs(30));
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! assert!(breaker.allow_request());
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Failing - requests are rejected
    Open,
    /// Trial request in flight - further requests are rejected until it reports
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        write!(f, "{}", s)
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Time since the last failure before a trial request is allowed
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a circuit breaker operation
#[derive(Debug, Clone)]
pub enum CircuitResult<T> {
    /// Operation succeeded
    Success(T),
    /// Operation ran and failed
    Failure(String),
    /// Circuit is open, the operation was not run
    Rejected(String),
}

impl<T> CircuitResult<T> {
    /// Check if the operation was successful
    pub fn is_success(&self) -> bool {
        matches!(self, CircuitResult::Success(_))
    }

    /// Check if the result is a rejection due to open circuit
    pub fn is_rejected(&self) -> bool {
        matches!(self, CircuitResult::Rejected(_))
    }

    /// The success value, if any
    pub fn ok(self) -> Option<T> {
        match self {
            CircuitResult::Success(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
}

/// Thread-safe circuit breaker for one provider
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Provider id (e.g., "crossref", "pubmed")
    name: String,

    inner: Mutex<BreakerState>,

    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    ///
    /// - `name`: provider id
    /// - `failure_threshold`: consecutive failures before opening (default: 5)
    /// - `recovery_timeout`: time after the last failure before probing (default: 30s)
    pub fn new(name: &str, failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self::with_config(
            name,
            CircuitBreakerConfig {
                failure_threshold,
                recovery_timeout,
            },
        )
    }

    pub fn with_config(name: &str, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.to_string(),
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failures: 0,
                last_failure: None,
            }),
            config,
        }
    }

    /// Create with default settings
    pub fn default_for(name: &str) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state, without triggering any transition
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Number of consecutive failures recorded
    pub fn failure_count(&self) -> u32 {
        self.lock().failures
    }

    /// Gate to consult before every call
    ///
    /// An open circuit whose recovery timeout has elapsed moves to half-open
    /// and admits exactly this call as the trial request.
    pub fn allow_request(&self) -> bool {
        self.allow_request_at(Instant::now())
    }

    /// [`allow_request`](Self::allow_request) with an explicit clock
    pub fn allow_request_at(&self, now: Instant) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => false,
            CircuitState::Open => {
                let recovered = inner.last_failure.map_or(true, |at| {
                    now.saturating_duration_since(at) >= self.config.recovery_timeout
                });
                if recovered {
                    inner.state = CircuitState::HalfOpen;
                    tracing::info!(
                        "[circuit-breaker] {}: half-open, allowing trial request",
                        self.name
                    );
                }
                recovered
            }
        }
    }

    /// Record a success
    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.failures = 0;
                tracing::info!(
                    "[circuit-breaker] {}: circuit closed (recovered)",
                    self.name
                );
            }
            CircuitState::Closed => inner.failures = 0,
            // late result from a call dispatched before the circuit opened
            CircuitState::Open => {}
        }
    }

    /// Record a failure
    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    /// [`record_failure`](Self::record_failure) with an explicit clock
    pub fn record_failure_at(&self, now: Instant) {
        let mut inner = self.lock();
        inner.failures = inner.failures.saturating_add(1);
        inner.last_failure = Some(now);

        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                tracing::warn!(
                    "[circuit-breaker] {}: circuit reopened (trial request failed)",
                    self.name
                );
            }
            CircuitState::Closed if inner.failures >= self.config.failure_threshold => {
                inner.state = CircuitState::Open;
                tracing::warn!(
                    "[circuit-breaker] {}: circuit opened ({} failures)",
                    self.name,
                    inner.failures
                );
            }
            _ => {}
        }
    }

    /// Execute an async operation with circuit breaker protection
    ///
    /// Returns `CircuitResult::Rejected` without polling `operation` if the
    /// circuit does not admit the call.
    pub async fn execute<F, T, E>(&self, operation: F) -> CircuitResult<T>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        if !self.allow_request() {
            return CircuitResult::Rejected(format!(
                "circuit is open for {} (provider may be temporarily unavailable)",
                self.name
            ));
        }

        match operation.await {
            Ok(result) => {
                self.record_success();
                CircuitResult::Success(result)
            }
            Err(e) => {
                self.record_failure();
                CircuitResult::Failure(e.to_string())
            }
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.last_failure = None;
    }
}

/// Manager for multiple circuit breakers (one per provider)
#[derive(Debug, Default)]
pub struct CircuitBreakerManager {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerManager {
    /// Create a new manager with default breaker settings
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a manager whose breakers use `config`
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get or create a circuit breaker for a provider
    pub fn get(&self, source_id: &str) -> Arc<CircuitBreaker> {
        {
            let read_guard = self.breakers.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(breaker) = read_guard.get(source_id) {
                return Arc::clone(breaker);
            }
        }

        let mut write_guard = self.breakers.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            write_guard
                .entry(source_id.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::with_config(source_id, self.config))),
        )
    }

    /// Reset all circuit breakers
    pub fn reset_all(&self) {
        let guard = self.breakers.read().unwrap_or_else(PoisonError::into_inner);
        for breaker in guard.values() {
            breaker.reset();
        }
    }

    /// State of every breaker, sorted by provider id
    pub fn status(&self) -> Vec<(String, CircuitState)> {
        let guard = self.breakers.read().unwrap_or_else(PoisonError::into_inner);
        let mut status: Vec<_> = guard
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.state()))
            .collect();
        status.sort_by(|a, b| a.0.cmp(&b.0));
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_breaker_closed_by_default() {
        let breaker = CircuitBreaker::default_for("test");
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow_request());
    }

    #[test]
    fn test_circuit_breaker_opens_after_failures() {
        let breaker = CircuitBreaker::new("test", 3, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow_request());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_request());
    }

    #[test]
    fn test_circuit_breaker_success_resets() {
        let breaker = CircuitBreaker::new("test", 3, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.failure_count(), 2);

        breaker.record_success();
        assert_eq!(breaker.failure_count(), 0);

        // the counter is consecutive, so two more failures do not open it
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_admits_single_trial() {
        let breaker = CircuitBreaker::new("test", 2, Duration::from_secs(30));
        let t0 = Instant::now();

        breaker.record_failure_at(t0);
        breaker.record_failure_at(t0);
        assert_eq!(breaker.state(), CircuitState::Open);

        assert!(!breaker.allow_request_at(t0 + Duration::from_secs(29)));
        assert_eq!(breaker.state(), CircuitState::Open);

        let later = t0 + Duration::from_secs(30);
        assert!(breaker.allow_request_at(later));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // trial request still in flight
        assert!(!breaker.allow_request_at(later));
        assert!(!breaker.allow_request_at(later + Duration::from_secs(60)));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_success_closes() {
        let breaker = CircuitBreaker::new("test", 1, Duration::from_secs(30));
        let t0 = Instant::now();

        breaker.record_failure_at(t0);
        assert!(breaker.allow_request_at(t0 + Duration::from_secs(31)));

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
        assert!(breaker.allow_request());
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("test", 1, Duration::from_secs(30));
        let t0 = Instant::now();

        breaker.record_failure_at(t0);
        let trial_at = t0 + Duration::from_secs(31);
        assert!(breaker.allow_request_at(trial_at));

        breaker.record_failure_at(trial_at);
        assert_eq!(breaker.state(), CircuitState::Open);

        // recovery is measured from the failed trial request
        assert!(!breaker.allow_request_at(trial_at + Duration::from_secs(10)));
        assert!(breaker.allow_request_at(trial_at + Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_circuit_breaker_execute_success() {
        let breaker = CircuitBreaker::new("test", 3, Duration::from_secs(60));

        let result = breaker.execute(async { Ok::<i32, &str>(42) }).await;
        assert!(result.is_success());
        assert_eq!(result.ok(), Some(42));
    }

    #[tokio::test]
    async fn test_circuit_breaker_execute_rejected() {
        let breaker = CircuitBreaker::new("test", 1, Duration::from_secs(60));

        let result = breaker.execute(async { Err::<i32, &str>("boom") }).await;
        assert!(matches!(result, CircuitResult::Failure(ref msg) if msg == "boom"));
        assert_eq!(breaker.state(), CircuitState::Open);

        let result = breaker.execute(async { Ok::<i32, &str>(42) }).await;
        assert!(result.is_rejected());
    }

    #[test]
    fn test_reset() {
        let breaker = CircuitBreaker::new("test", 1, Duration::from_secs(60));
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow_request());
    }

    #[test]
    fn test_manager() {
        let manager = CircuitBreakerManager::new();

        let breaker1 = manager.get("source1");
        let breaker2 = manager.get("source2");
        let breaker1_again = manager.get("source1");

        assert!(Arc::ptr_eq(&breaker1, &breaker1_again));
        assert!(!Arc::ptr_eq(&breaker1, &breaker2));
    }

    #[test]
    fn test_manager_uses_config() {
        let manager = CircuitBreakerManager::with_config(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_secs(5),
        });

        let breaker = manager.get("pubmed");
        breaker.record_failure();

        let status = manager.status();
        assert_eq!(status, vec![("pubmed".to_string(), CircuitState::Open)]);

        manager.reset_all();
        assert_eq!(manager.get("pubmed").state(), CircuitState::Closed);
    }

    #[test]
    fn test_manager_status_sorted() {
        let manager = CircuitBreakerManager::new();

        let _ = manager.get("pubmed");
        let _ = manager.get("crossref");

        let status = manager.status();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].0, "crossref");
        assert!(status.iter().all(|(_, state)| *state == CircuitState::Closed));
    }
}
