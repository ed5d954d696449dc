//! Adaptive concurrency control for rate-sensitive providers.
//!
//! The controller watches a sliding window of request outcomes for one
//! provider and slowly widens or narrows the number of requests that may be
//! in flight at once. It does not enforce anything itself: callers read
//! [`AdaptiveConcurrencyController::capacity`] and size their own
//! concurrency (a semaphore, `buffered(n)`, ...) from it.
//!
//! Decision order on each evaluation:
//!
//! 1. error rate above `decrease_error_rate` -> decrease
//! 2. p95 latency above `decrease_p95_secs` -> decrease
//! 3. error rate below `increase_error_rate` and p95 below `increase_p95_secs` -> increase
//! 4. otherwise hold
//!
//! Evaluations are skipped until `min_samples` outcomes are in the window
//! and for `cooldown_secs` after every capacity change.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Tuning for [`AdaptiveConcurrencyController`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub min_capacity: usize,
    pub max_capacity: usize,
    pub initial_capacity: usize,

    /// Sliding window length
    pub window_secs: u64,

    /// Minimum time between two capacity changes
    pub cooldown_secs: u64,

    /// Outcomes required in the window before any decision
    pub min_samples: usize,

    pub decrease_error_rate: f64,
    pub decrease_p95_secs: f64,
    pub increase_error_rate: f64,
    pub increase_p95_secs: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            min_capacity: 4,
            max_capacity: 8,
            initial_capacity: 8,
            window_secs: 60,
            cooldown_secs: 30,
            min_samples: 10,
            decrease_error_rate: 0.02,
            decrease_p95_secs: 4.5,
            increase_error_rate: 0.005,
            increase_p95_secs: 3.0,
        }
    }
}

/// Outcome of one completed request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutcomeKind {
    /// Completed with this latency
    Latency(Duration),
    /// Throttled (429) or otherwise failed
    Error,
}

/// Timestamped outcome held in the sliding window
#[derive(Debug, Clone, Copy)]
pub struct ProviderOutcome {
    pub at: Instant,
    pub kind: OutcomeKind,
}

#[derive(Debug)]
struct ControllerState {
    capacity: usize,
    outcomes: VecDeque<ProviderOutcome>,
    last_adjustment: Option<Instant>,
}

/// Point-in-time view of the controller, for logging
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSnapshot {
    pub capacity: usize,
    pub samples: usize,
    pub error_rate: f64,
    pub p95: Duration,
}

/// Hysteresis-based concurrency controller for a single provider
#[derive(Debug)]
pub struct AdaptiveConcurrencyController {
    name: String,
    config: ControllerConfig,
    state: Mutex<ControllerState>,
}

impl AdaptiveConcurrencyController {
    pub fn new(name: &str, config: ControllerConfig) -> Self {
        let min = config.min_capacity.max(1);
        let max = config.max_capacity.max(min);
        let config = ControllerConfig {
            min_capacity: min,
            max_capacity: max,
            initial_capacity: config.initial_capacity.clamp(min, max),
            ..config
        };

        Self {
            name: name.to_string(),
            state: Mutex::new(ControllerState {
                capacity: config.initial_capacity,
                outcomes: VecDeque::new(),
                last_adjustment: None,
            }),
            config,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Currently permitted number of in-flight requests
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Report a completed request and re-evaluate
    ///
    /// Returns the new capacity when this report changed it.
    pub fn record_outcome(&self, latency: Duration, throttled: bool) -> Option<usize> {
        self.record_outcome_at(Instant::now(), latency, throttled)
    }

    /// [`record_outcome`](Self::record_outcome) with an explicit clock
    pub fn record_outcome_at(
        &self,
        now: Instant,
        latency: Duration,
        throttled: bool,
    ) -> Option<usize> {
        let kind = if throttled {
            OutcomeKind::Error
        } else {
            OutcomeKind::Latency(latency)
        };

        let mut state = self.lock();
        state.outcomes.push_back(ProviderOutcome { at: now, kind });
        self.prune(&mut state, now);
        self.evaluate(&mut state, now)
    }

    /// Capacity and window statistics
    pub fn snapshot(&self) -> ControllerSnapshot {
        let state = self.lock();
        let (error_rate, p95) = window_stats(&state.outcomes);
        ControllerSnapshot {
            capacity: state.capacity,
            samples: state.outcomes.len(),
            error_rate,
            p95,
        }
    }

    fn prune(&self, state: &mut ControllerState, now: Instant) {
        let window = Duration::from_secs(self.config.window_secs);
        while let Some(front) = state.outcomes.front() {
            if now.saturating_duration_since(front.at) > window {
                state.outcomes.pop_front();
            } else {
                break;
            }
        }
    }

    fn evaluate(&self, state: &mut ControllerState, now: Instant) -> Option<usize> {
        if let Some(last) = state.last_adjustment {
            if now.saturating_duration_since(last) < Duration::from_secs(self.config.cooldown_secs)
            {
                return None;
            }
        }

        if state.outcomes.len() < self.config.min_samples {
            return None;
        }

        let (error_rate, p95) = window_stats(&state.outcomes);
        let p95_secs = p95.as_secs_f64();
        let current = state.capacity;

        let proposed = if error_rate > self.config.decrease_error_rate {
            tracing::info!(
                controller = %self.name,
                "High error rate ({:.1}%), decreasing capacity",
                error_rate * 100.0
            );
            current.saturating_sub(1)
        } else if p95_secs > self.config.decrease_p95_secs {
            tracing::info!(
                controller = %self.name,
                "High p95 latency ({:.2}s), decreasing capacity",
                p95_secs
            );
            current.saturating_sub(1)
        } else if error_rate < self.config.increase_error_rate
            && p95_secs < self.config.increase_p95_secs
        {
            current + 1
        } else {
            current
        };

        let proposed = proposed.clamp(self.config.min_capacity, self.config.max_capacity);
        if proposed == current {
            return None;
        }

        state.capacity = proposed;
        state.last_adjustment = Some(now);
        tracing::info!(
            controller = %self.name,
            from = current,
            to = proposed,
            error_rate,
            p95_secs,
            "Concurrency capacity adjusted"
        );
        Some(proposed)
    }
}

/// Error rate over all outcomes and the p95 of the latency outcomes
fn window_stats(outcomes: &VecDeque<ProviderOutcome>) -> (f64, Duration) {
    if outcomes.is_empty() {
        return (0.0, Duration::ZERO);
    }

    let mut latencies = Vec::with_capacity(outcomes.len());
    let mut errors = 0usize;
    for outcome in outcomes {
        match outcome.kind {
            OutcomeKind::Latency(latency) => latencies.push(latency),
            OutcomeKind::Error => errors += 1,
        }
    }

    let error_rate = errors as f64 / outcomes.len() as f64;
    let p95 = if latencies.is_empty() {
        Duration::ZERO
    } else {
        latencies.sort();
        let idx = ((latencies.len() as f64 * 0.95) as usize).min(latencies.len() - 1);
        latencies[idx]
    };

    (error_rate, p95)
}
