//! Utility modules supporting retrieval.
//!
//! - [`deduplicate_records`]: merge records describing the same work
//! - [`RankingEngine`]: deterministic relevance ranking
//! - [`AdaptiveConcurrencyController`]: latency/error driven concurrency for one provider
//! - [`CircuitBreaker`]: fail-fast gate per provider
//! - [`ResultCache`]: TTL cache with atomic JSON snapshots
//! - [`HttpClient`]: HTTP client with optional client-side rate limiting
//! - [`with_retry`]: retry transient provider errors with backoff
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use reference_assistant::sources::SourceError;
//! use reference_assistant::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let config = RetryConfig::default().max_attempts(3);
//! let result = with_retry(config, || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Ranking
//!
//! ```rust
//! use reference_assistant::models::RecordBuilder;
//! use reference_assistant::utils::{deduplicate_records, RankingEngine};
//!
//! let records = vec![
//!     RecordBuilder::new("Zebra", "crossref").doi("10.1/z").build(),
//!     RecordBuilder::new("Test Pub A", "crossref").doi("10.1/a").build(),
//!     RecordBuilder::new("Test Pub A", "google_books").doi("10.1/a").build(),
//! ];
//! let ranked = RankingEngine::new().rank(deduplicate_records(records), "Test Pub");
//! assert_eq!(ranked[0].title, "Test Pub A");
//! assert_eq!(ranked.len(), 2);
//! ```

mod cache;
mod circuit_breaker;
mod concurrency;
mod dedup;
mod http;
mod names;
mod ranking;
mod retry;
mod similarity;

pub use cache::{
    now_unix, CacheEntry, CacheError, CacheStats, CachedValue, ResultCache, DEFAULT_TTL,
};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerManager, CircuitResult, CircuitState,
};
pub use concurrency::{
    AdaptiveConcurrencyController, ControllerConfig, ControllerSnapshot, OutcomeKind,
    ProviderOutcome,
};
pub use dedup::{
    are_duplicates, canonical_order, deduplicate_records, find_duplicates, merge_into,
    TITLE_SIMILARITY_THRESHOLD,
};
pub use http::HttpClient;
pub use names::{
    author_matches, split_author_query, split_candidate_name, FuzzyNameMatcher, NameMatcher,
};
pub use ranking::{significant_tokens, RankingEngine, Score, MAX_SCORE, TITLE_MODE_MIN_SCORE};
pub use retry::{
    api_retry_config, with_retry, with_retry_detailed, RetryConfig, RetryResult, TransientError,
};
pub use similarity::{partial_ratio, ratio, similarity};
