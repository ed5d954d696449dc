//! # Reference Assistant
//!
//! Bibliographic search across several metadata providers, merged into a
//! single deduplicated, deterministically ranked list of records.
//!
//! ## Architecture
//!
//! - [`models`]: the [`Record`] type, search filters and annotations
//! - [`sources`]: provider adapters behind the [`Source`] trait
//! - [`orchestrator`]: concurrent fan-out, merge, ranking and caching
//! - [`utils`]: deduplication, ranking, retry, rate and concurrency control
//! - [`config`]: layered configuration

pub mod config;
pub mod models;
pub mod orchestrator;
pub mod sources;
pub mod utils;

pub use models::Record;
pub use orchestrator::SearchOrchestrator;
pub use sources::{Source, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
