//! Bibliographic provider adapters with a trait-based plugin architecture.
//!
//! Every provider implements [`Source`]. The orchestrator only talks to
//! providers through this trait, so new providers can be added by
//! implementing it and registering them with the [`SourceRegistry`].
//!
//! # Feature Flags
//!
//! Individual providers can be disabled at compile time:
//!
//! - `crossref` - CrossRef REST API (default: enabled)
//! - `pubmed` - NCBI PubMed E-utilities (default: enabled)
//! - `google_books` - Google Books volumes API (default: enabled)
//!
//! # Runtime Configuration
//!
//! Compiled-in providers can be switched on and off with the `[sources]`
//! configuration section (`enabled` / `disabled` lists). A provider listed in
//! `disabled` is never used; when `enabled` is non-empty only those providers
//! are used. The registry keeps providers in priority order, which becomes
//! the canonical order used before deduplication.

#[cfg(feature = "source-crossref")]
mod crossref;
#[cfg(feature = "source-google_books")]
mod google_books;
#[cfg(feature = "source-pubmed")]
mod pubmed;
mod registry;

pub mod mock;

#[cfg(feature = "source-crossref")]
pub use crossref::CrossRefSource;
#[cfg(feature = "source-google_books")]
pub use google_books::GoogleBooksSource;
pub use mock::MockSource;
#[cfg(feature = "source-pubmed")]
pub use pubmed::PubMedSource;
pub use registry::{SourceCapabilities, SourceRegistry};

use async_trait::async_trait;

use crate::models::{Record, SearchFilters, SearchQuery};

/// The Source trait defines the interface for all provider adapters.
///
/// Adapters return owned [`Record`]s. Malformed items in an upstream payload
/// are skipped rather than failing the whole call.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this provider (e.g. "crossref"), used as the
    /// record `source` tag
    fn id(&self) -> &str;

    /// Human-readable name of this provider
    fn name(&self) -> &str;

    /// Describe the capabilities of this provider
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    /// Whether this provider supports lookup by DOI
    fn supports_doi_lookup(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::DOI_LOOKUP)
    }

    /// Whether this provider supports author search
    fn supports_author_search(&self) -> bool {
        self.capabilities()
            .contains(SourceCapabilities::AUTHOR_SEARCH)
    }

    /// Whether this provider mostly indexes books
    fn is_book_source(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::BOOKS)
    }

    /// Search for works matching the query
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Record>, SourceError>;

    /// Search for works by a specific author
    async fn search_by_author(
        &self,
        _author: &str,
        _max_results: usize,
        _filters: &SearchFilters,
    ) -> Result<Vec<Record>, SourceError> {
        Err(SourceError::NotImplemented)
    }

    /// Get a work by its DOI; `Ok(None)` when the provider does not know it
    async fn get_by_doi(&self, _doi: &str) -> Result<Option<Record>, SourceError> {
        Err(SourceError::NotImplemented)
    }
}

/// Errors that can occur when interacting with a provider
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not implemented for this provider
    #[error("Operation not implemented for this source")]
    NotImplemented,

    /// Network or connection error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (XML, JSON)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream throttled the request (HTTP 429)
    #[error("Rate limit exceeded (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    /// Upstream server error (HTTP 5xx)
    #[error("Server error: HTTP {0}")]
    Server(u16),

    /// Work or resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other API error from the provider
    #[error("API error: {0}")]
    Api(String),

    /// The request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl SourceError {
    /// Whether the error reflects the provider throttling us
    pub fn is_throttle(&self) -> bool {
        matches!(self, SourceError::RateLimited { .. })
    }
}

/// Validate a configured provider base URL and strip any trailing slash
///
/// Only absolute `http` and `https` URLs are accepted.
pub fn configured_base_url(raw: &str) -> Result<String, SourceError> {
    let trimmed = raw.trim();
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| SourceError::InvalidRequest(format!("base URL {:?}: {}", trimmed, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.trim_end_matches('/').to_string()),
        scheme => Err(SourceError::InvalidRequest(format!(
            "base URL {:?}: unsupported scheme {}",
            trimmed, scheme
        ))),
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::DeError> for SourceError {
    fn from(err: quick_xml::DeError) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}
