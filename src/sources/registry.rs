//! Ordered registry of provider adapters.

use std::sync::Arc;

use super::{Source, SourceError};
use crate::config::Config;

bitflags::bitflags! {
    /// Capabilities that a provider can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        const DOI_LOOKUP = 1 << 1;
        const AUTHOR_SEARCH = 1 << 2;
        /// Mostly indexes books; preferred for book-like queries
        const BOOKS = 1 << 3;
    }
}

/// Registry of provider adapters in priority order
///
/// Registration order is the default provider priority: it decides which
/// record survives deduplication when two providers return the same work.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the compiled-in providers allowed by the configuration
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "source-crossref")]
        if config.sources.is_enabled("crossref") {
            let source = super::CrossRefSource::from_config(config)?;
            registry.register(Arc::new(source));
        }

        #[cfg(feature = "source-pubmed")]
        if config.sources.is_enabled("pubmed") {
            let source = super::PubMedSource::from_config(config)?;
            registry.register(Arc::new(source));
        }

        #[cfg(feature = "source-google_books")]
        if config.sources.is_enabled("google_books") {
            let source = super::GoogleBooksSource::from_config(config)?;
            registry.register(Arc::new(source));
        }

        tracing::debug!(sources = ?registry.ids().collect::<Vec<_>>(), "Registered sources");
        Ok(registry)
    }

    /// Register a provider; an existing provider with the same id is replaced
    /// in place
    pub fn register(&mut self, source: Arc<dyn Source>) {
        match self.sources.iter().position(|s| s.id() == source.id()) {
            Some(idx) => self.sources[idx] = source,
            None => self.sources.push(source),
        }
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_source(mut self, source: Arc<dyn Source>) -> Self {
        self.register(source);
        self
    }

    /// Get a provider by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|s| s.id() == id)
    }

    /// Get a provider by ID, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<&Arc<dyn Source>, SourceError> {
        self.get(id)
            .ok_or_else(|| SourceError::NotFound(format!("Source '{}' not found", id)))
    }

    /// All providers in priority order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.iter()
    }

    /// All provider IDs in priority order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id())
    }

    /// Providers that support a specific capability, in priority order
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    pub fn searchable(&self) -> Vec<&Arc<dyn Source>> {
        self.with_capability(SourceCapabilities::SEARCH)
    }

    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockSource;

    fn registry() -> SourceRegistry {
        SourceRegistry::new()
            .with_source(Arc::new(MockSource::new("crossref")))
            .with_source(Arc::new(
                MockSource::new("google_books").with_capabilities(
                    SourceCapabilities::SEARCH | SourceCapabilities::BOOKS,
                ),
            ))
            .with_source(Arc::new(MockSource::new("pubmed")))
    }

    #[test]
    fn test_registry_keeps_order() {
        let registry = registry();
        assert_eq!(
            registry.ids().collect::<Vec<_>>(),
            vec!["crossref", "google_books", "pubmed"]
        );
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = registry();
        registry.register(Arc::new(MockSource::new("google_books")));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.ids().nth(1), Some("google_books"));
        assert!(!registry.get("google_books").unwrap().is_book_source());
    }

    #[test]
    fn test_get_source() {
        let registry = registry();
        assert_eq!(registry.get("pubmed").unwrap().id(), "pubmed");
        assert!(registry.get("nonexistent").is_none());
        assert!(registry.get_required("nonexistent").is_err());
    }

    #[test]
    fn test_capabilities() {
        let registry = registry();
        let books = registry.with_capability(SourceCapabilities::BOOKS);
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].id(), "google_books");
        assert_eq!(registry.searchable().len(), 3);
    }

    #[cfg(all(
        feature = "source-crossref",
        feature = "source-pubmed",
        feature = "source-google_books"
    ))]
    #[test]
    fn test_from_config_respects_lists() {
        let mut config = Config::default();
        config.sources.disabled = Some("pubmed".to_string());

        let registry = SourceRegistry::from_config(&config).unwrap();
        assert_eq!(
            registry.ids().collect::<Vec<_>>(),
            vec!["crossref", "google_books"]
        );
    }
}
