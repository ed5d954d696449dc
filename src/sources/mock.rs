//! In-process provider for tests and offline demos.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::models::{Record, SearchFilters, SearchQuery};
use crate::sources::{Source, SourceCapabilities, SourceError};

/// A provider that returns predefined records after an optional delay
#[derive(Debug)]
pub struct MockSource {
    id: String,
    capabilities: SourceCapabilities,
    records: Mutex<Vec<Record>>,
    author_records: Mutex<Option<Vec<Record>>>,
    failure: Mutex<Option<SourceError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockSource {
    /// Create an empty mock provider with search, DOI and author capabilities
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capabilities: SourceCapabilities::SEARCH
                | SourceCapabilities::DOI_LOOKUP
                | SourceCapabilities::AUTHOR_SEARCH,
            records: Mutex::new(Vec::new()),
            author_records: Mutex::new(None),
            failure: Mutex::new(None),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_records(self, records: Vec<Record>) -> Self {
        self.set_records(records);
        self
    }

    /// Records returned by author search instead of the search records
    pub fn with_author_records(self, records: Vec<Record>) -> Self {
        *self
            .author_records
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(records);
        self
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every call with this error
    pub fn with_failure(self, error: SourceError) -> Self {
        self.set_failure(Some(error));
        self
    }

    pub fn with_capabilities(mut self, capabilities: SourceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn set_records(&self, records: Vec<Record>) {
        *self.records.lock().unwrap_or_else(PoisonError::into_inner) = records;
    }

    pub fn set_failure(&self, error: Option<SourceError>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// Number of calls received so far, across all operations
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn snapshot(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    fn capabilities(&self) -> SourceCapabilities {
        self.capabilities
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Record>, SourceError> {
        self.respond().await?;
        let mut records = self.snapshot();
        records.truncate(query.max_results);
        Ok(records)
    }

    async fn search_by_author(
        &self,
        _author: &str,
        max_results: usize,
        _filters: &SearchFilters,
    ) -> Result<Vec<Record>, SourceError> {
        self.respond().await?;
        let mut records = self
            .author_records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| self.snapshot());
        records.truncate(max_results);
        Ok(records)
    }

    async fn get_by_doi(&self, doi: &str) -> Result<Option<Record>, SourceError> {
        self.respond().await?;
        let wanted = doi.trim().to_lowercase();
        Ok(self
            .snapshot()
            .into_iter()
            .find(|r| r.normalized_identifier().as_deref() == Some(wanted.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordBuilder;

    #[tokio::test]
    async fn test_mock_search_and_lookup() {
        let source = MockSource::new("crossref").with_records(vec![
            RecordBuilder::new("One", "crossref").doi("10.1/ONE").build(),
            RecordBuilder::new("Two", "crossref").build(),
        ]);

        let found = source.search(&SearchQuery::new("x").max_results(1)).await.unwrap();
        assert_eq!(found.len(), 1);

        let by_doi = source.get_by_doi(" 10.1/one ").await.unwrap();
        assert_eq!(by_doi.unwrap().title, "One");
        assert!(source.get_by_doi("10.1/missing").await.unwrap().is_none());
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let source = MockSource::new("pubmed").with_failure(SourceError::Server(503));
        let result = source.search(&SearchQuery::new("x")).await;
        assert!(matches!(result, Err(SourceError::Server(503))));

        source.set_failure(None);
        assert!(source.search(&SearchQuery::new("x")).await.is_ok());
    }
}
