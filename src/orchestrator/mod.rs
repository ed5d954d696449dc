//! Multi-provider search orchestration.
//!
//! [`SearchOrchestrator`] fans a query out to every enabled provider,
//! merges what comes back and hands the caller a deduplicated, ranked list.
//! Provider failures never surface as errors: a provider that times out,
//! fails or is held back by its circuit breaker simply contributes nothing.
//!
//! ```rust,no_run
//! use reference_assistant::config::Config;
//! use reference_assistant::models::SearchFilters;
//! use reference_assistant::orchestrator::SearchOrchestrator;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let orchestrator = SearchOrchestrator::from_config(&Config::default())?;
//! let records = orchestrator
//!     .search_many("attention is all you need", 5, &SearchFilters::default())
//!     .await?;
//! for record in records {
//!     println!("{} ({})", record.title, record.source);
//! }
//! # Ok(())
//! # }
//! ```

mod classify;
mod filters;
mod invariants;

pub use classify::{
    extract_doi, is_doi_query, Classification, HeuristicClassifier, QueryClassifier,
    ARTICLE_LABEL, BOOK_CONFIDENCE, BOOK_LABEL,
};
pub use filters::{apply_filters, passes_filters};
pub use invariants::{ensure_invariants, InvariantViolation};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::{timeout, timeout_at, Instant};

use crate::config::{Config, SearchConfig};
use crate::models::{MatchType, Record, RetrievalMethod, SearchFilters, SearchMode, SearchQuery};
use crate::sources::{Source, SourceCapabilities, SourceError, SourceRegistry};
use crate::utils::{
    author_matches, canonical_order, deduplicate_records, partial_ratio, ratio,
    split_author_query, CachedValue, CircuitBreakerConfig, CircuitBreakerManager, CircuitState,
    FuzzyNameMatcher, NameMatcher, RankingEngine, ResultCache,
};

/// Title ratio above which an enrichment candidate is the same work
const ENRICH_RATIO: u32 = 80;

/// Partial ratio above which a longer candidate title completes a truncated one
const ENRICH_PARTIAL_RATIO: u32 = 90;

/// Fan-out limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorConfig {
    /// Bound on a single provider call
    pub task_timeout: Duration,
    /// Bound on collecting results from all providers
    pub dispatch_timeout: Duration,
    /// Provider calls allowed in flight at once
    pub max_workers: usize,
    /// Per-provider limit used by `search_single`
    pub default_limit: usize,
    /// Per-provider limit used by `search_by_author`
    pub author_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for OrchestratorConfig {
    fn from(config: &SearchConfig) -> Self {
        Self {
            task_timeout: config.task_timeout(),
            dispatch_timeout: config.dispatch_timeout(),
            max_workers: config.max_workers.max(1),
            default_limit: config.default_limit.max(1),
            author_limit: config.author_limit.max(1),
        }
    }
}

/// The operation sent to each provider during a fan-out
#[derive(Debug, Clone)]
enum ProviderCall {
    Search(SearchQuery),
    Author {
        author: String,
        limit: usize,
        filters: SearchFilters,
    },
}

impl ProviderCall {
    async fn run(&self, source: &dyn Source) -> Result<Vec<Record>, SourceError> {
        match self {
            ProviderCall::Search(query) => source.search(query).await,
            ProviderCall::Author {
                author,
                limit,
                filters,
            } => source.search_by_author(author, *limit, filters).await,
        }
    }
}

/// Runs searches across every registered provider
#[derive(Debug)]
pub struct SearchOrchestrator {
    registry: SourceRegistry,
    breakers: CircuitBreakerManager,
    cache: Option<Arc<ResultCache>>,
    ranking: RankingEngine,
    classifier: Arc<dyn QueryClassifier>,
    name_matcher: Arc<dyn NameMatcher>,
    config: OrchestratorConfig,
}

/// Builder for [`SearchOrchestrator`]
#[derive(Debug)]
pub struct SearchOrchestratorBuilder {
    registry: SourceRegistry,
    config: OrchestratorConfig,
    breaker_config: CircuitBreakerConfig,
    cache: Option<Arc<ResultCache>>,
    ranking: RankingEngine,
    classifier: Arc<dyn QueryClassifier>,
    name_matcher: Arc<dyn NameMatcher>,
}

impl SearchOrchestratorBuilder {
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    /// Serve and store results through `cache`
    pub fn cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn ranking(mut self, ranking: RankingEngine) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn QueryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn name_matcher(mut self, matcher: Arc<dyn NameMatcher>) -> Self {
        self.name_matcher = matcher;
        self
    }

    pub fn build(self) -> SearchOrchestrator {
        SearchOrchestrator {
            registry: self.registry,
            breakers: CircuitBreakerManager::with_config(self.breaker_config),
            cache: self.cache,
            ranking: self.ranking,
            classifier: self.classifier,
            name_matcher: self.name_matcher,
            config: self.config,
        }
    }
}

impl SearchOrchestrator {
    pub fn builder(registry: SourceRegistry) -> SearchOrchestratorBuilder {
        SearchOrchestratorBuilder {
            registry,
            config: OrchestratorConfig::default(),
            breaker_config: CircuitBreakerConfig::default(),
            cache: None,
            ranking: RankingEngine::new(),
            classifier: Arc::new(HeuristicClassifier),
            name_matcher: Arc::new(FuzzyNameMatcher),
        }
    }

    /// Build providers, breakers and the cache from configuration
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let registry = SourceRegistry::from_config(config)?;
        let mut builder = Self::builder(registry)
            .config(OrchestratorConfig::from(&config.search))
            .breaker_config(CircuitBreakerConfig::from(&config.breaker));

        if config.cache.enabled {
            builder = builder.cache(Arc::new(ResultCache::from_config(&config.cache)));
        }

        Ok(builder.build())
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Circuit state of every provider that has been called
    pub fn breaker_status(&self) -> Vec<(String, CircuitState)> {
        self.breakers.status()
    }

    /// Find the single best record for a free-text query or DOI
    ///
    /// Order of resolution: result cache, DOI lookup for DOI-shaped
    /// queries, then a full multi-provider search. Found records are cached.
    pub async fn search_single(&self, query: &str) -> Result<Option<Record>, InvariantViolation> {
        let query = query.trim();
        if query.is_empty() {
            tracing::warn!("Empty query, nothing to search");
            return Ok(None);
        }

        let key = ResultCache::query_key(query);
        if let Some(cache) = &self.cache {
            if let Some(mut record) = cache
                .get(&key)
                .and_then(|value| value.into_records().into_iter().next())
            {
                tracing::debug!(query, "Cache hit");
                record.retrieval_method = RetrievalMethod::Cache;
                return Ok(Some(record));
            }
        }

        let found = match self.lookup_doi_query(query).await {
            Some(record) => Some(record),
            None => self
                .search_many(query, self.config.default_limit, &SearchFilters::default())
                .await?
                .into_iter()
                .next(),
        };

        if let Some(record) = &found {
            self.store(key, CachedValue::One(record.clone())).await;
        }

        Ok(found)
    }

    /// Search every provider and return the merged, ranked list
    ///
    /// `limit` is passed to each provider; the merged list is not truncated.
    pub async fn search_many(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<Record>, InvariantViolation> {
        self.search_with_mode(query, limit, filters, SearchMode::General)
            .await
    }

    /// [`search_many`](Self::search_many) with an explicit [`SearchMode`]
    ///
    /// In title mode the query is treated as a work title and results
    /// without a strong title match are dropped rather than demoted.
    pub async fn search_with_mode(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
        mode: SearchMode,
    ) -> Result<Vec<Record>, InvariantViolation> {
        let query = query.trim();
        if query.is_empty() {
            tracing::warn!("Empty query, nothing to search");
            return Ok(Vec::new());
        }

        let limit = if limit == 0 {
            self.config.default_limit
        } else {
            limit
        };
        let sources: Vec<Arc<dyn Source>> =
            self.registry.searchable().into_iter().cloned().collect();
        let search = SearchQuery::new(query)
            .max_results(limit)
            .filters(filters.clone())
            .mode(mode);

        let collected = self.fan_out(sources, ProviderCall::Search(search)).await;
        let collected_count = collected.len();

        let merged = merge(collected, &self.provider_priority(query));
        let ranked = self.ranking.rank_with_mode(merged, query, mode);
        let results = apply_filters(ranked, filters);

        ensure_invariants(&results)?;
        tracing::info!(
            query,
            %mode,
            collected = collected_count,
            results = results.len(),
            "Search complete"
        );
        Ok(results)
    }

    /// Collect works by an author from every author-capable provider
    ///
    /// Works whose author list has no name matching the query are dropped.
    pub async fn search_by_author(
        &self,
        author: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<Record>, InvariantViolation> {
        let author = author.trim();
        if author.is_empty() {
            tracing::warn!("Empty author, nothing to search");
            return Ok(Vec::new());
        }

        let key = ResultCache::author_key(author, filters);
        if let Some(cache) = &self.cache {
            if let Some(value) = cache.get(&key) {
                tracing::debug!(author, "Cache hit");
                let mut records = value.into_records();
                for record in &mut records {
                    record.retrieval_method = RetrievalMethod::Cache;
                }
                return Ok(records);
            }
        }

        let sources: Vec<Arc<dyn Source>> = self
            .registry
            .with_capability(SourceCapabilities::AUTHOR_SEARCH)
            .into_iter()
            .cloned()
            .collect();
        let call = ProviderCall::Author {
            author: author.to_string(),
            limit: self.config.author_limit,
            filters: filters.clone(),
        };
        let collected = self.fan_out(sources, call).await;

        let wanted = split_author_query(author);
        let matcher = self.name_matcher.as_ref();
        let matched: Vec<(Record, String)> = collected
            .into_iter()
            .filter(|(record, _)| {
                record
                    .authors
                    .iter()
                    .any(|candidate| author_matches(matcher, &wanted, candidate))
            })
            .collect();

        let mut works = apply_filters(stamp(matched), filters);
        for work in &mut works {
            work.match_type = MatchType::AuthorMatch;
            work.author_ambiguity = author_ambiguity(work);
        }

        let priority: Vec<String> = self.registry.ids().map(str::to_string).collect();
        canonical_order(&mut works, &priority);
        let works = self.ranking.rank_author_works(deduplicate_records(works));

        ensure_invariants(&works)?;
        tracing::info!(author, results = works.len(), "Author search complete");

        if !works.is_empty() {
            self.store(key, CachedValue::Many(works.clone())).await;
        }
        Ok(works)
    }

    /// Fetch fuller metadata for a record whose title may be truncated
    ///
    /// A record with a DOI is looked up by DOI. Otherwise its title is sent
    /// as a one-row search to each DOI-capable provider, and the candidate is
    /// taken when the titles are close or the candidate's longer title
    /// contains the original. The ranking annotations of `record` carry over.
    /// Returns `record` unchanged when nothing better is found.
    pub async fn enrich(&self, record: &Record) -> Record {
        tracing::info!(title = %record.title, "Enriching record");

        let enriched = match record.identifier() {
            Some(doi) => self.resolve_doi(doi).await,
            None => None,
        };
        let enriched = match enriched {
            Some(found) => Some(found),
            None => self.enrich_by_title(&record.title).await,
        };

        match enriched {
            Some(mut found) => {
                found.match_type = record.match_type;
                found.confidence_score = record.confidence_score;
                found.is_selected = record.is_selected;
                found.selection = record.selection.clone();
                found
            }
            None => record.clone(),
        }
    }

    async fn enrich_by_title(&self, title: &str) -> Option<Record> {
        let title = title.trim();
        if title.is_empty() {
            return None;
        }
        let wanted = title.to_lowercase();
        let query = SearchQuery::new(title).max_results(1).mode(SearchMode::Title);

        for source in self
            .registry
            .with_capability(SourceCapabilities::SEARCH | SourceCapabilities::DOI_LOOKUP)
        {
            let Some(candidates) = self
                .guarded_call(source.id(), "enrich", source.search(&query))
                .await
            else {
                continue;
            };
            let Some(mut candidate) = candidates.into_iter().next() else {
                continue;
            };

            let found = candidate.title.trim().to_lowercase();
            let full = ratio(&wanted, &found);
            let partial = partial_ratio(&wanted, &found);
            let longer = found.chars().count() > wanted.chars().count();

            if full > ENRICH_RATIO || (partial > ENRICH_PARTIAL_RATIO && longer) {
                tracing::info!(source = source.id(), ratio = full, partial, "Enriched by title search");
                candidate.source = source.id().to_string();
                candidate.retrieval_method = RetrievalMethod::Api;
                return Some(candidate);
            }
            tracing::debug!(source = source.id(), ratio = full, partial, "Enrichment candidate rejected");
        }

        None
    }

    /// Resolve a DOI-shaped query directly, trying DOI-capable providers in order
    async fn lookup_doi_query(&self, query: &str) -> Option<Record> {
        if !is_doi_query(query) {
            return None;
        }
        let Some(doi) = extract_doi(query) else {
            tracing::debug!(query, "No DOI found in DOI-like query");
            return None;
        };

        let mut record = self.resolve_doi(&doi).await?;
        record.match_type = MatchType::Exact;
        record.confidence_score = 1.0;
        record.is_selected = true;
        Some(record)
    }

    /// First DOI-capable provider that knows `doi`
    async fn resolve_doi(&self, doi: &str) -> Option<Record> {
        for source in self
            .registry
            .with_capability(SourceCapabilities::DOI_LOOKUP)
        {
            match self
                .guarded_call(source.id(), "doi_lookup", source.get_by_doi(doi))
                .await
            {
                Some(Some(mut record)) => {
                    tracing::debug!(source = source.id(), %doi, "Resolved DOI");
                    record.source = source.id().to_string();
                    record.retrieval_method = RetrievalMethod::DoiLookup;
                    return Some(record);
                }
                Some(None) => tracing::debug!(source = source.id(), %doi, "DOI not found"),
                None => {}
            }
        }

        None
    }

    /// A single provider call under its circuit breaker and the task timeout
    async fn guarded_call<T>(
        &self,
        source_id: &str,
        operation: &'static str,
        call: impl Future<Output = Result<T, SourceError>>,
    ) -> Option<T> {
        let breaker = self.breakers.get(source_id);
        if !breaker.allow_request() {
            tracing::warn!(source = source_id, operation, "Circuit open, skipping provider");
            return None;
        }

        match timeout(self.config.task_timeout, call).await {
            Ok(Ok(value)) => {
                breaker.record_success();
                Some(value)
            }
            Ok(Err(e)) => {
                breaker.record_failure();
                tracing::warn!(source = source_id, operation, error = %e, "Provider call failed");
                None
            }
            Err(_) => {
                breaker.record_failure();
                tracing::warn!(source = source_id, operation, "Provider call timed out");
                None
            }
        }
    }

    /// Run `call` against every source concurrently
    ///
    /// Returns `(record, provider id)` pairs in arrival order. Providers
    /// still running at the dispatch deadline are abandoned.
    async fn fan_out(
        &self,
        sources: Vec<Arc<dyn Source>>,
        call: ProviderCall,
    ) -> Vec<(Record, String)> {
        let (sender, mut receiver) = mpsc::channel::<(String, Vec<Record>)>(sources.len().max(1));
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let deadline = Instant::now() + self.config.dispatch_timeout;
        let task_timeout = self.config.task_timeout;
        let call = Arc::new(call);

        for source in sources {
            let breaker = self.breakers.get(source.id());
            if !breaker.allow_request() {
                tracing::warn!(source = source.id(), "Circuit open, skipping provider");
                continue;
            }

            let sender = sender.clone();
            let semaphore = Arc::clone(&semaphore);
            let call = Arc::clone(&call);

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let id = source.id().to_string();
                let started = Instant::now();

                match timeout(task_timeout, call.run(source.as_ref())).await {
                    Ok(Ok(records)) => {
                        breaker.record_success();
                        tracing::debug!(
                            source = %id,
                            count = records.len(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Provider returned"
                        );
                        if records.is_empty() {
                            return;
                        }
                        if sender.send((id.clone(), records)).await.is_err() {
                            tracing::debug!(source = %id, "Results arrived after dispatch deadline");
                        }
                    }
                    Ok(Err(e)) => {
                        breaker.record_failure();
                        tracing::warn!(source = %id, error = %e, "Provider failed");
                    }
                    Err(_) => {
                        breaker.record_failure();
                        tracing::warn!(
                            source = %id,
                            timeout_ms = task_timeout.as_millis() as u64,
                            "Provider timed out"
                        );
                    }
                }
            });
        }
        drop(sender);

        let mut collected = Vec::new();
        loop {
            match timeout_at(deadline, receiver.recv()).await {
                Ok(Some((id, records))) => {
                    collected.extend(records.into_iter().map(|record| (record, id.clone())));
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        collected = collected.len(),
                        "Dispatch deadline passed, abandoning outstanding providers"
                    );
                    break;
                }
            }
        }
        collected
    }

    /// Registry order, with book providers first for book-like queries
    fn provider_priority(&self, query: &str) -> Vec<String> {
        let mut sources: Vec<&Arc<dyn Source>> = self.registry.all().collect();
        let classification = self.classifier.classify(query);
        if classification.is_book() {
            tracing::debug!(
                query,
                confidence = classification.confidence,
                "Book-like query, preferring book providers"
            );
            sources.sort_by_key(|source| !source.is_book_source());
        }
        sources.iter().map(|s| s.id().to_string()).collect()
    }

    /// Put a value in the cache and write the snapshot on a blocking thread
    async fn store(&self, key: String, value: CachedValue) {
        let Some(cache) = &self.cache else {
            return;
        };
        cache.put(key, value);

        let cache = Arc::clone(cache);
        match tokio::task::spawn_blocking(move || cache.persist()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to persist result cache"),
            Err(e) => tracing::warn!(error = %e, "Cache persist task failed"),
        }
    }
}

fn stamp(collected: Vec<(Record, String)>) -> Vec<Record> {
    collected
        .into_iter()
        .map(|(mut record, provider)| {
            record.source = provider;
            record
        })
        .collect()
}

fn merge(collected: Vec<(Record, String)>, priority: &[String]) -> Vec<Record> {
    let mut records = stamp(collected);
    canonical_order(&mut records, priority);
    deduplicate_records(records)
}

/// Likelihood that an author match is a namesake rather than the person
fn author_ambiguity(record: &Record) -> f64 {
    match record.authors.as_slice() {
        [only] if only.split_whitespace().count() == 1 => 0.8,
        authors if authors.len() > 50 => 0.2,
        _ => 0.0,
    }
}
