//! CrossRef provider implementation.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{Record, RecordBuilder, SearchFilters, SearchQuery};
use crate::sources::{configured_base_url, Source, SourceCapabilities, SourceError};
use crate::utils::{api_retry_config, with_retry, HttpClient, RetryConfig};

const CROSSREF_API_BASE: &str = "https://api.crossref.org";

/// CrossRef provider
///
/// Uses the CrossRef REST API (`/works`) for keyword search, author search
/// and DOI lookup.
#[derive(Debug, Clone)]
pub struct CrossRefSource {
    client: Arc<HttpClient>,
    base_url: String,
    mailto: Option<String>,
    retry: RetryConfig,
}

impl CrossRefSource {
    pub fn new() -> Result<Self, SourceError> {
        Self::with_mailto(None)
    }

    fn with_mailto(mailto: Option<String>) -> Result<Self, SourceError> {
        let contact = mailto.as_deref().unwrap_or("unknown");
        let user_agent = format!(
            "{}/{} (mailto:{})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            contact
        );
        Ok(Self {
            client: Arc::new(HttpClient::with_user_agent(&user_agent)?),
            base_url: CROSSREF_API_BASE.to_string(),
            mailto,
            retry: api_retry_config(),
        })
    }

    /// Build from configuration (contact address, endpoint, rate, retries)
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let mut source = Self::with_mailto(config.api_keys.crossref_mailto.clone())?;
        if let Some(url) = &config.sources.crossref_url {
            source.base_url = configured_base_url(url)?;
        }
        if let Some(rate) = config.rate_for("crossref") {
            source.client = Arc::new((*source.client).clone().with_rate_limit(rate, 1));
        }
        source.retry = config.retry;
        Ok(source)
    }

    /// Point the adapter at another endpoint (mirrors, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn filter_param(filters: &SearchFilters) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(from) = filters.year_from {
            parts.push(format!("from-pub-date:{}", from));
        }
        if let Some(to) = filters.year_to {
            parts.push(format!("until-pub-date:{}", to));
        }
        (!parts.is_empty()).then(|| parts.join(","))
    }

    async fn fetch_works(&self, params: Vec<(&'static str, String)>) -> Result<Vec<Record>, SourceError> {
        let url = format!("{}/works", self.base_url);
        let mut params = params;
        if let Some(mailto) = &self.mailto {
            params.push(("mailto", mailto.clone()));
        }

        let client = Arc::clone(&self.client);
        let data: CRListResponse = with_retry(self.retry, || {
            let client = Arc::clone(&client);
            let url = url.clone();
            let params = params.clone();
            async move { client.get_json(&url, &params).await }
        })
        .await?;

        let records: Vec<Record> = data
            .message
            .items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<CRItem>(item) {
                Ok(item) => item.into_record(),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed CrossRef item");
                    None
                }
            })
            .collect();

        Ok(records)
    }
}

#[async_trait]
impl Source for CrossRefSource {
    fn id(&self) -> &str {
        "crossref"
    }

    fn name(&self) -> &str {
        "CrossRef"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::DOI_LOOKUP
            | SourceCapabilities::AUTHOR_SEARCH
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Record>, SourceError> {
        let mut params = vec![
            ("query", query.query.clone()),
            ("rows", query.max_results.to_string()),
        ];
        if let Some(filter) = Self::filter_param(&query.filters) {
            params.push(("filter", filter));
        }
        self.fetch_works(params).await
    }

    async fn search_by_author(
        &self,
        author: &str,
        max_results: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<Record>, SourceError> {
        let mut params = vec![
            ("query.author", author.to_string()),
            ("rows", max_results.to_string()),
        ];
        if let Some(filter) = Self::filter_param(filters) {
            params.push(("filter", filter));
        }
        self.fetch_works(params).await
    }

    async fn get_by_doi(&self, doi: &str) -> Result<Option<Record>, SourceError> {
        let url = format!("{}/works/{}", self.base_url, urlencoding::encode(doi.trim()));
        let params: Vec<(&str, String)> = self
            .mailto
            .iter()
            .map(|m| ("mailto", m.clone()))
            .collect();

        let client = Arc::clone(&self.client);
        let result = with_retry(self.retry, || {
            let client = Arc::clone(&client);
            let url = url.clone();
            let params = params.clone();
            async move { client.get_json::<CRItemResponse>(&url, &params).await }
        })
        .await;

        match result {
            Ok(data) => Ok(data.message.into_record()),
            Err(SourceError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ===== CrossRef API Types =====

#[derive(Debug, Deserialize)]
struct CRListResponse {
    message: CRMessage,
}

#[derive(Debug, Deserialize)]
struct CRMessage {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CRItemResponse {
    message: CRItem,
}

#[derive(Debug, Deserialize)]
struct CRAuthor {
    given: Option<String>,
    family: Option<String>,
    name: Option<String>,
}

impl CRAuthor {
    fn display(&self) -> Option<String> {
        match (&self.family, &self.given) {
            (Some(family), Some(given)) => Some(format!("{}, {}", family.trim(), given.trim())),
            (Some(family), None) => Some(family.trim().to_string()),
            (None, _) => self.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CRDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i64>>>,
}

impl CRDate {
    fn year(&self) -> Option<i64> {
        self.date_parts.first()?.first().copied().flatten()
    }
}

#[derive(Debug, Deserialize)]
struct CRItem {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<CRAuthor>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    publisher: Option<String>,
    volume: Option<String>,
    issue: Option<String>,
    page: Option<String>,
    #[serde(rename = "type")]
    work_type: Option<String>,
    #[serde(rename = "ISBN", default)]
    isbn: Vec<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "published-print")]
    published_print: Option<CRDate>,
    #[serde(rename = "published-online")]
    published_online: Option<CRDate>,
    issued: Option<CRDate>,
}

impl CRItem {
    fn year(&self) -> Option<i64> {
        [&self.published_print, &self.published_online, &self.issued]
            .into_iter()
            .flatten()
            .find_map(CRDate::year)
    }

    /// Convert into a record; items without a title are dropped
    fn into_record(self) -> Option<Record> {
        let year = self.year();
        let title = self.title.into_iter().next()?;
        if title.trim().is_empty() {
            return None;
        }

        let mut builder = RecordBuilder::new(title.trim(), "crossref")
            .authors(self.author.iter().filter_map(CRAuthor::display));

        if let Some(year) = year {
            builder = builder.year(year.to_string());
        }
        if let Some(journal) = self.container_title.into_iter().next() {
            builder = builder.journal(journal);
        }
        if let Some(isbn) = self.isbn.into_iter().next() {
            builder = builder.isbn(isbn);
        }

        if let Some(doi) = self.doi {
            builder = builder.doi(doi);
        }
        if let Some(url) = self.url {
            builder = builder.url(url);
        }
        if let Some(publisher) = self.publisher {
            builder = builder.publisher(publisher);
        }
        if let Some(volume) = self.volume {
            builder = builder.volume(volume);
        }
        if let Some(issue) = self.issue {
            builder = builder.issue(issue);
        }
        if let Some(page) = self.page {
            builder = builder.pages(page);
        }
        if let Some(work_type) = self.work_type {
            builder = builder.pub_type(work_type);
        }
        if let Some(text) = self.abstract_text {
            builder = builder.abstract_text(text);
        }

        Some(builder.build())
    }
}
