//! Google Books provider implementation.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{first_four_digit_run, Record, RecordBuilder, SearchFilters, SearchQuery};
use crate::sources::{configured_base_url, Source, SourceCapabilities, SourceError};
use crate::utils::{api_retry_config, with_retry, HttpClient, RetryConfig};

const GOOGLE_BOOKS_API_BASE: &str = "https://www.googleapis.com/books/v1";

/// Google Books caps `maxResults` at 40
const MAX_PAGE_SIZE: usize = 40;

/// Google Books provider (`/volumes`)
#[derive(Debug, Clone)]
pub struct GoogleBooksSource {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl GoogleBooksSource {
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            base_url: GOOGLE_BOOKS_API_BASE.to_string(),
            api_key: None,
            retry: api_retry_config(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let mut source = Self::new()?;
        source.api_key = config.api_keys.google_books.clone();
        if let Some(url) = &config.sources.google_books_url {
            source.base_url = configured_base_url(url)?;
        }
        if let Some(rate) = config.rate_for("google_books") {
            source.client = Arc::new((*source.client).clone().with_rate_limit(rate, 1));
        }
        source.retry = config.retry;
        Ok(source)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn volumes(&self, q: String, max_results: usize) -> Result<Vec<Record>, SourceError> {
        let url = format!("{}/volumes", self.base_url);
        let mut params = vec![
            ("q", q),
            ("maxResults", max_results.clamp(1, MAX_PAGE_SIZE).to_string()),
            ("printType", "books".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("key", key.clone()));
        }

        let client = Arc::clone(&self.client);
        let data: VolumesResponse = with_retry(self.retry, || {
            let client = Arc::clone(&client);
            let url = url.clone();
            let params = params.clone();
            async move { client.get_json(&url, &params).await }
        })
        .await?;

        Ok(data
            .items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<Volume>(item) {
                Ok(volume) => volume.into_record(),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed Google Books item");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl Source for GoogleBooksSource {
    fn id(&self) -> &str {
        "google_books"
    }

    fn name(&self) -> &str {
        "Google Books"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::AUTHOR_SEARCH | SourceCapabilities::BOOKS
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Record>, SourceError> {
        self.volumes(query.query.clone(), query.max_results).await
    }

    async fn search_by_author(
        &self,
        author: &str,
        max_results: usize,
        _filters: &SearchFilters,
    ) -> Result<Vec<Record>, SourceError> {
        self.volumes(format!("inauthor:\"{}\"", author.trim()), max_results)
            .await
    }
}

// ===== Google Books API Types =====

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    volume_info: VolumeInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    subtitle: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    publisher: Option<String>,
    published_date: Option<String>,
    description: Option<String>,
    #[serde(default)]
    industry_identifiers: Vec<IndustryIdentifier>,
    page_count: Option<u32>,
    info_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

impl Volume {
    fn into_record(self) -> Option<Record> {
        let info = self.volume_info;
        let title = info.title.filter(|t| !t.trim().is_empty())?;
        let title = match info.subtitle.filter(|s| !s.trim().is_empty()) {
            Some(subtitle) => format!("{}: {}", title.trim(), subtitle.trim()),
            None => title.trim().to_string(),
        };

        let mut builder = RecordBuilder::new(title, "google_books")
            .authors(info.authors)
            .pub_type("book");

        if let Some(year) = info.published_date.as_deref().and_then(first_four_digit_run) {
            builder = builder.year(year.to_string());
        }
        if let Some(publisher) = info.publisher {
            builder = builder.publisher(publisher);
        }
        if let Some(description) = info.description {
            builder = builder.abstract_text(description);
        }
        if let Some(pages) = info.page_count.filter(|p| *p > 0) {
            builder = builder.pages(pages.to_string());
        }
        if let Some(link) = info.info_link {
            builder = builder.url(link);
        }

        let isbn = ["ISBN_13", "ISBN_10"].iter().find_map(|kind| {
            info.industry_identifiers
                .iter()
                .find(|id| id.kind == *kind)
                .map(|id| id.identifier.clone())
        });
        if let Some(isbn) = isbn {
            builder = builder.isbn(isbn);
        }

        Some(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    const VOLUMES: &str = r#"{
        "kind": "books#volumes",
        "totalItems": 3,
        "items": [
            {
                "volumeInfo": {
                    "title": "Deep Learning",
                    "subtitle": "Foundations and Concepts",
                    "authors": ["Christopher M. Bishop", "Hugh Bishop"],
                    "publisher": "Springer Nature",
                    "publishedDate": "2023-11-01",
                    "pageCount": 656,
                    "industryIdentifiers": [
                        {"type": "ISBN_10", "identifier": "3031454677"},
                        {"type": "ISBN_13", "identifier": "9783031454677"}
                    ],
                    "infoLink": "https://books.example/deep"
                }
            },
            {"volumeInfo": {"authors": ["Nobody"]}},
            {"id": "no-volume-info"}
        ]
    }"#;

    fn source(base: &str) -> GoogleBooksSource {
        GoogleBooksSource::new()
            .unwrap()
            .with_base_url(base)
            .with_retry_config(RetryConfig {
                max_attempts: 1,
                jitter: 0.0,
                initial_delay: Duration::from_millis(5),
                ..RetryConfig::default()
            })
    }

    #[tokio::test]
    async fn test_search_parses_volumes() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/volumes")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "deep learning".into()),
                Matcher::UrlEncoded("maxResults".into(), "5".into()),
            ]))
            .with_status(200)
            .with_body(VOLUMES)
            .create_async()
            .await;

        let records = source(&server.url())
            .search(&SearchQuery::new("deep learning"))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        let book = &records[0];
        assert_eq!(book.title, "Deep Learning: Foundations and Concepts");
        assert_eq!(book.authors, vec!["Christopher M. Bishop", "Hugh Bishop"]);
        assert_eq!(book.year, "2023");
        assert_eq!(book.publisher.as_deref(), Some("Springer Nature"));
        assert_eq!(book.isbn.as_deref(), Some("9783031454677"));
        assert_eq!(book.pages.as_deref(), Some("656"));
        assert_eq!(book.pub_type.as_deref(), Some("book"));
        assert_eq!(book.source, "google_books");
    }

    #[tokio::test]
    async fn test_author_search_uses_inauthor() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/volumes")
            .match_query(Matcher::UrlEncoded("q".into(), "inauthor:\"Bishop\"".into()))
            .with_status(200)
            .with_body(r#"{"kind": "books#volumes", "totalItems": 0}"#)
            .create_async()
            .await;

        let records = source(&server.url())
            .search_by_author("Bishop", 5, &SearchFilters::default())
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/volumes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let result = source(&server.url()).search(&SearchQuery::new("x")).await;
        assert!(matches!(result, Err(SourceError::Parse(_))));
    }
}
