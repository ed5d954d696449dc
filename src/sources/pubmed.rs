//! PubMed provider implementation using the E-utilities API.
//!
//! A search is an `esearch` call returning PMIDs followed by `efetch` calls
//! for the article metadata. PubMed enforces a strict request allowance, so
//! the adapter owns an [`AdaptiveConcurrencyController`]: every request
//! reports its latency (or throttling) to it, and the number of `efetch` batches
//! in flight follows the controller's current capacity.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::models::{first_four_digit_run, Record, RecordBuilder, SearchFilters, SearchQuery};
use crate::sources::{configured_base_url, Source, SourceCapabilities, SourceError};
use crate::utils::{
    api_retry_config, with_retry, AdaptiveConcurrencyController, ControllerConfig, HttpClient,
    RetryConfig,
};

const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// PMIDs per efetch request
const FETCH_BATCH: usize = 20;

/// Requests per second allowed without an NCBI key
const ANONYMOUS_RATE: f64 = 3.0;

/// PubMed provider
#[derive(Debug, Clone)]
pub struct PubMedSource {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
    controller: Arc<AdaptiveConcurrencyController>,
    fetch_batch: usize,
}

impl PubMedSource {
    /// Create a new PubMed source
    pub fn new() -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            base_url: EUTILS_BASE.to_string(),
            api_key: None,
            retry: api_retry_config(),
            controller: Arc::new(AdaptiveConcurrencyController::new(
                "pubmed",
                ControllerConfig::default(),
            )),
            fetch_batch: FETCH_BATCH,
        })
    }

    /// Build from configuration (key, endpoint, rate, retries, controller)
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let mut source = Self::new()?;
        source.api_key = config.api_keys.ncbi.clone();
        if let Some(url) = &config.sources.pubmed_url {
            source.base_url = configured_base_url(url)?;
        }

        let default_rate = if source.api_key.is_some() {
            None
        } else {
            Some(ANONYMOUS_RATE)
        };
        if let Some(rate) = config.rate_for("pubmed").or(default_rate) {
            source.client = Arc::new((*source.client).clone().with_rate_limit(rate, 1));
        }

        source.retry = config.retry;
        source.controller = Arc::new(AdaptiveConcurrencyController::new(
            "pubmed",
            config.controller.clone(),
        ));
        Ok(source)
    }

    /// Point the adapter at another E-utilities endpoint (mirrors, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fetch_batch(mut self, batch: usize) -> Self {
        self.fetch_batch = batch.max(1);
        self
    }

    /// The controller guarding this provider
    pub fn controller(&self) -> &Arc<AdaptiveConcurrencyController> {
        &self.controller
    }

    /// Query parameters for esearch
    fn search_params(&self, term: &str, max_results: usize, filters: &SearchFilters) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("term", term.to_string()),
            ("retmax", max_results.to_string()),
            ("retmode", "xml".to_string()),
        ];

        if filters.year_from.is_some() || filters.year_to.is_some() {
            params.push(("datetype", "pdat".to_string()));
            params.push((
                "mindate",
                filters.year_from.map_or("1800".to_string(), |y| y.to_string()),
            ));
            params.push((
                "maxdate",
                filters.year_to.map_or("3000".to_string(), |y| y.to_string()),
            ));
        }

        self.with_key(params)
    }

    fn with_key(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    /// GET with retries; answered and throttled attempts are reported to the controller
    async fn get_text(&self, url: String, params: Vec<(&'static str, String)>) -> Result<String, SourceError> {
        let client = Arc::clone(&self.client);
        let controller = Arc::clone(&self.controller);

        with_retry(self.retry, || {
            let client = Arc::clone(&client);
            let controller = Arc::clone(&controller);
            let url = url.clone();
            let params = params.clone();
            async move {
                let started = Instant::now();
                let result = client.get_text(&url, &params).await;
                let throttled = matches!(result, Err(SourceError::RateLimited { .. }));
                // only answers and throttles say anything about upstream load
                if result.is_ok() || throttled {
                    if let Some(capacity) = controller.record_outcome(started.elapsed(), throttled) {
                        tracing::info!(source = "pubmed", capacity, "Concurrency adjusted");
                    }
                }
                result
            }
        })
        .await
    }

    async fn search_term(
        &self,
        term: &str,
        max_results: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<Record>, SourceError> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let xml = self
            .get_text(url, self.search_params(term, max_results, filters))
            .await?;
        let ids = Self::parse_search_response(&xml)?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let capacity = self.controller.capacity();
        let url = format!("{}/efetch.fcgi", self.base_url);
        let batches: Vec<String> = ids
            .chunks(self.fetch_batch)
            .map(|chunk| chunk.join(","))
            .collect();
        tracing::debug!(ids = ids.len(), batches = batches.len(), capacity, "Fetching PubMed records");

        let results: Vec<Result<Vec<Record>, SourceError>> =
            stream::iter(batches.into_iter().map(|batch| self.fetch_ids(url.clone(), batch)))
                .buffered(capacity)
                .collect()
                .await;

        // a bad batch costs only its own records
        let mut records = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0usize;
        for result in results {
            match result {
                Ok(batch) => {
                    succeeded += 1;
                    records.extend(batch);
                }
                Err(e) => {
                    tracing::warn!(source = "pubmed", error = %e, "efetch batch failed, skipping");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(records),
        }
    }

    async fn fetch_ids(&self, url: String, ids: String) -> Result<Vec<Record>, SourceError> {
        let params = self.with_key(vec![
            ("db", "pubmed".to_string()),
            ("id", ids),
            ("retmode", "xml".to_string()),
        ]);
        let xml = self.get_text(url, params).await?;
        Self::parse_fetch_response(&xml)
    }

    /// Parse E-utilities search response XML
    fn parse_search_response(xml: &str) -> Result<Vec<String>, SourceError> {
        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct ESearchResult {
            IdList: Option<IdList>,
        }

        #[derive(Debug, Deserialize)]
        struct IdList {
            #[serde(rename = "Id", default)]
            ids: Vec<String>,
        }

        let result: ESearchResult = from_str(xml)
            .map_err(|e| SourceError::Parse(format!("Failed to parse PubMed search XML: {}", e)))?;

        Ok(result.IdList.map(|l| l.ids).unwrap_or_default())
    }

    /// Parse E-utilities fetch response XML
    fn parse_fetch_response(xml: &str) -> Result<Vec<Record>, SourceError> {
        let result: PubmedArticleSet = from_str(xml)
            .map_err(|e| SourceError::Parse(format!("Failed to parse PubMed fetch XML: {}", e)))?;

        Ok(result
            .articles
            .into_iter()
            .filter_map(PubmedArticle::into_record)
            .collect())
    }
}

#[async_trait]
impl Source for PubMedSource {
    fn id(&self) -> &str {
        "pubmed"
    }

    fn name(&self) -> &str {
        "PubMed"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::AUTHOR_SEARCH
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Record>, SourceError> {
        self.search_term(&query.query, query.max_results, &query.filters)
            .await
    }

    async fn search_by_author(
        &self,
        author: &str,
        max_results: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<Record>, SourceError> {
        let term = format!("{}[AUTH]", author.trim());
        self.search_term(&term, max_results, filters).await
    }
}

// ===== E-utilities efetch types =====

#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct PubmedArticleSet {
    #[serde(rename = "PubmedArticle", default)]
    articles: Vec<PubmedArticle>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PubmedArticle {
    MedlineCitation: Option<MedlineCitation>,
    PubmedData: Option<PubmedData>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct MedlineCitation {
    PMID: Option<Text>,
    Article: Option<Article>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Article {
    Journal: Option<Journal>,
    ArticleTitle: Option<Text>,
    Pagination: Option<Pagination>,
    Abstract: Option<Abstract>,
    AuthorList: Option<AuthorList>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Journal {
    Title: Option<Text>,
    JournalIssue: Option<JournalIssue>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JournalIssue {
    Volume: Option<Text>,
    Issue: Option<Text>,
    PubDate: Option<PubDate>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PubDate {
    Year: Option<Text>,
    MedlineDate: Option<Text>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Pagination {
    MedlinePgn: Option<Text>,
}

#[derive(Debug, Deserialize)]
struct Abstract {
    #[serde(rename = "AbstractText", default)]
    texts: Vec<Text>,
}

#[derive(Debug, Deserialize)]
struct AuthorList {
    #[serde(rename = "Author", default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Author {
    LastName: Option<Text>,
    ForeName: Option<Text>,
    Initials: Option<Text>,
    CollectiveName: Option<Text>,
}

impl Author {
    fn display(&self) -> Option<String> {
        let collective = self
            .CollectiveName
            .as_ref()
            .map(|t| t.value.trim())
            .filter(|name| !name.is_empty());
        if let Some(collective) = collective {
            return Some(collective.to_string());
        }
        let last = self
            .LastName
            .as_ref()
            .map(|t| t.value.trim())
            .filter(|name| !name.is_empty())?;
        let given = self
            .ForeName
            .as_ref()
            .or(self.Initials.as_ref())
            .map(|t| t.value.trim())
            .unwrap_or_default();
        if given.is_empty() {
            Some(last.to_string())
        } else {
            Some(format!("{}, {}", last, given))
        }
    }
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PubmedData {
    ArticleIdList: Option<ArticleIdList>,
}

#[derive(Debug, Deserialize)]
struct ArticleIdList {
    #[serde(rename = "ArticleId", default)]
    ids: Vec<ArticleId>,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    #[serde(rename = "@IdType", default)]
    id_type: String,
    #[serde(rename = "$text", default)]
    value: String,
}

impl PubmedArticle {
    fn into_record(self) -> Option<Record> {
        let citation = self.MedlineCitation?;
        let article = citation.Article?;
        let title = article.ArticleTitle?.value;
        if title.trim().is_empty() {
            return None;
        }

        let pmid = citation.PMID.map(|p| p.value).unwrap_or_default();
        let mut builder = RecordBuilder::new(title.trim(), "pubmed").pub_type("journal-article");

        if let Some(authors) = article.AuthorList {
            builder = builder.authors(authors.authors.iter().filter_map(Author::display));
        }

        if let Some(journal) = article.Journal {
            if let Some(title) = journal.Title {
                builder = builder.journal(title.value);
            }
            if let Some(issue) = journal.JournalIssue {
                if let Some(volume) = issue.Volume {
                    builder = builder.volume(volume.value);
                }
                if let Some(number) = issue.Issue {
                    builder = builder.issue(number.value);
                }
                let year = issue.PubDate.and_then(|d| {
                    d.Year
                        .and_then(|y| first_four_digit_run(&y.value))
                        .or_else(|| d.MedlineDate.and_then(|m| first_four_digit_run(&m.value)))
                });
                if let Some(year) = year {
                    builder = builder.year(year.to_string());
                }
            }
        }

        if let Some(pages) = article.Pagination.and_then(|p| p.MedlinePgn) {
            builder = builder.pages(pages.value);
        }

        if let Some(abstract_block) = article.Abstract {
            let text = abstract_block
                .texts
                .iter()
                .map(|t| t.value.trim())
                .collect::<Vec<_>>()
                .join(" ");
            builder = builder.abstract_text(text);
        }

        let doi = self
            .PubmedData
            .and_then(|pd| pd.ArticleIdList)
            .and_then(|list| list.ids.into_iter().find(|id| id.id_type == "doi"))
            .map(|id| id.value);
        if let Some(doi) = doi {
            builder = builder.doi(doi);
        }

        if !pmid.trim().is_empty() {
            builder = builder.url(format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid.trim()));
        }

        Some(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    const ESEARCH: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<eSearchResult>
  <Count>3</Count>
  <RetMax>3</RetMax>
  <IdList>
    <Id>111</Id>
    <Id>222</Id>
    <Id>333</Id>
  </IdList>
</eSearchResult>"#;

    const EFETCH: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE">
      <PMID Version="1">111</PMID>
      <Article PubModel="Print">
        <Journal>
          <JournalIssue CitedMedium="Internet">
            <Volume>12</Volume>
            <Issue>3</Issue>
            <PubDate><Year>2021</Year><Month>Mar</Month></PubDate>
          </JournalIssue>
          <Title>Journal of Tests</Title>
        </Journal>
        <ArticleTitle>CRISPR screening in practice.</ArticleTitle>
        <Pagination><MedlinePgn>100-110</MedlinePgn></Pagination>
        <Abstract>
          <AbstractText Label="BACKGROUND">First part.</AbstractText>
          <AbstractText Label="RESULTS">Second part.</AbstractText>
        </Abstract>
        <AuthorList CompleteYN="Y">
          <Author ValidYN="Y"><LastName>Doudna</LastName><ForeName>Jennifer A</ForeName><Initials>JA</Initials></Author>
          <Author ValidYN="Y"><LastName>Zhang</LastName><Initials>F</Initials></Author>
          <Author ValidYN="Y"><CollectiveName>Screening Consortium</CollectiveName></Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">111</ArticleId>
        <ArticleId IdType="doi">10.1000/crispr.1</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE">
      <PMID Version="1">222</PMID>
      <Article PubModel="Print">
        <Journal>
          <JournalIssue CitedMedium="Print">
            <PubDate><MedlineDate>1998 Dec-1999 Jan</MedlineDate></PubDate>
          </JournalIssue>
        </Journal>
        <ArticleTitle>Older work.</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 1,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter: 0.0,
            max_total_time: Duration::from_secs(5),
        }
    }

    fn source(base: &str) -> PubMedSource {
        PubMedSource::new()
            .unwrap()
            .with_base_url(base)
            .with_retry_config(fast_retry())
    }

    #[test]
    fn test_search_params() {
        let source = PubMedSource::new().unwrap();
        let params = source.search_params("machine learning", 10, &SearchFilters::default());

        assert!(params.contains(&("db", "pubmed".to_string())));
        assert!(params.contains(&("term", "machine learning".to_string())));
        assert!(params.contains(&("retmax", "10".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "mindate"));
    }

    #[test]
    fn test_search_params_with_years() {
        let source = PubMedSource::new().unwrap();
        let filters = SearchFilters::new().year_from(2015);
        let params = source.search_params("cancer", 5, &filters);

        assert!(params.contains(&("mindate", "2015".to_string())));
        assert!(params.contains(&("maxdate", "3000".to_string())));
        assert!(params.contains(&("datetype", "pdat".to_string())));
    }

    #[test]
    fn test_parse_search_response() {
        let ids = PubMedSource::parse_search_response(ESEARCH).unwrap();
        assert_eq!(ids, vec!["111", "222", "333"]);

        let empty = PubMedSource::parse_search_response(
            "<eSearchResult><Count>0</Count><IdList></IdList></eSearchResult>",
        )
        .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_parse_fetch_response() {
        let records = PubMedSource::parse_fetch_response(EFETCH).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.title, "CRISPR screening in practice.");
        assert_eq!(
            first.authors,
            vec!["Doudna, Jennifer A", "Zhang, F", "Screening Consortium"]
        );
        assert_eq!(first.year, "2021");
        assert_eq!(first.journal.as_deref(), Some("Journal of Tests"));
        assert_eq!(first.volume.as_deref(), Some("12"));
        assert_eq!(first.issue.as_deref(), Some("3"));
        assert_eq!(first.pages.as_deref(), Some("100-110"));
        assert_eq!(first.doi.as_deref(), Some("10.1000/crispr.1"));
        assert_eq!(first.abstract_text.as_deref(), Some("First part. Second part."));
        assert_eq!(first.url.as_deref(), Some("https://pubmed.ncbi.nlm.nih.gov/111/"));

        assert_eq!(records[1].year, "1998");
        assert!(records[1].doi.is_none());
    }

    #[tokio::test]
    async fn test_search_reports_to_controller() {
        let mut server = mockito::Server::new_async().await;
        let _search = server
            .mock("GET", "/esearch.fcgi")
            .match_query(Matcher::UrlEncoded("term".into(), "crispr".into()))
            .with_status(200)
            .with_body(ESEARCH)
            .create_async()
            .await;
        let fetch = server
            .mock("GET", "/efetch.fcgi")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(EFETCH)
            .expect(2)
            .create_async()
            .await;

        let source = source(&server.url()).with_fetch_batch(2);
        let records = source.search(&SearchQuery::new("crispr")).await.unwrap();

        // two efetch batches, each answered with the same two articles
        assert_eq!(records.len(), 4);
        fetch.assert_async().await;
        assert_eq!(source.controller().snapshot().samples, 3);
    }

    #[tokio::test]
    async fn test_author_search_term() {
        let mut server = mockito::Server::new_async().await;
        let _search = server
            .mock("GET", "/esearch.fcgi")
            .match_query(Matcher::UrlEncoded("term".into(), "Doudna J[AUTH]".into()))
            .with_status(200)
            .with_body("<eSearchResult><IdList></IdList></eSearchResult>")
            .create_async()
            .await;

        let records = source(&server.url())
            .search_by_author("Doudna J", 5, &SearchFilters::default())
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_throttling_is_reported_as_error() {
        let mut server = mockito::Server::new_async().await;
        let _search = server
            .mock("GET", "/esearch.fcgi")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let source = source(&server.url());
        let result = source.search(&SearchQuery::new("x")).await;
        assert!(matches!(result, Err(SourceError::RateLimited { .. })));

        let snapshot = source.controller().snapshot();
        assert_eq!(snapshot.samples, 1);
        assert_eq!(snapshot.error_rate, 1.0);
    }

    #[tokio::test]
    async fn test_malformed_batch_keeps_good_batches() {
        let mut server = mockito::Server::new_async().await;
        let _search = server
            .mock("GET", "/esearch.fcgi")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<eSearchResult><IdList><Id>111</Id><Id>222</Id></IdList></eSearchResult>")
            .create_async()
            .await;
        let _good = server
            .mock("GET", "/efetch.fcgi")
            .match_query(Matcher::UrlEncoded("id".into(), "111".into()))
            .with_status(200)
            .with_body(
                "<PubmedArticleSet><PubmedArticle><MedlineCitation><PMID>111</PMID>\
                 <Article><ArticleTitle>Good article</ArticleTitle></Article>\
                 </MedlineCitation></PubmedArticle></PubmedArticleSet>",
            )
            .create_async()
            .await;
        let _bad = server
            .mock("GET", "/efetch.fcgi")
            .match_query(Matcher::UrlEncoded("id".into(), "222".into()))
            .with_status(200)
            .with_body("<PubmedArticleSet><PubmedArticle><oops")
            .create_async()
            .await;

        let records = source(&server.url())
            .with_fetch_batch(1)
            .search(&SearchQuery::new("anything"))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Good article");
    }

    #[tokio::test]
    async fn test_all_batches_failing_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _search = server
            .mock("GET", "/esearch.fcgi")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<eSearchResult><IdList><Id>111</Id></IdList></eSearchResult>")
            .create_async()
            .await;
        let _fetch = server
            .mock("GET", "/efetch.fcgi")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<PubmedArticleSet><PubmedArticle><oops")
            .create_async()
            .await;

        let result = source(&server.url()).search(&SearchQuery::new("anything")).await;
        assert!(matches!(result, Err(SourceError::Parse(_))));
    }

    #[tokio::test]
    async fn test_client_errors_do_not_lower_capacity() {
        let mut server = mockito::Server::new_async().await;
        let _search = server
            .mock("GET", "/esearch.fcgi")
            .match_query(Matcher::Any)
            .with_status(400)
            .create_async()
            .await;

        let source = source(&server.url());
        let result = source.search(&SearchQuery::new("x")).await;
        assert!(result.is_err());
        assert!(!matches!(result, Err(SourceError::RateLimited { .. })));

        let snapshot = source.controller().snapshot();
        assert_eq!(snapshot.error_rate, 0.0);
        assert_eq!(snapshot.samples, 0);
    }

    #[test]
    fn test_empty_collective_name_is_skipped() {
        let xml = r#"<PubmedArticleSet><PubmedArticle><MedlineCitation><PMID>9</PMID>
<Article><ArticleTitle>Group work</ArticleTitle><AuthorList>
<Author><CollectiveName/></Author>
<Author><CollectiveName>  </CollectiveName><LastName>Curie</LastName><Initials>M</Initials></Author>
<Author><LastName></LastName></Author>
</AuthorList></Article></MedlineCitation></PubmedArticle></PubmedArticleSet>"#;

        let records = PubMedSource::parse_fetch_response(xml).unwrap();
        assert_eq!(records[0].authors, vec!["Curie, M"]);
    }
}
