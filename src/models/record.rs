//! Bibliographic record shared by every provider, the cache and the ranking pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Year value used when a provider does not report a publication year
pub const UNKNOWN_YEAR: &str = "n.d.";

/// Coarse classification of how a record relates to the query that found it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Title equals the query
    Exact,
    /// Query is contained in the title
    Partial,
    /// Title is a close edit-distance match
    Fuzzy,
    /// Only shared significant tokens
    Keyword,
    /// No relevance signal fired
    Noise,
    /// Found through an author search
    AuthorMatch,
    /// Not scored yet
    #[default]
    Unranked,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Partial => "partial",
            MatchType::Fuzzy => "fuzzy",
            MatchType::Keyword => "keyword",
            MatchType::Noise => "noise",
            MatchType::AuthorMatch => "author_match",
            MatchType::Unranked => "unranked",
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a record reached the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMethod {
    /// Fresh provider search
    #[default]
    Api,
    /// Served from the result cache
    Cache,
    /// Resolved directly from a DOI
    DoiLookup,
}

impl std::fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RetrievalMethod::Api => "api",
            RetrievalMethod::Cache => "cache",
            RetrievalMethod::DoiLookup => "doi_lookup",
        };
        write!(f, "{}", s)
    }
}

/// Breakdown of the score attached to the selected record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDetails {
    /// Raw additive score
    pub score: i64,

    /// Points contributed by each scoring term that fired
    pub criteria: BTreeMap<String, i64>,
}

/// A bibliographic work as returned by a provider
///
/// All optional fields are `None` rather than empty strings; use
/// [`RecordBuilder`] to get that normalisation for free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    /// Work title (never empty in a returned result list)
    pub title: String,

    /// Author names in provider order, usually "Family, Given"
    pub authors: Vec<String>,

    /// Publication year as reported, or [`UNKNOWN_YEAR`]
    pub year: String,

    /// Digital Object Identifier
    pub doi: Option<String>,

    /// Journal or container title
    pub journal: Option<String>,

    pub publisher: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub isbn: Option<String>,
    pub url: Option<String>,

    /// Provider document type (journal-article, book, ...)
    pub pub_type: Option<String>,

    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,

    /// Provider tag (crossref, pubmed, google_books, ...)
    pub source: String,

    /// Normalised relevance in [0, 1]
    pub confidence_score: f64,

    pub match_type: MatchType,
    pub retrieval_method: RetrievalMethod,

    /// Set on the top-ranked record only
    pub is_selected: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionDetails>,

    /// Likelihood that an author match is a different person
    pub author_ambiguity: f64,
}

impl Default for Record {
    fn default() -> Self {
        Self {
            title: String::new(),
            authors: Vec::new(),
            year: UNKNOWN_YEAR.to_string(),
            doi: None,
            journal: None,
            publisher: None,
            volume: None,
            issue: None,
            pages: None,
            isbn: None,
            url: None,
            pub_type: None,
            abstract_text: None,
            source: String::new(),
            confidence_score: 0.0,
            match_type: MatchType::default(),
            retrieval_method: RetrievalMethod::default(),
            is_selected: false,
            selection: None,
            author_ambiguity: 0.0,
        }
    }
}

impl Record {
    /// Create a record with only a title and provider tag
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    /// The DOI, if present and non-blank
    pub fn identifier(&self) -> Option<&str> {
        self.doi
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// The DOI trimmed and lowercased, used for identity comparisons
    pub fn normalized_identifier(&self) -> Option<String> {
        self.identifier().map(str::to_lowercase)
    }

    /// Lowercased title with runs of whitespace collapsed
    pub fn normalized_title(&self) -> String {
        normalize_text(&self.title)
    }

    /// First four-digit run in the year field
    pub fn parsed_year(&self) -> Option<i32> {
        first_four_digit_run(&self.year)
    }

    /// Whether the year is missing or the "n.d." sentinel
    pub fn has_unknown_year(&self) -> bool {
        let year = self.year.trim();
        year.is_empty() || year.eq_ignore_ascii_case(UNKNOWN_YEAR)
    }

    /// Journal or publisher is known
    pub fn has_venue(&self) -> bool {
        self.journal.is_some() || self.publisher.is_some()
    }
}

/// Lowercase, trim and collapse internal whitespace
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Extract the first run of exactly four consecutive ASCII digits
pub fn first_four_digit_run(text: &str) -> Option<i32> {
    let bytes = text.as_bytes();
    let mut start = None;

    for (i, b) in bytes.iter().enumerate() {
        if b.is_ascii_digit() {
            if start.is_none() {
                start = Some(i);
            }
            if let Some(s) = start {
                if i + 1 - s == 4 {
                    return text[s..=i].parse().ok();
                }
            }
        } else {
            start = None;
        }
    }

    None
}

fn clean(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Builder for constructing [`Record`] values from provider payloads
///
/// Every setter trims its input and ignores blank values, so adapters can
/// pass raw payload strings straight through.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            record: Record::new(title.trim(), source),
        }
    }

    /// Append one author
    pub fn author(mut self, name: impl Into<String>) -> Self {
        if let Some(name) = clean(name) {
            self.record.authors.push(name);
        }
        self
    }

    /// Append several authors
    pub fn authors<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self = self.author(name);
        }
        self
    }

    pub fn year(mut self, year: impl Into<String>) -> Self {
        if let Some(year) = clean(year) {
            self.record.year = year;
        }
        self
    }

    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.record.doi = clean(doi);
        self
    }

    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        self.record.journal = clean(journal);
        self
    }

    pub fn publisher(mut self, publisher: impl Into<String>) -> Self {
        self.record.publisher = clean(publisher);
        self
    }

    pub fn volume(mut self, volume: impl Into<String>) -> Self {
        self.record.volume = clean(volume);
        self
    }

    pub fn issue(mut self, issue: impl Into<String>) -> Self {
        self.record.issue = clean(issue);
        self
    }

    pub fn pages(mut self, pages: impl Into<String>) -> Self {
        self.record.pages = clean(pages);
        self
    }

    pub fn isbn(mut self, isbn: impl Into<String>) -> Self {
        self.record.isbn = clean(isbn);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.record.url = clean(url);
        self
    }

    pub fn pub_type(mut self, pub_type: impl Into<String>) -> Self {
        self.record.pub_type = clean(pub_type);
        self
    }

    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        self.record.abstract_text = clean(text);
        self
    }

    pub fn build(self) -> Record {
        self.record
    }
}
