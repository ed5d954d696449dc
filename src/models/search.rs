//! Search request models shared by providers and the orchestrator.

use serde::{Deserialize, Serialize};

/// Hard filters applied to a search
///
/// Providers receive these as hints; the orchestrator re-applies the year
/// range and document type after merging because not every provider honours
/// them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    /// Earliest publication year (inclusive)
    pub year_from: Option<i32>,

    /// Latest publication year (inclusive)
    pub year_to: Option<i32>,

    /// Document type, compared case-insensitively with `Record::pub_type`
    pub document_type: Option<String>,

    /// Language hint (ISO 639-1), forwarded to providers that support it
    pub language: Option<String>,

    /// Restrict to open-access works where the provider supports it
    pub open_access: bool,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn year_from(mut self, year: i32) -> Self {
        self.year_from = Some(year);
        self
    }

    pub fn year_to(mut self, year: i32) -> Self {
        self.year_to = Some(year);
        self
    }

    pub fn document_type(mut self, doc_type: impl Into<String>) -> Self {
        self.document_type = Some(doc_type.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn open_access(mut self, open_access: bool) -> Self {
        self.open_access = open_access;
        self
    }

    /// No filter is set
    pub fn is_empty(&self) -> bool {
        self.year_from.is_none()
            && self.year_to.is_none()
            && self.document_type.is_none()
            && self.language.is_none()
            && !self.open_access
    }

    /// Set filters as `key=value` pairs sorted by key, joined with `,`
    ///
    /// Used as the stable filter fragment of author cache keys.
    pub fn cache_fragment(&self) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();

        if let Some(doc_type) = &self.document_type {
            pairs.push(("document_type", doc_type.clone()));
        }
        if let Some(language) = &self.language {
            pairs.push(("language", language.clone()));
        }
        if self.open_access {
            pairs.push(("open_access", "true".to_string()));
        }
        if let Some(year) = self.year_from {
            pairs.push(("year_from", year.to_string()));
        }
        if let Some(year) = self.year_to {
            pairs.push(("year_to", year.to_string()));
        }

        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// How strictly merged results must match the query title
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Weak matches are demoted, only noise is dropped
    #[default]
    General,
    /// The query is a title: results without a strong title match are dropped
    Title,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchMode::General => write!(f, "general"),
            SearchMode::Title => write!(f, "title"),
        }
    }
}

/// Search query parameters handed to a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text query
    pub query: String,

    /// Maximum number of results requested from each provider
    pub max_results: usize,

    /// Hard filters
    pub filters: SearchFilters,

    #[serde(default)]
    pub mode: SearchMode,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: 5,
            filters: SearchFilters::default(),
            mode: SearchMode::General,
        }
    }
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    pub fn filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_builder() {
        let query = SearchQuery::new("machine learning")
            .max_results(20)
            .filters(SearchFilters::new().year_from(2020));

        assert_eq!(query.query, "machine learning");
        assert_eq!(query.max_results, 20);
        assert_eq!(query.filters.year_from, Some(2020));
        assert_eq!(query.mode, SearchMode::General);
        assert_eq!(query.mode(SearchMode::Title).mode, SearchMode::Title);
    }

    #[test]
    fn test_search_mode_serde() {
        assert_eq!(serde_json::to_string(&SearchMode::Title).unwrap(), "\"title\"");
        let query: SearchQuery =
            serde_json::from_str(r#"{"query":"x","max_results":3,"filters":{}}"#).unwrap();
        assert_eq!(query.mode, SearchMode::General);
        assert_eq!(SearchMode::Title.to_string(), "title");
    }

    #[test]
    fn test_cache_fragment_is_sorted() {
        let filters = SearchFilters::new()
            .year_to(2022)
            .document_type("book")
            .year_from(2010);

        assert_eq!(
            filters.cache_fragment(),
            "document_type=book,year_from=2010,year_to=2022"
        );
    }

    #[test]
    fn test_empty_filters() {
        let filters = SearchFilters::default();
        assert!(filters.is_empty());
        assert_eq!(filters.cache_fragment(), "");
        assert!(!SearchFilters::new().open_access(true).is_empty());
    }
}
