//! Query classification used to adjust provider priority.

use std::fmt::Debug;

/// Label attached to a query, with the classifier's confidence in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    pub confidence: f64,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// True when the query most likely names a book
    pub fn is_book(&self) -> bool {
        self.label == BOOK_LABEL && self.confidence >= BOOK_CONFIDENCE
    }
}

/// Label for book-like queries
pub const BOOK_LABEL: &str = "book";

/// Label for everything else
pub const ARTICLE_LABEL: &str = "article";

/// Minimum confidence for a book label to reorder providers
pub const BOOK_CONFIDENCE: f64 = 0.5;

const BOOK_KEYWORDS: &[&str] = &["handbook", "introduction", "foundations", "press", "textbook"];

/// Classifies free-text queries
///
/// Implementations are handed to the orchestrator at construction time.
pub trait QueryClassifier: Send + Sync + Debug {
    fn classify(&self, text: &str) -> Classification;
}

/// Word-count and keyword heuristic
///
/// Only a keyword hit is confident enough to count as a book.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl QueryClassifier for HeuristicClassifier {
    fn classify(&self, text: &str) -> Classification {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();

        if words.is_empty() {
            return Classification::new(ARTICLE_LABEL, 0.0);
        }
        if BOOK_KEYWORDS.iter().any(|k| words.iter().any(|w| w.contains(k))) {
            return Classification::new(BOOK_LABEL, 0.9);
        }
        // short titles lean towards books, but not enough to reorder providers
        if words.len() <= 5 {
            return Classification::new(BOOK_LABEL, 0.3);
        }
        Classification::new(ARTICLE_LABEL, 0.7)
    }
}

/// Whether a query should go through DOI lookup
pub fn is_doi_query(query: &str) -> bool {
    let query = query.trim();
    query.starts_with("10.") || query.to_lowercase().contains("doi.org")
}

/// Pull the DOI out of a bare DOI, a `doi:` prefix or a doi.org URL
pub fn extract_doi(query: &str) -> Option<String> {
    let re = regex::Regex::new(r"(10\.\d{4,9}/\S+)").ok()?;
    re.captures(query.trim())?
        .get(1)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string())
}
