//! Relevance scoring and deterministic ordering of merged records.
//!
//! Scores are additive integers normalized by [`MAX_SCORE`]:
//!
//! | term | points |
//! |------|--------|
//! | provider weight | 5-10 |
//! | title equals query | +100 |
//! | query inside title | +50 |
//! | partial ratio >= 90 / >= 70 | +45 / +25 |
//! | each shared significant token (fuzzy branch only) | +10 |
//! | year >= 2020 / >= 2015 | +5 / +2 |
//! | identifier, authors, venue | +3, +2, +1 |
//!
//! In [`SearchMode::Title`] a record also needs an exact, partial or high
//! fuzzy title match; a mid fuzzy match survives only at
//! [`TITLE_MODE_MIN_SCORE`] or above.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{MatchType, Record, SearchMode, SelectionDetails};
use crate::utils::similarity::partial_ratio;

/// Score that maps to a confidence of 1.0
pub const MAX_SCORE: i64 = 121;

/// Weight for providers missing from the weight table
pub const DEFAULT_SOURCE_WEIGHT: i64 = 5;

/// Noise floor applied to every candidate
pub const NOISE_FLOOR: i64 = 10;

/// Noise floor for non-top candidates once the top score passes [`STRONG_TOP_SCORE`]
pub const RAISED_NOISE_FLOOR: i64 = 15;

pub const STRONG_TOP_SCORE: i64 = 90;

/// Lowest total for a mid fuzzy title match in title mode
pub const TITLE_MODE_MIN_SCORE: i64 = 45;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "be", "been", "being", "have", "has", "had", "do",
    "does", "did", "will", "would", "should", "could", "may", "might", "must", "can", "let",
    "get", "got", "make", "made", "take", "took", "give", "gave", "how", "what", "when",
    "where", "who", "why", "which", "this", "that", "these", "those", "me", "you", "he", "she",
    "it", "we", "they", "them", "their",
];

/// Lowercased word tokens longer than two characters that are not stopwords
pub fn significant_tokens(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().count() > 2 && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Result of scoring one record against a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    pub total: i64,
    pub match_type: MatchType,
    pub criteria: BTreeMap<String, i64>,
    /// Significant query tokens that also occur in the title
    pub shared_tokens: usize,
}

impl Score {
    fn add(&mut self, term: &str, points: i64) {
        self.total += points;
        self.criteria.insert(term.to_string(), points);
    }

    fn confidence(&self) -> f64 {
        (self.total as f64 / MAX_SCORE as f64).clamp(0.0, 1.0)
    }

    fn has(&self, term: &str) -> bool {
        self.criteria.contains_key(term)
    }

    /// Strong enough title signal to survive title mode
    pub fn is_title_match(&self) -> bool {
        if self.has("title_exact") || self.has("title_partial") || self.has("title_fuzzy_high") {
            return true;
        }
        self.has("title_fuzzy_mid") && self.total >= TITLE_MODE_MIN_SCORE
    }
}

/// Scores, orders and annotates candidate records
#[derive(Debug, Clone)]
pub struct RankingEngine {
    source_weights: HashMap<String, i64>,
}

impl Default for RankingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RankingEngine {
    /// Engine with the built-in provider weights
    pub fn new() -> Self {
        let source_weights = [
            ("crossref", 10),
            ("pubmed", 9),
            ("semantic_scholar", 8),
            ("arxiv", 8),
            ("google_books", 7),
        ]
        .into_iter()
        .map(|(id, w)| (id.to_string(), w))
        .collect();

        Self { source_weights }
    }

    /// Override or add a provider weight
    pub fn with_source_weight(mut self, source: impl Into<String>, weight: i64) -> Self {
        self.source_weights.insert(source.into(), weight);
        self
    }

    pub fn source_weight(&self, source: &str) -> i64 {
        self.source_weights
            .get(source)
            .copied()
            .unwrap_or(DEFAULT_SOURCE_WEIGHT)
    }

    fn base_terms(&self, record: &Record, score: &mut Score) {
        match record.parsed_year() {
            Some(year) if year >= 2020 => score.add("year_2020_plus", 5),
            Some(year) if year >= 2015 => score.add("year_2015_plus", 2),
            _ => {}
        }

        if record.identifier().is_some() {
            score.add("has_doi", 3);
        }
        if !record.authors.is_empty() {
            score.add("has_authors", 2);
        }
        if record.has_venue() {
            score.add("has_venue", 1);
        }
    }

    /// Score one record against a query
    pub fn score(&self, record: &Record, query: &str) -> Score {
        let query_lower = query.trim().to_lowercase();
        let title_lower = record.title.trim().to_lowercase();
        let query_tokens = significant_tokens(&query_lower);
        let title_tokens = significant_tokens(&title_lower);
        let shared_tokens = query_tokens.intersection(&title_tokens).count();

        let mut score = Score {
            total: 0,
            match_type: MatchType::Noise,
            criteria: BTreeMap::new(),
            shared_tokens,
        };

        score.add("source", self.source_weight(&record.source));

        if !query_lower.is_empty() && title_lower == query_lower {
            score.add("title_exact", 100);
            score.match_type = MatchType::Exact;
        } else if !query_lower.is_empty() && title_lower.contains(&query_lower) {
            score.add("title_partial", 50);
            score.match_type = MatchType::Partial;
        } else {
            let ratio = partial_ratio(&query_lower, &title_lower);
            if ratio >= 90 {
                score.add("title_fuzzy_high", 45);
                score.match_type = MatchType::Fuzzy;
            } else if ratio >= 70 {
                score.add("title_fuzzy_mid", 25);
                score.match_type = MatchType::Fuzzy;
            }

            if shared_tokens > 0 {
                score.add("title_keywords", shared_tokens as i64 * 10);
                if score.match_type == MatchType::Noise {
                    score.match_type = MatchType::Keyword;
                }
            }
        }

        self.base_terms(record, &mut score);
        score
    }

    /// Score, order, suppress noise and mark the selected record
    ///
    /// Ordering is a total order over record content, so the output is
    /// identical for any permutation of the same input.
    pub fn rank(&self, records: Vec<Record>, query: &str) -> Vec<Record> {
        self.rank_with_mode(records, query, SearchMode::General)
    }

    /// [`rank`](Self::rank), additionally dropping weak title matches in
    /// [`SearchMode::Title`]
    pub fn rank_with_mode(&self, records: Vec<Record>, query: &str, mode: SearchMode) -> Vec<Record> {
        if records.is_empty() {
            return records;
        }

        let mut scored: Vec<(Score, Record)> = records
            .into_iter()
            .map(|record| (self.score(&record, query), record))
            .collect();
        scored.sort_by_cached_key(|(score, record)| sort_key(score.total, record));

        let top_score = scored[0].0.total;
        let mut ranked = Vec::with_capacity(scored.len());

        for (i, (score, mut record)) in scored.into_iter().enumerate() {
            let floor = if i > 0 && top_score > STRONG_TOP_SCORE {
                RAISED_NOISE_FLOOR
            } else {
                NOISE_FLOOR
            };

            if score.total < floor && score.shared_tokens == 0 {
                tracing::debug!(
                    title = %record.title,
                    source = %record.source,
                    score = score.total,
                    floor,
                    "Dropping noise candidate"
                );
                continue;
            }

            if mode == SearchMode::Title && !score.is_title_match() {
                tracing::debug!(
                    title = %record.title,
                    source = %record.source,
                    score = score.total,
                    "Dropping weak title match"
                );
                continue;
            }

            record.confidence_score = score.confidence();
            record.match_type = score.match_type;
            if ranked.is_empty() {
                record.is_selected = true;
                record.selection = Some(SelectionDetails {
                    score: score.total,
                    criteria: score.criteria,
                });
            } else {
                record.is_selected = false;
                record.selection = None;
            }
            ranked.push(record);
        }

        ranked
    }

    /// Deterministic ordering for author-search results
    ///
    /// Only provider weight, recency and completeness contribute; nothing is
    /// dropped.
    pub fn rank_author_works(&self, records: Vec<Record>) -> Vec<Record> {
        let mut scored: Vec<(i64, Record)> = records
            .into_iter()
            .map(|record| {
                let mut score = Score {
                    total: 0,
                    match_type: MatchType::AuthorMatch,
                    criteria: BTreeMap::new(),
                    shared_tokens: 0,
                };
                score.add("source", self.source_weight(&record.source));
                self.base_terms(&record, &mut score);
                (score.total, record)
            })
            .collect();
        scored.sort_by_cached_key(|(total, record)| sort_key(*total, record));

        scored
            .into_iter()
            .map(|(_, mut record)| {
                record.match_type = MatchType::AuthorMatch;
                record.confidence_score = 1.0;
                record.is_selected = false;
                record.selection = None;
                record
            })
            .collect()
    }
}

type SortKey = (
    Reverse<i64>,
    String,
    String,
    Reverse<i32>,
    String,
    Vec<String>,
    String,
);

/// (-score, title, identifier, -year with missing years last), then content
fn sort_key(score: i64, record: &Record) -> SortKey {
    (
        Reverse(score),
        record.normalized_title(),
        record.normalized_identifier().unwrap_or_default(),
        Reverse(record.parsed_year().unwrap_or(i32::MIN)),
        record.source.clone(),
        record.authors.clone(),
        serde_json::to_string(record).unwrap_or_default(),
    )
}
