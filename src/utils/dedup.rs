//! Cross-provider deduplication with field-level merging.

use std::collections::{HashMap, HashSet};

use crate::models::Record;
use crate::utils::similarity::similarity;

/// Normalized titles at or above this similarity are the same work
pub const TITLE_SIMILARITY_THRESHOLD: f64 = 0.90;

/// Sort records into a canonical order before deduplication
///
/// Order: provider position in `priority` (unlisted providers after listed
/// ones, by name), normalized title, normalized identifier, then the full
/// record content. Arrival order therefore never decides which record
/// survives.
pub fn canonical_order(records: &mut [Record], priority: &[String]) {
    records.sort_by_cached_key(|record| {
        let rank = priority
            .iter()
            .position(|p| p == &record.source)
            .unwrap_or(priority.len());
        (
            rank,
            record.source.clone(),
            record.normalized_title(),
            record.normalized_identifier().unwrap_or_default(),
            serde_json::to_string(record).unwrap_or_default(),
        )
    });
}

/// Check if two records describe the same work
///
/// Same non-empty identifier (trimmed, case-insensitive), or normalized
/// titles with an edit-distance similarity of at least 90%.
pub fn are_duplicates(a: &Record, b: &Record) -> bool {
    if let (Some(doi_a), Some(doi_b)) = (a.normalized_identifier(), b.normalized_identifier()) {
        if doi_a == doi_b {
            return true;
        }
    }

    titles_match(&a.normalized_title(), &b.normalized_title())
}

fn titles_match(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && similarity(a, b) >= TITLE_SIMILARITY_THRESHOLD
}

/// Find duplicate records without modifying the list
///
/// Returns groups of indices that are duplicates of each other.
pub fn find_duplicates(records: &[Record]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut processed: HashSet<usize> = HashSet::new();

    for i in 0..records.len() {
        if processed.contains(&i) {
            continue;
        }

        let mut group = vec![i];
        for (j, other) in records.iter().enumerate().skip(i + 1) {
            if !processed.contains(&j) && are_duplicates(&records[i], other) {
                group.push(j);
                processed.insert(j);
            }
        }

        if group.len() > 1 {
            groups.push(group);
        }
        processed.insert(i);
    }

    groups
}

/// Merge `duplicate` into `survivor`, filling only the survivor's empty fields
///
/// The survivor's title, source and scoring fields are never touched.
/// Returns the names of the fields that were filled.
pub fn merge_into(survivor: &mut Record, duplicate: Record) -> Vec<&'static str> {
    let mut filled = Vec::new();
    let duplicate_has_year = !duplicate.has_unknown_year();

    macro_rules! fill {
        ($($field:ident),+ $(,)?) => {
            $(
                if survivor.$field.is_none() && duplicate.$field.is_some() {
                    survivor.$field = duplicate.$field;
                    filled.push(stringify!($field));
                }
            )+
        };
    }

    fill!(url, isbn, publisher, doi, journal, volume, issue, pages, pub_type, abstract_text);

    if survivor.authors.is_empty() && !duplicate.authors.is_empty() {
        survivor.authors = duplicate.authors;
        filled.push("authors");
    }

    if survivor.has_unknown_year() && duplicate_has_year {
        survivor.year = duplicate.year;
        filled.push("year");
    }

    filled
}

/// Single-pass, order-dependent deduplication
///
/// The first record seen for a work becomes the survivor; every later
/// duplicate is merged into it with [`merge_into`]. Identifiers gained by
/// a survivor through merging are matched against later records too.
pub fn deduplicate_records(records: Vec<Record>) -> Vec<Record> {
    let mut survivors: Vec<Record> = Vec::with_capacity(records.len());
    let mut titles: Vec<String> = Vec::with_capacity(records.len());
    let mut by_identifier: HashMap<String, usize> = HashMap::new();

    for record in records {
        let title = record.normalized_title();
        let matched = record
            .normalized_identifier()
            .and_then(|doi| by_identifier.get(&doi).copied())
            .or_else(|| titles.iter().position(|t| titles_match(t, &title)));

        match matched {
            Some(idx) => {
                let duplicate_source = record.source.clone();
                let survivor = &mut survivors[idx];
                let filled = merge_into(survivor, record);

                tracing::debug!(
                    title = %survivor.title,
                    survivor = %survivor.source,
                    duplicate = %duplicate_source,
                    ?filled,
                    "Merged duplicate"
                );

                if let Some(doi) = survivor.normalized_identifier() {
                    by_identifier.entry(doi).or_insert(idx);
                }
            }
            None => {
                if let Some(doi) = record.normalized_identifier() {
                    by_identifier.insert(doi, survivors.len());
                }
                titles.push(title);
                survivors.push(record);
            }
        }
    }

    survivors
}
