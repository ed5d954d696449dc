//! Post-ranking filters applied to merged results.

use crate::models::{Record, SearchFilters};

/// Check a record against the year range and document type
///
/// A record whose year cannot be parsed counts as year 0, so it fails any
/// lower bound. Records without a publication type pass a document-type
/// filter since most providers do not report one.
pub fn passes_filters(record: &Record, filters: &SearchFilters) -> bool {
    let year = record.parsed_year().unwrap_or(0);
    if filters.year_from.is_some_and(|from| year < from) {
        return false;
    }
    if filters.year_to.is_some_and(|to| year > to) {
        return false;
    }

    if let (Some(wanted), Some(actual)) = (&filters.document_type, &record.pub_type) {
        let wanted = wanted.trim().to_lowercase();
        if !wanted.is_empty() && !actual.to_lowercase().contains(&wanted) {
            return false;
        }
    }

    true
}

/// Keep only records passing [`passes_filters`], preserving order
pub fn apply_filters(records: Vec<Record>, filters: &SearchFilters) -> Vec<Record> {
    if filters.year_from.is_none() && filters.year_to.is_none() && filters.document_type.is_none()
    {
        return records;
    }

    let before = records.len();
    let kept: Vec<Record> = records
        .into_iter()
        .filter(|r| passes_filters(r, filters))
        .collect();
    if kept.len() < before {
        tracing::debug!(removed = before - kept.len(), "Filtered records");
    }
    kept
}
