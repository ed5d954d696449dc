use std::collections::HashSet;
use thiserror::Error;

use crate::models::Record;

/// A result list that breaks the output contract
///
/// This indicates a bug in deduplication or an adapter, never a provider
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("Record at index {index} has an empty title")]
    MissingTitle { index: usize },

    #[error("Identifier {identifier} appears on more than one record")]
    DuplicateIdentifier { identifier: String },
}

/// Every record has a title and no two records share a non-empty identifier
pub fn ensure_invariants(records: &[Record]) -> Result<(), InvariantViolation> {
    let mut seen = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        if record.title.trim().is_empty() {
            let violation = InvariantViolation::MissingTitle { index };
            tracing::error!(%violation, "Result invariant violated");
            return Err(violation);
        }
        if let Some(identifier) = record.normalized_identifier() {
            if !seen.insert(identifier.clone()) {
                let violation = InvariantViolation::DuplicateIdentifier { identifier };
                tracing::error!(%violation, "Result invariant violated");
                return Err(violation);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordBuilder;

    #[test]
    fn test_valid_list() {
        let records = vec![
            RecordBuilder::new("A", "crossref").doi("10.1/a").build(),
            RecordBuilder::new("B", "pubmed").build(),
            RecordBuilder::new("C", "pubmed").build(),
        ];
        assert!(ensure_invariants(&records).is_ok());
        assert!(ensure_invariants(&[]).is_ok());
    }

    #[test]
    fn test_duplicate_identifier_case_insensitive() {
        let records = vec![
            RecordBuilder::new("A", "crossref").doi("10.1/ABC").build(),
            RecordBuilder::new("B", "pubmed").doi(" 10.1/abc ").build(),
        ];
        assert_eq!(
            ensure_invariants(&records),
            Err(InvariantViolation::DuplicateIdentifier {
                identifier: "10.1/abc".to_string()
            })
        );
    }

    #[test]
    fn test_missing_title() {
        let mut blank = RecordBuilder::new("x", "crossref").build();
        blank.title = "  ".to_string();
        let records = vec![RecordBuilder::new("A", "crossref").build(), blank];
        assert_eq!(
            ensure_invariants(&records),
            Err(InvariantViolation::MissingTitle { index: 1 })
        );
    }
}
