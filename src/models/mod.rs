//! Core data models for bibliographic records and search operations.

mod record;
mod search;

pub use record::{
    first_four_digit_run, normalize_text, MatchType, Record, RecordBuilder, RetrievalMethod,
    SelectionDetails, UNKNOWN_YEAR,
};
pub use search::{SearchFilters, SearchMode, SearchQuery};
