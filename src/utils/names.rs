//! Author-name matching used to filter author-search results.

use crate::utils::similarity::similarity;

/// Family names at or above this similarity are treated as the same person
pub const SURNAME_SIMILARITY_THRESHOLD: f64 = 0.85;

const SURNAME_PARTICLES: &[&str] = &[
    "van", "von", "der", "den", "ter", "ten", "de", "del", "della", "di", "da", "dos", "du", "la",
    "le", "lo", "las", "los",
];

/// Predicate deciding whether a candidate author is the queried person
pub trait NameMatcher: Send + Sync + std::fmt::Debug {
    fn matches(
        &self,
        query_given: &str,
        query_family: &str,
        candidate_given: &str,
        candidate_family: &str,
    ) -> bool;
}

/// Case-insensitive matcher tolerant of initials and small misspellings
///
/// - family names must be equal or at least 85% similar
/// - an empty query given name matches on family name alone
/// - given names match on prefix ("J" / "John"), shared initial when either
///   side is a bare initial, or similarity
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyNameMatcher;

impl NameMatcher for FuzzyNameMatcher {
    fn matches(
        &self,
        query_given: &str,
        query_family: &str,
        candidate_given: &str,
        candidate_family: &str,
    ) -> bool {
        let qf = clean_name(query_family);
        let cf = clean_name(candidate_family);
        if qf.is_empty() || cf.is_empty() {
            return false;
        }
        if qf != cf && similarity(&qf, &cf) < SURNAME_SIMILARITY_THRESHOLD {
            return false;
        }

        let qg = clean_name(query_given);
        let cg = clean_name(candidate_given);
        if qg.is_empty() || cg.is_empty() {
            return true;
        }

        if qg.starts_with(&cg) || cg.starts_with(&qg) {
            return true;
        }

        let q_first = qg.split_whitespace().next().unwrap_or_default();
        let c_first = cg.split_whitespace().next().unwrap_or_default();
        let is_initial = |s: &str| s.chars().count() == 1;
        if (is_initial(q_first) || is_initial(c_first))
            && q_first.chars().next() == c_first.chars().next()
        {
            return true;
        }

        similarity(q_first, c_first) >= SURNAME_SIMILARITY_THRESHOLD
    }
}

/// Lowercase, replace dots and hyphens with spaces, collapse whitespace
fn clean_name(name: &str) -> String {
    name.to_lowercase()
        .replace(['.', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a free-text author query into `(given, family)`
///
/// Accepts "Family, Given" and "Given [particles] Family". A single token is
/// a family name with no given name.
pub fn split_author_query(query: &str) -> (String, String) {
    split_name(query)
}

/// Split a provider author string into `(given, family)`
pub fn split_candidate_name(name: &str) -> (String, String) {
    split_name(name)
}

fn split_name(name: &str) -> (String, String) {
    let name = name.trim();

    if let Some((family, given)) = name.split_once(',') {
        return (given.trim().to_string(), family.trim().to_string());
    }

    let tokens: Vec<&str> = name.split_whitespace().collect();
    match tokens.len() {
        0 => (String::new(), String::new()),
        1 => (String::new(), tokens[0].to_string()),
        n => {
            let mut family_start = n - 1;
            while family_start > 1
                && SURNAME_PARTICLES.contains(&tokens[family_start - 1].to_lowercase().as_str())
            {
                family_start -= 1;
            }
            (
                tokens[..family_start].join(" "),
                tokens[family_start..].join(" "),
            )
        }
    }
}

/// Check a candidate author string against a query split, also trying the
/// query with given and family swapped
pub fn author_matches(matcher: &dyn NameMatcher, query: &(String, String), candidate: &str) -> bool {
    let (cg, cf) = split_candidate_name(candidate);
    let (qg, qf) = query;

    matcher.matches(qg, qf, &cg, &cf) || (!qg.is_empty() && matcher.matches(qf, qg, &cg, &cf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(qg: &str, qf: &str, cg: &str, cf: &str) -> bool {
        FuzzyNameMatcher.matches(qg, qf, cg, cf)
    }

    #[test]
    fn test_exact_and_case() {
        assert!(m("John", "Smith", "john", "SMITH"));
    }

    #[test]
    fn test_initials() {
        assert!(m("J", "Smith", "John", "Smith"));
        assert!(m("J.", "Smith", "John", "Smith"));
        assert!(m("John", "Smith", "J. R.", "Smith"));
        assert!(!m("John", "Smith", "Mary", "Smith"));
    }

    #[test]
    fn test_surname_only() {
        assert!(m("", "Knuth", "Donald E.", "Knuth"));
        assert!(!m("", "Knuth", "Donald", "Kuhn"));
    }

    #[test]
    fn test_surname_typo() {
        assert!(m("Arnold", "Schwarzenegger", "Arnold", "Schwarzeneger"));
        assert!(!m("Donald", "Knuth", "Donald", "Smith"));
    }

    #[test]
    fn test_split_comma_form() {
        assert_eq!(
            split_author_query("Smith, John"),
            ("John".to_string(), "Smith".to_string())
        );
    }

    #[test]
    fn test_split_particles() {
        assert_eq!(
            split_author_query("Ludwig van Beethoven"),
            ("Ludwig".to_string(), "van Beethoven".to_string())
        );
        assert_eq!(
            split_author_query("Johannes Diderik van der Waals"),
            ("Johannes Diderik".to_string(), "van der Waals".to_string())
        );
        assert_eq!(
            split_author_query("Knuth"),
            (String::new(), "Knuth".to_string())
        );
    }

    #[test]
    fn test_author_matches_swapped() {
        // "Smith John" read as given=Smith family=John only matches swapped
        let query = split_author_query("Smith John");
        assert!(author_matches(&FuzzyNameMatcher, &query, "Smith, John"));
        assert!(author_matches(&FuzzyNameMatcher, &query, "John Smith"));
        assert!(!author_matches(&FuzzyNameMatcher, &query, "Mary Jones"));
    }
}
