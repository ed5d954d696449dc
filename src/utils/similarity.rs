//! Character-level string similarity used by deduplication and ranking.

use strsim::normalized_levenshtein;

/// Edit-distance similarity in [0, 1]
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    normalized_levenshtein(a, b)
}

/// Edit-distance similarity scaled to 0..=100
pub fn ratio(a: &str, b: &str) -> u32 {
    (similarity(a, b) * 100.0).round() as u32
}

/// Best [`ratio`] of the shorter string against every equally long window
/// of the longer one
///
/// Returns 0 when either side is empty.
pub fn partial_ratio(a: &str, b: &str) -> u32 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (short, long) = if a_chars.len() <= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };

    let needle: String = short.iter().collect();
    let width = short.len();
    let mut best = 0;

    for start in 0..=(long.len() - width) {
        let window: String = long[start..start + width].iter().collect();
        let score = ratio(&needle, &window);
        if score > best {
            best = score;
            if best == 100 {
                break;
            }
        }
    }

    best
}
