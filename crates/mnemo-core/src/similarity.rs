//! String and vector similarity functions.
//!
//! Pure functions only: no state, no I/O. All scores are in `[0, 1]`
//! except cosine similarity, which is in `[-1, 1]`.

use std::collections::HashSet;

/// Normalized Levenshtein similarity, case-insensitive.
///
/// `1 - edit_distance / max(len(a), len(b))`, measured in chars.
/// Identical strings score 1.0; otherwise an empty side scores 0.0.
pub fn levenshtein_similarity(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let distance = edit_distance(&a, &b);
    let max_len = a.len().max(b.len());
    1.0 - distance as f32 / max_len as f32
}

/// Classic two-row dynamic programming edit distance.
fn edit_distance(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Token-set Jaccard similarity over lowercase whitespace-split tokens.
///
/// Returns 0.0 when both sides have no tokens.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let a_tokens: HashSet<&str> = a_lower.split_whitespace().collect();
    let b_tokens: HashSet<&str> = b_lower.split_whitespace().collect();

    let union = a_tokens.union(&b_tokens).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a_tokens.intersection(&b_tokens).count();
    intersection as f32 / union as f32
}

/// Max of Levenshtein and Jaccard similarity.
///
/// Levenshtein catches character-level typos ("Microsft"); Jaccard catches
/// reordered or partially overlapping names ("Bank of America" vs
/// "America Bank").
pub fn combined_string_similarity(a: &str, b: &str) -> f32 {
    levenshtein_similarity(a, b).max(jaccard_similarity(a, b))
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 on dimension mismatch, empty input, or zero magnitude.
pub fn cosine_similarity(u: &[f32], v: &[f32]) -> f32 {
    if u.len() != v.len() || u.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_u = 0.0_f64;
    let mut norm_v = 0.0_f64;
    for (x, y) in u.iter().zip(v) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_u += x * x;
        norm_v += y * y;
    }

    let denom = norm_u.sqrt() * norm_v.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (dot / denom) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_levenshtein_identical_and_empty() {
        assert_eq!(levenshtein_similarity("Rust", "rust"), 1.0);
        assert_eq!(levenshtein_similarity("", "rust"), 0.0);
        assert_eq!(levenshtein_similarity("rust", ""), 0.0);
    }

    #[test]
    fn test_levenshtein_typo() {
        // one deletion over 9 chars
        let sim = levenshtein_similarity("Microsoft", "Microsft");
        assert!(approx(sim, 1.0 - 1.0 / 9.0));
    }

    #[test]
    fn test_levenshtein_unicode_counts_chars() {
        let sim = levenshtein_similarity("café", "cafe");
        assert!(approx(sim, 0.75));
    }

    #[test]
    fn test_jaccard_reordered() {
        assert_eq!(jaccard_similarity("Bank of America", "america OF bank"), 1.0);
        assert!(approx(jaccard_similarity("acme corp", "acme corporation"), 1.0 / 3.0));
        assert_eq!(jaccard_similarity("", "   "), 0.0);
    }

    #[test]
    fn test_combined_takes_max() {
        let a = "Bank of America";
        let b = "America Bank of";
        assert_eq!(combined_string_similarity(a, b), 1.0);
        let typo = combined_string_similarity("Kubernetes", "Kubernets");
        assert!(typo > 0.85);
    }

    #[test]
    fn test_cosine_basic() {
        assert!(approx(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0));
        assert!(approx(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0));
        assert!(approx(cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]), -1.0));
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
