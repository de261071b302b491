//! Query complexity estimation.
//!
//! Longer queries with more question words and connectives earn a larger
//! share of the token budget.

const QUESTION_WORDS: &[&str] = &[
    "what", "why", "how", "when", "where", "which", "who", "whom", "whose",
];

const CONNECTIVES: &[&str] = &[
    "and", "or", "but", "because", "however", "although", "versus", "vs",
    "compare", "compared", "difference", "between", "whereas", "therefore", "while",
];

/// Word count at which the length component saturates.
const LENGTH_SATURATION: f32 = 40.0;

/// Complexity score in `[0, 1]`.
pub fn estimate_query_complexity(query: &str) -> f32 {
    let words: Vec<String> = query
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return 0.0;
    }
    let word_count = words.len() as f32;

    let length_score = (word_count / LENGTH_SATURATION).min(1.0);

    let question_hits = words
        .iter()
        .filter(|w| QUESTION_WORDS.contains(&w.as_str()))
        .count()
        + query.matches('?').count();
    let question_score = (question_hits as f32 / word_count * 4.0).min(1.0);

    let connective_hits = words
        .iter()
        .filter(|w| CONNECTIVES.contains(&w.as_str()))
        .count();
    let connective_score = (connective_hits as f32 / word_count * 5.0).min(1.0);

    (0.5 * length_score + 0.25 * question_score + 0.25 * connective_score).clamp(0.0, 1.0)
}

/// Scale `max_total_tokens` to between 70% and 100% by complexity.
pub fn effective_budget(max_total_tokens: u32, complexity: f32) -> u32 {
    let scale = 0.7 + 0.3 * f64::from(complexity.clamp(0.0, 1.0));
    // epsilon absorbs representation error (0.7 * 4000 = 2799.999...)
    let budget = (f64::from(max_total_tokens) * scale + 1e-6).floor() as u32;
    budget.min(max_total_tokens)
}
