//! Token estimation.

/// Approximate token count: `ceil(chars / 4)`.
///
/// Not a real tokenizer. Counts Unicode scalar values, not bytes.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count() as u32;
    chars.div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        // 4 chars, 8 bytes
        assert_eq!(estimate_tokens("éééé"), 1);
    }
}
