//! Tokenizer and relevance scorer.
//!
//! # Scoring
//!
//! ```text
//! score = |query_tokens ∩ document_tokens| / |query_tokens|
//! ```
//!
//! The score is the fraction of distinct query tokens that appear anywhere in
//! the document. It deliberately ignores term frequency and document length:
//! a huge file that mentions every query word once scores 1.0, the same as a
//! short file about exactly that topic. This is a coarse recall filter, and
//! downstream consumers rely on the number of matches it lets through, so
//! changing the formula changes result counts for them.

use std::collections::HashSet;

/// Split `text` into maximal runs of alphanumeric characters, lower-cased.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Query-length-normalized token overlap, in `[0.0, 1.0]`.
///
/// Not symmetric. An empty query scores 0.0 against every document.
pub fn score(query_tokens: &HashSet<String>, document_tokens: &HashSet<String>) -> f64 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let overlap = query_tokens
        .iter()
        .filter(|t| document_tokens.contains(*t))
        .count();
    overlap as f64 / query_tokens.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_tokenize_splits_on_non_alphanumeric() {
        assert_eq!(
            tokenize("### vrouter.yang\nmodule VRouter-Config {"),
            set(&["vrouter", "yang", "module", "config"])
        );
    }

    #[test]
    fn test_tokenize_empty_and_punctuation() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  ?!  -- ").is_empty());
    }

    #[test]
    fn test_tokenize_keeps_digits() {
        assert_eq!(tokenize("ipv4 rfc-7950"), set(&["ipv4", "rfc", "7950"]));
    }

    #[test]
    fn test_score_full_overlap_is_one() {
        let q = set(&["vrouter"]);
        let d = set(&["vrouter", "yang", "plus", "lots", "of", "other", "text"]);
        assert!((score(&q, &d) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_partial_overlap() {
        let q = set(&["vrouter", "bgp", "ospf", "isis"]);
        let d = set(&["vrouter", "ospf"]);
        assert!((score(&q, &d) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_score_not_symmetric() {
        let a = set(&["vrouter"]);
        let b = set(&["vrouter", "bgp"]);
        assert!((score(&a, &b) - 1.0).abs() < 1e-9);
        assert!((score(&b, &a) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_score_empty_query_is_zero() {
        assert_eq!(score(&HashSet::new(), &set(&["anything"])), 0.0);
    }

    #[test]
    fn test_score_in_unit_range() {
        let q = set(&["a", "b", "c"]);
        for d in [set(&[]), set(&["a"]), set(&["a", "b", "c", "d"])] {
            let s = score(&q, &d);
            assert!((0.0..=1.0).contains(&s), "score out of range: {}", s);
        }
    }
}
