//! Question normalization for cache keys
//!
//! Two surface-different questions with the same intent ("What is the topic of
//! this blog?" and "topic?") must map to the same key. Normalization lowercases,
//! strips punctuation, removes filler phrases and collapses whitespace.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Filler patterns, applied in order
static FILLERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Interrogative openers
        r"\b(what is|what are|tell me|explain|summarize|who is|show me)\b",
        // Articles and prepositions
        r"\b(of|about|in|on|the|a|an)\b",
        // Self-references to the document
        r"\b(this blog|the blog|this post|the post|this article|the article|blog|post|article)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid filler pattern"))
    .collect()
});

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid punctuation pattern"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Canonicalize a natural-language question into a cache key string.
///
/// The result may be empty when the question consists only of filler words;
/// the empty string is a valid key.
///
/// Filler removal runs until nothing changes, so removing one filler cannot
/// leave behind a new one ("what the is" becomes "what is" and then "").
/// This keeps `normalize(normalize(q)) == normalize(q)`.
pub fn normalize(question: &str) -> String {
    let lowered = question.to_lowercase();
    let mut current = collapse(&PUNCTUATION.replace_all(&lowered, ""));

    loop {
        let mut next = current.clone();
        for pattern in FILLERS.iter() {
            next = pattern.replace_all(&next, " ").into_owned();
        }
        let next = collapse(&next);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Hex SHA-256 digest of an already normalized question
pub fn question_hash(normalized: &str) -> String {
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Normalize and hash in one step
pub fn normalized_hash(question: &str) -> (String, String) {
    let normalized = normalize(question);
    let hash = question_hash(&normalized);
    (normalized, hash)
}

fn collapse(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_variants_share_key() {
        assert_eq!(normalize("What is the topic of this blog?"), "topic");
        assert_eq!(normalize("topic?"), "topic");
        assert_eq!(normalize("topic of this blog ?"), "topic");
        assert_eq!(
            normalize("What is the topic of this blog?"),
            normalize("topic?")
        );
    }

    #[test]
    fn test_lowercase_and_punctuation() {
        assert_eq!(normalize("  Rust, OWNERSHIP!!  "), "rust ownership");
        assert_eq!(normalize("Who wrote it?"), "who wrote it");
    }

    #[test]
    fn test_filler_only_question_is_empty_key() {
        assert_eq!(normalize("What is this article about?"), "");
        assert_eq!(normalize("???"), "");
        assert_eq!(question_hash(""), question_hash(&normalize("the blog")));
    }

    #[test]
    fn test_idempotent_when_fillers_reassemble() {
        let once = normalize("what the is tokio");
        assert_eq!(once, "tokio");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_idempotence_over_samples() {
        let samples = [
            "What is the topic of this blog?",
            "Tell me about the author of the post.",
            "explain in detail: the borrow checker",
            "Summarize this article on async Rust",
            "who is a an the of",
            "Show me the code!",
            "",
            "   ",
            "Was ist das?",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_word_boundaries_respected() {
        // "on" inside "tokio" or "python" must survive
        assert_eq!(normalize("python on tokio"), "python tokio");
        assert_eq!(normalize("postgres"), "postgres");
    }

    #[test]
    fn test_question_hash_is_hex_sha256() {
        let hash = question_hash("topic");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, question_hash("topic"));
        assert_ne!(hash, question_hash("topics"));
    }
}
