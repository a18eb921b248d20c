//! Store key layout
//!
//! Keys are plain strings so several processes can share one store:
//! `exact_cache:{document_id}:{question_hash}` for answers and
//! `lock:{document_id}:{question_hash}` for generation locks.
//!
//! `:` and `%` inside a document id are percent-encoded, so the prefix of one
//! document never covers the keys of another (`a` against `a:b`).

use crate::cache::types::CacheKey;
use serde::{Deserialize, Serialize};

/// Kind of value a key addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    /// Exact-match answer
    ExactAnswer,

    /// Per-question generation lock
    GenerationLock,
}

impl KeyKind {
    /// Kind of a raw store key, `None` for keys outside this layout
    pub fn of(key: &str) -> Option<Self> {
        let (kind, _) = key.split_once(':')?;
        match kind {
            "exact_cache" => Some(KeyKind::ExactAnswer),
            "lock" => Some(KeyKind::GenerationLock),
            _ => None,
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyKind::ExactAnswer => write!(f, "exact_cache"),
            KeyKind::GenerationLock => write!(f, "lock"),
        }
    }
}

/// Cache key builder scoped to one document
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    kind: KeyKind,
    document_id: String,
}

impl CacheKeyBuilder {
    /// Create a new key builder
    pub fn new(kind: KeyKind, document_id: impl Into<String>) -> Self {
        Self {
            kind,
            document_id: document_id.into(),
        }
    }

    /// Prefix shared by every key of this kind for the document
    pub fn prefix(&self) -> String {
        format!("{}:{}:", self.kind, escape_segment(&self.document_id))
    }

    /// Build the key for one question hash
    pub fn build(&self, question_hash: &str) -> CacheKey {
        format!("{}{}", self.prefix(), question_hash)
    }
}

fn escape_segment(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Key of the exact-match answer for a question
pub fn exact_key(document_id: &str, question_hash: &str) -> CacheKey {
    CacheKeyBuilder::new(KeyKind::ExactAnswer, document_id).build(question_hash)
}

/// Key of the generation lock for a question
pub fn lock_key(document_id: &str, question_hash: &str) -> CacheKey {
    CacheKeyBuilder::new(KeyKind::GenerationLock, document_id).build(question_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(exact_key("blog42", "abc"), "exact_cache:blog42:abc");
        assert_eq!(lock_key("blog42", "abc"), "lock:blog42:abc");
    }

    #[test]
    fn test_prefix_matches_built_keys() {
        let builder = CacheKeyBuilder::new(KeyKind::ExactAnswer, "blog42");
        assert!(builder.build("abc").starts_with(&builder.prefix()));

        // A document id that extends another must not share its prefix
        let other = CacheKeyBuilder::new(KeyKind::ExactAnswer, "blog420");
        assert!(!other.build("abc").starts_with(&builder.prefix()));
    }

    #[test]
    fn test_document_ids_with_separators_stay_apart() {
        assert_eq!(exact_key("a:b", "abc"), "exact_cache:a%3Ab:abc");
        assert_eq!(exact_key("50%", "abc"), "exact_cache:50%25:abc");

        let parent = CacheKeyBuilder::new(KeyKind::ExactAnswer, "a");
        assert!(!exact_key("a:b", "abc").starts_with(&parent.prefix()));

        // Pre-encoded ids must not alias raw ones
        assert_ne!(exact_key("a%3Ab", "abc"), exact_key("a:b", "abc"));
    }

    #[test]
    fn test_key_kind_of() {
        assert_eq!(KeyKind::of(&lock_key("a:b", "abc")), Some(KeyKind::GenerationLock));
        assert_eq!(KeyKind::of(&exact_key("doc", "abc")), Some(KeyKind::ExactAnswer));
        assert_eq!(KeyKind::of("session:1"), None);
        assert_eq!(KeyKind::of("plain"), None);
    }
}
