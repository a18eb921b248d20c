//! Removal reports
//!
//! Every bulk removal (expiry sweep, clear, re-index of a document) returns an
//! [`InvalidationEvent`] so callers can log what left the caches and why.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// TTL ran out
    Expired,

    /// The whole store was emptied
    Cleared,

    /// The document was re-indexed, so its answers may be stale
    Reindexed { document_id: String },
}

impl fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationReason::Expired => write!(f, "expired"),
            InvalidationReason::Cleared => write!(f, "cleared"),
            InvalidationReason::Reindexed { document_id } => {
                write!(f, "re-indexed {}", document_id)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    pub reason: InvalidationReason,
    pub at: DateTime<Utc>,
    pub removed: usize,
    /// Per-layer breakdown or other free-form notes
    pub detail: Option<String>,
}

impl InvalidationEvent {
    pub fn new(reason: InvalidationReason, removed: usize) -> Self {
        Self {
            reason,
            at: Utc::now(),
            removed,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for InvalidationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: removed {}", self.reason, self.removed)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}
