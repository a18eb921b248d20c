//! Per-question generation lock
//!
//! Concurrent requests for the same (document, normalized question) must not
//! all pay for synthesis. The first request takes an expiring lock key in the
//! shared store and generates; the others poll the exact cache until the
//! owner's answer lands there, the lock disappears, or they give up and
//! generate anyway.
//!
//! Every store failure makes the coordinator step aside ([`Coordination::Bypassed`])
//! so locking can never stop a question from being answered.

use crate::cache::{config::LockConfig, kv::KeyValueStore};
use crate::error::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Value stored under a held lock key
pub const LOCK_VALUE: &str = "processing";

/// Result of the wait/acquire protocol
#[derive(Debug)]
pub enum Coordination {
    /// This request holds the lock and must synthesize
    Owner(LockGuard),

    /// Another request produced the answer while we waited
    Answered(String),

    /// Every attempt found the lock held; synthesize without it
    Contended,

    /// Locking is disabled or the store is unreachable; synthesize without it
    Bypassed,
}

impl Coordination {
    /// Whether this request is expected to synthesize
    pub fn must_synthesize(&self) -> bool {
        !matches!(self, Coordination::Answered(_))
    }
}

/// Lock coordinator over a shared [`KeyValueStore`]
#[derive(Clone)]
pub struct LockCoordinator {
    store: Arc<dyn KeyValueStore>,
    config: LockConfig,
}

impl LockCoordinator {
    pub fn new(store: Arc<dyn KeyValueStore>, config: LockConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Atomically take the lock if nobody holds it
    pub async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.store.set_nx_ex(key, LOCK_VALUE.to_string(), ttl).await
    }

    /// Delete the lock regardless of who holds it
    pub async fn release(&self, key: &str) -> Result<()> {
        self.store.delete(key).await.map(|_| ())
    }

    /// Whether the lock is currently held
    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.store.exists(key).await
    }

    /// Run the wait/acquire protocol for one lock key
    ///
    /// `check_answer` reads the exact cache for the question; it is polled
    /// while another request holds the lock.
    pub async fn wait_or_acquire<F, Fut>(&self, key: &str, check_answer: F) -> Coordination
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Option<String>>,
    {
        if !self.config.enabled {
            return Coordination::Bypassed;
        }

        match self.run_protocol(key, &check_answer).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Lock store unavailable, proceeding without lock {}: {}", key, e);
                Coordination::Bypassed
            }
        }
    }

    async fn run_protocol<F, Fut>(&self, key: &str, check_answer: &F) -> Result<Coordination>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Option<String>>,
    {
        let attempts = self.config.acquire_attempts.max(1);

        // Each cycle waits out a held lock, then tries to take it
        for attempt in 1..=attempts {
            if self.exists(key).await? {
                debug!("Lock {} held elsewhere, waiting (attempt {})", key, attempt);
                if let Some(answer) = self.wait_for_answer(key, check_answer).await? {
                    return Ok(Coordination::Answered(answer));
                }
            }

            if self.try_acquire(key, self.config.lock_ttl).await? {
                debug!("Acquired lock {} on attempt {}", key, attempt);
                return Ok(Coordination::Owner(LockGuard::new(
                    self.store.clone(),
                    key.to_string(),
                )));
            }

            debug!("Lock {} taken by another waiter (attempt {})", key, attempt);
            if attempt < attempts {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }

        if let Some(answer) = check_answer().await {
            return Ok(Coordination::Answered(answer));
        }

        warn!(
            "Lock {} still contended after {} attempts, proceeding without it",
            key, attempts
        );
        Ok(Coordination::Contended)
    }

    /// Poll for the owner's answer; `None` once the lock is gone or polls run out
    async fn wait_for_answer<F, Fut>(&self, key: &str, check_answer: &F) -> Result<Option<String>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Option<String>>,
    {
        for _ in 0..self.config.max_polls {
            tokio::time::sleep(self.config.poll_interval).await;

            if let Some(answer) = check_answer().await {
                debug!("Answer for lock {} appeared while waiting", key);
                return Ok(Some(answer));
            }

            if !self.exists(key).await? {
                debug!("Lock {} released without an answer", key);
                return Ok(None);
            }
        }

        Ok(None)
    }
}

/// Held generation lock
///
/// Call [`LockGuard::release`] on the normal path. A guard dropped without
/// release (panic, cancelled future) schedules the delete on the current
/// runtime; if there is none, the lock TTL cleans up.
pub struct LockGuard {
    store: Arc<dyn KeyValueStore>,
    key: String,
    released: bool,
}

impl LockGuard {
    fn new(store: Arc<dyn KeyValueStore>, key: String) -> Self {
        Self {
            store,
            key,
            released: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Delete the lock key; failures are logged and left to the TTL
    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = self.store.delete(&self.key).await {
            warn!("Failed to release lock {}, leaving it to expire: {}", self.key, e);
        } else {
            debug!("Released lock {}", self.key);
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.key)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = store.delete(&key).await {
                        warn!("Deferred release of lock {} failed: {}", key, e);
                    }
                });
            }
            Err(_) => warn!("No runtime to release lock {}, leaving it to expire", key),
        }
    }
}
