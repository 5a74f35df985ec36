//! The best-effort wrapper every Marigold service talks to.
//!
//! [`SessionStore`] sits between the services and a [`KeyValueStore`]
//! backend and enforces one rule: **no backend error escapes**. A failed
//! read becomes "absent", a failed write becomes [`Outcome::Failed`], a
//! failed scan becomes an empty list. Each one is logged here, once,
//! with the key that was involved. Callers therefore treat "not found"
//! and "store briefly unavailable" the same way, which is the contract
//! the credential and presence layers are built on.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use marigold_protocol::{Codec, JsonCodec, SessionRecord};

use crate::{KeyValueStore, Outcome};

/// Longest key prefix written to logs. Session keys embed the credential
/// itself, which must not end up in log files in full.
const LOGGED_KEY_LEN: usize = 32;

fn loggable(key: &str) -> &str {
    key.get(..LOGGED_KEY_LEN).unwrap_or(key)
}

/// Shared, cloneable handle over a store backend.
///
/// Cloning is cheap (an `Arc` bump). The credential service and the
/// presence tracker each hold a clone pointing at the same backend.
pub struct SessionStore<B: KeyValueStore> {
    backend: Arc<B>,
    codec: JsonCodec,
}

// Manual impl: `#[derive(Clone)]` would demand `B: Clone`, but only the
// `Arc` is cloned.
impl<B: KeyValueStore> Clone for SessionStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            codec: self.codec,
        }
    }
}

impl<B: KeyValueStore> SessionStore<B> {
    /// Wraps a backend handle.
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            codec: JsonCodec,
        }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Stores `value` under `key` for `ttl`.
    ///
    /// A zero `ttl` means the value is already stale: the key is deleted
    /// instead and the write reports [`Outcome::Skipped`], or
    /// [`Outcome::Failed`] if that delete failed.
    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> Outcome {
        if ttl.is_zero() {
            return match self.delete(key).await {
                Outcome::Failed => Outcome::Failed,
                Outcome::Applied | Outcome::Skipped => Outcome::Skipped,
            };
        }
        match self.backend.set_ex(key, value, ttl).await {
            Ok(()) => Outcome::Applied,
            Err(e) => {
                tracing::error!(key = loggable(key), error = %e, "store set failed");
                Outcome::Failed
            }
        }
    }

    /// Reads `key`. Absent, expired, and unreadable all come back `None`.
    pub async fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key = loggable(key), error = %e, "store get failed");
                None
            }
        }
    }

    /// Deletes `key`. `Skipped` if it did not exist.
    pub async fn delete(&self, key: &str) -> Outcome {
        match self.backend.delete(key).await {
            Ok(removed) => Outcome::from_changed(removed),
            Err(e) => {
                tracing::error!(key = loggable(key), error = %e, "store delete failed");
                Outcome::Failed
            }
        }
    }

    /// Resets the TTL of `key`. `Skipped` if it did not exist.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Outcome {
        match self.backend.expire(key, ttl).await {
            Ok(found) => Outcome::from_changed(found),
            Err(e) => {
                tracing::error!(key = loggable(key), error = %e, "store expire failed");
                Outcome::Failed
            }
        }
    }

    /// Existence check; `false` on failure.
    pub async fn exists(&self, key: &str) -> bool {
        match self.backend.exists(key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(key = loggable(key), error = %e, "store exists failed");
                false
            }
        }
    }

    /// Remaining TTL; `None` if absent, unbounded, or on failure.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        match self.backend.ttl(key).await {
            Ok(ttl) => ttl,
            Err(e) => {
                tracing::error!(key = loggable(key), error = %e, "store ttl failed");
                None
            }
        }
    }

    // -- Session records ---------------------------------------------------

    /// Encodes and stores a session record.
    pub async fn put_record(
        &self,
        key: &str,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Outcome {
        match self.codec.encode(record) {
            Ok(text) => self.set(key, &text, ttl).await,
            Err(e) => {
                tracing::error!(key = loggable(key), error = %e, "session record encode failed");
                Outcome::Failed
            }
        }
    }

    /// Loads and decodes a session record. A value that does not decode
    /// is treated as absent.
    pub async fn get_record(&self, key: &str) -> Option<SessionRecord> {
        let text = self.get(key).await?;
        match self.codec.decode(&text) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key = loggable(key), error = %e, "unreadable session record");
                None
            }
        }
    }

    /// Scans every key matching `pattern` and returns those whose value
    /// satisfies `predicate`.
    ///
    /// One `get` per scanned key: the cost is linear in the number of
    /// matching keys in the whole store. Keys that vanish between the
    /// scan and the read are silently skipped. Any scan failure yields an
    /// empty list.
    pub async fn find_by_predicate<F>(
        &self,
        pattern: &str,
        predicate: F,
    ) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let keys = match self.backend.scan(pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!(pattern, error = %e, "store scan failed");
                return Vec::new();
            }
        };

        let mut matched = Vec::new();
        for key in keys {
            if let Some(value) = self.get(&key).await {
                if predicate(&value) {
                    matched.push(key);
                }
            }
        }
        matched
    }

    // -- Sets --------------------------------------------------------------

    /// Adds `member` to the set at `key`. `Skipped` if already present.
    pub async fn add_member(&self, key: &str, member: &str) -> Outcome {
        match self.backend.set_add(key, member).await {
            Ok(added) => Outcome::from_changed(added),
            Err(e) => {
                tracing::error!(key = loggable(key), error = %e, "store set-add failed");
                Outcome::Failed
            }
        }
    }

    /// Removes `member` from the set at `key`. `Skipped` if not present.
    pub async fn remove_member(&self, key: &str, member: &str) -> Outcome {
        match self.backend.set_remove(key, member).await {
            Ok(removed) => Outcome::from_changed(removed),
            Err(e) => {
                tracing::error!(key = loggable(key), error = %e, "store set-remove failed");
                Outcome::Failed
            }
        }
    }

    /// Members of the set at `key`; empty on failure.
    pub async fn members(&self, key: &str) -> HashSet<String> {
        match self.backend.set_members(key).await {
            Ok(members) => members,
            Err(e) => {
                tracing::error!(key = loggable(key), error = %e, "store set-members failed");
                HashSet::new()
            }
        }
    }

    /// Cardinality of the set at `key`; zero on failure.
    pub async fn member_count(&self, key: &str) -> usize {
        match self.backend.set_len(key).await {
            Ok(len) => len,
            Err(e) => {
                tracing::error!(key = loggable(key), error = %e, "store set-len failed");
                0
            }
        }
    }

    /// `true` if the backend answers.
    pub async fn ping(&self) -> bool {
        match self.backend.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "store health check failed");
                false
            }
        }
    }
}
