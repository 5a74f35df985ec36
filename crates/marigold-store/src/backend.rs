//! The backend seam: what a shared key-value store must offer.
//!
//! Marigold does not care whether sessions live in Redis, in process
//! memory, or somewhere else. It needs something that implements
//! [`KeyValueStore`]. Production wires in [`RedisStore`](crate::RedisStore);
//! tests and single-process deployments use
//! [`MemoryStore`](crate::MemoryStore).

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use crate::StoreError;

/// A TTL-aware key-value store with string values and string sets.
///
/// Every method is a single store-level atomic operation. Nothing here
/// spans keys; multi-key consistency is the caller's problem.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one store handle is shared (behind `Arc`)
///   by every request and connection task.
/// - Each method returns a `Send` future so callers can `.await` it from
///   inside `tokio::spawn`.
///
/// Implementations may simply write `async fn` for each method.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Stores `value` under `key`, replacing anything there, expiring
    /// after `ttl`.
    fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Reads a string value. `Ok(None)` if absent or expired.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Removes a key of any type. `Ok(true)` if something was removed.
    fn delete(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Resets the time-to-live of an existing key.
    /// `Ok(false)` if the key does not exist.
    fn expire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// `Ok(true)` if the key currently exists.
    fn exists(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Remaining time-to-live. `Ok(None)` if the key is absent or has no
    /// expiry.
    fn ttl(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Duration>, StoreError>> + Send;

    /// Adds `member` to the set at `key`, creating the set if needed.
    /// `Ok(true)` if the member was not already present.
    fn set_add(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Removes `member` from the set at `key`. An emptied set disappears.
    /// `Ok(true)` if the member was present.
    fn set_remove(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// All members of the set at `key` (empty if absent).
    fn set_members(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<HashSet<String>, StoreError>> + Send;

    /// Cardinality of the set at `key` (0 if absent).
    fn set_len(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Every live key matching a glob `pattern` (`*` wildcard).
    ///
    /// Cost is proportional to the number of keys in the store, not to
    /// the number of matches.
    fn scan(
        &self,
        pattern: &str,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Liveness check.
    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
