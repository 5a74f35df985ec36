//! In-process [`KeyValueStore`] backend.
//!
//! Behaves like the subset of Redis Marigold uses: string values with
//! TTLs, string sets that vanish when emptied, glob `SCAN`. Expiry is
//! lazy (an expired key is dropped the next time anything touches it)
//! and measured with `tokio::time::Instant`, so tests can pause the Tokio
//! clock and `advance` it past a TTL instead of sleeping.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{KeyValueStore, StoreError};

enum Value {
    Text(String),
    Set(HashSet<String>),
}

struct Entry {
    value: Value,
    /// `None` = no expiry (sets are created without one).
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// A [`KeyValueStore`] kept in a `HashMap` behind a Tokio mutex.
///
/// The mutex is held only for the duration of one map operation and
/// never across an `.await` on anything else, so every method is atomic
/// exactly like a single Redis command.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| e.is_live(now)).count()
    }

    /// Returns `true` if no live key exists.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every expired key now instead of waiting for it to be
    /// touched. Returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }
}

/// Looks up `key`, evicting it first if its TTL has lapsed.
fn live_entry<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
) -> Option<&'a mut Entry> {
    let now = Instant::now();
    if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

impl KeyValueStore for MemoryStore {
    async fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let entry = Entry {
            value: Value::Text(value.to_string()),
            expires_at: Some(Instant::now() + ttl),
        };
        self.entries.lock().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match live_entry(&mut entries, key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => Ok(Some(text.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        // An expired key counts as already gone.
        if live_entry(&mut entries, key).is_none() {
            return Ok(false);
        }
        Ok(entries.remove(key).is_some())
    }

    async fn expire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        match live_entry(&mut entries, key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        Ok(live_entry(&mut entries, key).is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        Ok(live_entry(&mut entries, key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn set_add(
        &self,
        key: &str,
        member: &str,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        match live_entry(&mut entries, key) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.insert(member.to_string())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => {
                let members = HashSet::from([member.to_string()]);
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Set(members),
                        expires_at: None,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn set_remove(
        &self,
        key: &str,
        member: &str,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        let Some(entry) = live_entry(&mut entries, key) else {
            return Ok(false);
        };
        let Value::Set(members) = &mut entry.value else {
            return Err(StoreError::WrongType(key.to_string()));
        };
        let removed = members.remove(member);
        if members.is_empty() {
            entries.remove(key);
        }
        Ok(removed)
    }

    async fn set_members(
        &self,
        key: &str,
    ) -> Result<HashSet<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match live_entry(&mut entries, key) {
            None => Ok(HashSet::new()),
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.clone()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set_len(&self, key: &str) -> Result<usize, StoreError> {
        let mut entries = self.entries.lock().await;
        match live_entry(&mut entries, key) {
            None => Ok(0),
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.len()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(key, entry)| {
                entry.is_live(now) && glob_match(pattern, key)
            })
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Redis-style glob: `*` matches any run of bytes, `?` exactly one.
fn glob_match(pattern: &str, text: &str) -> bool {
    let (p, t) = (pattern.as_bytes(), text.as_bytes());
    let (mut pi, mut ti) = (0, 0);
    // Position of the last `*` seen and the text index it was tried at.
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == b'?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == b'*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star, mark)) = backtrack {
            pi = star + 1;
            ti = mark + 1;
            backtrack = Some((star, mark + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_glob_match() {
        assert!(glob_match("session:*:*", "session:access:abc"));
        assert!(glob_match("session:*", "session:"));
        assert!(glob_match("*", ""));
        assert!(glob_match("ws:user:?", "ws:user:a"));
        assert!(!glob_match("session:*:*", "ws:user:alice"));
        assert!(!glob_match("session:*:*", "session:access"));
        assert!(!glob_match("ws:user:?", "ws:user:ab"));
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", MINUTE).await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap(), "second delete is a no-op");
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_lapse_hides_key() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", MINUTE).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.exists("k").await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!store.exists("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.expire("k", MINUTE).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_resets_ttl() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", MINUTE).await.unwrap();
        tokio::time::advance(Duration::from_secs(50)).await;

        assert!(store.expire("k", MINUTE).await.unwrap());
        tokio::time::advance(Duration::from_secs(50)).await;

        assert!(store.exists("k").await.unwrap(), "TTL was pushed out");
        assert_eq!(
            store.ttl("k").await.unwrap(),
            Some(Duration::from_secs(10))
        );
    }

    #[tokio::test]
    async fn test_set_ops_and_empty_set_disappears() {
        let store = MemoryStore::new();
        assert!(store.set_add("s", "a").await.unwrap());
        assert!(!store.set_add("s", "a").await.unwrap(), "already present");
        assert!(store.set_add("s", "b").await.unwrap());
        assert_eq!(store.set_len("s").await.unwrap(), 2);
        assert_eq!(store.ttl("s").await.unwrap(), None, "sets never expire");

        assert!(store.set_remove("s", "a").await.unwrap());
        assert!(!store.set_remove("s", "a").await.unwrap());
        assert!(store.set_remove("s", "b").await.unwrap());
        assert!(!store.exists("s").await.unwrap());
        assert!(store.set_members("s").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let store = MemoryStore::new();
        store.set_ex("text", "v", MINUTE).await.unwrap();
        store.set_add("set", "m").await.unwrap();

        assert!(matches!(
            store.set_add("text", "m").await,
            Err(StoreError::WrongType(_))
        ));
        assert!(matches!(
            store.get("set").await,
            Err(StoreError::WrongType(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_skips_expired_and_non_matching() {
        let store = MemoryStore::new();
        store.set_ex("session:access:a", "1", MINUTE).await.unwrap();
        store
            .set_ex("session:refresh:b", "2", Duration::from_secs(5))
            .await
            .unwrap();
        store.set_ex("ws:user:alice", "c", MINUTE).await.unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;

        let keys = store.scan("session:*:*").await.unwrap();
        assert_eq!(keys, vec!["session:access:a".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_counts_dropped_keys() {
        let store = MemoryStore::new();
        store.set_ex("a", "1", Duration::from_secs(1)).await.unwrap();
        store.set_ex("b", "2", MINUTE).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }
}
