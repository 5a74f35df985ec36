//! Redis [`KeyValueStore`] backend (behind the `redis` feature).

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use redis::{AsyncCommands, IntoConnectionInfo};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};

use crate::{KeyValueStore, StoreError};

/// Keys fetched per `SCAN` round-trip.
const SCAN_BATCH: usize = 100;

/// Connection settings for [`RedisStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis URL, e.g. `redis://:password@host:6379/0`.
    pub url: String,

    /// Password applied on top of `url`. Overrides one embedded in the
    /// URL when both are present.
    pub password: Option<String>,

    /// Number of multiplexed connections to open. Commands are spread
    /// across them round-robin. Clamped to at least 1.
    pub pool_size: usize,

    /// Upper bound on establishing (or re-establishing) a connection.
    pub connect_timeout: Duration,

    /// Upper bound on a single command. A command that times out is
    /// reported as a store failure like any other.
    pub response_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            password: None,
            pool_size: 10,
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(5),
        }
    }
}

/// A [`KeyValueStore`] backed by Redis.
///
/// Holds a small pool of [`ConnectionManager`]s. Each one is a
/// multiplexed connection that transparently reconnects after a drop,
/// so a Redis restart shows up as a few failed commands (which the
/// session layer already treats as "absent") rather than a dead handle.
///
/// The handle is explicitly owned: create it once at startup with
/// [`connect`](Self::connect), share it behind `Arc`, drop it at
/// shutdown.
pub struct RedisStore {
    pool: Vec<ConnectionManager>,
    next: AtomicUsize,
}

impl RedisStore {
    /// Opens the pool and verifies the server answers `PING`.
    ///
    /// # Errors
    /// [`StoreError::Connect`] if the URL is invalid or any connection
    /// cannot be established within `connect_timeout`.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut info = config
            .url
            .as_str()
            .into_connection_info()
            .map_err(StoreError::Connect)?;
        if let Some(password) = &config.password {
            info.redis.password = Some(password.clone());
        }
        let client = redis::Client::open(info).map_err(StoreError::Connect)?;

        let size = config.pool_size.max(1);
        let mut pool = Vec::with_capacity(size);
        for _ in 0..size {
            let manager_config = ConnectionManagerConfig::new()
                .set_connection_timeout(config.connect_timeout)
                .set_response_timeout(config.response_timeout);
            let manager =
                ConnectionManager::new_with_config(client.clone(), manager_config)
                    .await
                    .map_err(StoreError::Connect)?;
            pool.push(manager);
        }

        let store = Self {
            pool,
            next: AtomicUsize::new(0),
        };
        store.ping().await?;
        tracing::info!(pool_size = size, "redis store connected");
        Ok(store)
    }

    /// Picks the next pooled connection. `ConnectionManager` is a cheap
    /// handle, so cloning it is how you "check out" a connection.
    fn connection(&self) -> ConnectionManager {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        self.pool[index].clone()
    }
}

/// Redis TTLs are whole seconds; anything shorter rounds up to one.
fn whole_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 { secs + 1 } else { secs.max(1) }
}

impl KeyValueStore for RedisStore {
    async fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut con = self.connection();
        let _: () = con.set_ex(key, value, whole_secs(ttl)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut con = self.connection();
        Ok(con.get(key).await?)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut con = self.connection();
        let removed: usize = con.del(key).await?;
        Ok(removed > 0)
    }

    async fn expire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut con = self.connection();
        let secs = i64::try_from(whole_secs(ttl)).unwrap_or(i64::MAX);
        Ok(con.expire(key, secs).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut con = self.connection();
        Ok(con.exists(key).await?)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut con = self.connection();
        // -2 = no such key, -1 = no expiry.
        let secs: i64 = con.ttl(key).await?;
        Ok(u64::try_from(secs).ok().map(Duration::from_secs))
    }

    async fn set_add(
        &self,
        key: &str,
        member: &str,
    ) -> Result<bool, StoreError> {
        let mut con = self.connection();
        let added: usize = con.sadd(key, member).await?;
        Ok(added > 0)
    }

    async fn set_remove(
        &self,
        key: &str,
        member: &str,
    ) -> Result<bool, StoreError> {
        let mut con = self.connection();
        let removed: usize = con.srem(key, member).await?;
        Ok(removed > 0)
    }

    async fn set_members(
        &self,
        key: &str,
    ) -> Result<HashSet<String>, StoreError> {
        let mut con = self.connection();
        Ok(con.smembers(key).await?)
    }

    async fn set_len(&self, key: &str) -> Result<usize, StoreError> {
        let mut con = self.connection();
        Ok(con.scard(key).await?)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut con = self.connection();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut con)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once across batches.
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut con = self.connection();
        let _: String = redis::cmd("PING").query_async(&mut con).await?;
        Ok(())
    }
}
