//! Volatile, TTL-aware session store for Marigold.
//!
//! # Layers
//!
//! ```text
//! CredentialService / PresenceTracker (above)
//!     ↕
//! SessionStore  ← best-effort wrapper: logs and swallows backend errors
//!     ↕
//! KeyValueStore ← backend trait: MemoryStore, RedisStore
//! ```
//!
//! # Feature Flags
//!
//! - `redis` (default): [`RedisStore`] via the `redis` crate

#![allow(async_fn_in_trait)]

mod backend;
mod error;
mod memory;
mod outcome;
#[cfg(feature = "redis")]
mod redis_store;
mod session;

pub use backend::KeyValueStore;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use outcome::Outcome;
#[cfg(feature = "redis")]
pub use redis_store::{RedisStore, StoreConfig};
pub use session::SessionStore;
