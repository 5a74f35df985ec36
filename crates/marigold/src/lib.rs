//! # Marigold
//!
//! Credential lifecycle and presence coordination for the Marigold chat
//! service.
//!
//! ```text
//! marigold-protocol   identifiers, claims, session records, key layout
//!        ↓
//! marigold-store      TTL key-value store (memory / Redis), best-effort wrapper
//!        ↓
//! marigold-auth       issue / resolve / refresh / logout credentials
//! marigold-presence   who is online, who is in which room
//!        ↓
//! marigold            settings, WebSocket gateway, telemetry, the bundle
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use marigold::prelude::*;
//!
//! # async fn run() -> Result<(), MarigoldError> {
//! marigold::telemetry::init("info");
//! let settings = Settings::from_env()?;
//! let app = Marigold::connect(&settings).await?;
//!
//! let alice = UserId::parse("alice")?;
//! let pair = app.credentials().issue(&alice).await?;
//! assert_eq!(app.credentials().authenticate(&pair.access).await?, alice);
//! # Ok(())
//! # }
//! ```

#![allow(async_fn_in_trait)]

mod app;
mod config;
mod error;
pub mod gateway;
pub mod telemetry;

pub use app::Marigold;
pub use config::{ConfigError, Settings, VARIABLES};
pub use error::MarigoldError;
pub use gateway::{Gateway, LiveConnection};

pub mod prelude {
    pub use crate::{ConfigError, Gateway, LiveConnection, Marigold, MarigoldError, Settings};
    pub use marigold_auth::{
        AuthError, Authenticator, CredentialConfig, CredentialService, Revocation, TokenPair,
    };
    pub use marigold_presence::{PresenceConfig, PresenceTracker};
    pub use marigold_protocol::{ConnectionId, RoomId, TokenKind, UserId};
    pub use marigold_store::{KeyValueStore, MemoryStore, Outcome, RedisStore, SessionStore, StoreConfig};
}
