//! Error types for the store layer.

/// Errors a store backend can report.
///
/// These never reach callers of [`SessionStore`](crate::SessionStore):
/// the wrapper logs them and turns them into an absent/empty result or
/// [`Outcome::Failed`](crate::Outcome::Failed). Only code talking to a
/// backend directly (and [`RedisStore::connect`](crate::RedisStore))
/// sees them.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Could not reach the store at startup.
    #[cfg(feature = "redis")]
    #[error("store connection failed: {0}")]
    Connect(#[source] redis::RedisError),

    /// A command failed in flight: timeout, dropped connection, or an
    /// error reply from the server.
    #[cfg(feature = "redis")]
    #[error("store command failed: {0}")]
    Command(#[from] redis::RedisError),

    /// The key holds a value of another type (a set where a string was
    /// expected, or the other way round).
    #[error("key {0} holds the wrong kind of value")]
    WrongType(String),

    /// A record could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] marigold_protocol::ProtocolError),
}
