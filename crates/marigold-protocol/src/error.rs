//! Error types for the protocol layer.
//!
//! Each crate in Marigold defines its own error enum. A `ProtocolError`
//! always means a value could not be turned into (or read back from) its
//! wire form, never that a store or a credential check failed.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into its stored form).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning a stored value back into Rust).
    ///
    /// Common causes: a record written by an incompatible version, a key
    /// that holds something other than a session record, or truncation.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// An identifier did not satisfy its value rules, e.g. an empty user
    /// id, a user id with spaces, or a room number outside `0..=i32::MAX`.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}
