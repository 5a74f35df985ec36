//! Codec trait and implementations for the values kept in the store.
//!
//! Store values are text (Redis strings), so a codec here maps between
//! Rust types and `String`, not bytes. The rest of Marigold only needs
//! *something* that implements [`Codec`]; [`JsonCodec`] is the one the
//! session-record wire format calls for.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts values to and from their stored text form.
///
/// `Send + Sync + 'static` because a codec lives inside long-lived
/// services shared across Tokio tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into its stored form.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a stored value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the text is malformed or does
    /// not match the expected shape.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &str,
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ```rust
/// use marigold_protocol::{Codec, JsonCodec, SessionRecord, TokenKind, UserId};
///
/// let codec = JsonCodec;
/// let record = SessionRecord::linked(
///     UserId::parse("alice").unwrap(),
///     TokenKind::Access,
///     "refresh-token",
/// );
///
/// let text = codec.encode(&record).unwrap();
/// let decoded: SessionRecord = codec.decode(&text).unwrap();
/// assert_eq!(record, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &str,
    ) -> Result<T, ProtocolError> {
        serde_json::from_str(data).map_err(ProtocolError::Decode)
    }
}
