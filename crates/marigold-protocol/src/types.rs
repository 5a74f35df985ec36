//! Identity types shared by every Marigold crate.
//!
//! These are the values that end up inside store keys and credential
//! claims, so each one knows how to validate itself and how to print
//! itself the way the key layout expects.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// A unique identifier for a chat user.
///
/// Newtype over `String`. The inner value is private so the only way to
/// get a `UserId` is through [`UserId::parse`], which enforces the value
/// rules: non-empty, ASCII letters, digits and `-` only. Those rules
/// matter because the id is spliced into store keys such as
/// `ws:user:<id>:rooms`: a `:` or `*` inside an id would collide with
/// other keys or turn into a scan pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Validates and wraps a raw user id, exactly as given: surrounding
    /// whitespace is rejected like any other disallowed character.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidIdentifier`] if the id is empty or
    /// contains anything other than `[a-zA-Z0-9-]`.
    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        if value.is_empty() {
            return Err(ProtocolError::InvalidIdentifier(
                "user id must not be empty".into(),
            ));
        }
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ProtocolError::InvalidIdentifier(format!(
                "user id {value:?} may only contain letters, digits and '-'"
            )));
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Deserializing goes through [`UserId::parse`], so a stored or decoded
/// value can never smuggle in an id that the constructor would reject.
impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// RoomId
// ---------------------------------------------------------------------------

/// A chat room number.
///
/// Rooms are numbered by the external room repository, which stores them
/// as signed 32-bit integers, so the valid range is `0..=i32::MAX`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(u32);

impl RoomId {
    /// Largest room number the room repository can hold.
    pub const MAX: u32 = i32::MAX as u32;

    /// Wraps a room number.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidIdentifier`] above [`RoomId::MAX`].
    pub fn new(value: u32) -> Result<Self, ProtocolError> {
        if value > Self::MAX {
            return Err(ProtocolError::InvalidIdentifier(format!(
                "room id {value} exceeds {}",
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    /// Returns the raw room number.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoomId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s.trim().parse().map_err(|_| {
            ProtocolError::InvalidIdentifier(format!(
                "room id {s:?} is not a number"
            ))
        })?;
        Self::new(value)
    }
}

// ---------------------------------------------------------------------------
// ConnectionId
// ---------------------------------------------------------------------------

/// Opaque identifier of one live connection (one WebSocket, typically).
///
/// The presence tracker only ever stores and compares it; it is never
/// parsed, so any string the transport hands us is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Wraps an id supplied by the transport layer.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random id: 32 lowercase hex characters
    /// (128 bits of randomness), so two connections never collide.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// TokenKind
// ---------------------------------------------------------------------------

/// Which half of a credential pair a token is.
///
/// Serialized lowercase (`"access"` / `"refresh"`), matching both the
/// `type` claim inside the token and the `token_type` segment of the
/// session key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived credential presented on every request.
    Access,
    /// Long-lived credential used only to mint new access credentials.
    Refresh,
}

impl TokenKind {
    /// The lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }

    /// The other half of the pair.
    pub fn counterpart(self) -> Self {
        match self {
            Self::Access => Self::Refresh,
            Self::Refresh => Self::Access,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
