//! Shared vocabulary for Marigold.
//!
//! This crate defines the values every other layer passes around:
//!
//! - **Identity types** ([`UserId`], [`RoomId`], [`ConnectionId`],
//!   [`TokenKind`]): validated newtypes, so a room number can never be
//!   handed over where a user id is expected.
//! - **Credential claims** ([`Claims`]): what a signed token carries.
//! - **Session records** ([`SessionRecord`]): what the store holds for
//!   every live credential.
//! - **Key layout** ([`keys`]): how those values map onto store keys.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how records become text.
//!
//! # Architecture
//!
//! ```text
//! marigold (gateway) → auth / presence → store → protocol (this crate)
//! ```
//!
//! Nothing here does I/O.

mod claims;
mod codec;
mod error;
pub mod keys;
mod record;
mod types;

pub use claims::{Claims, ISSUER};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use record::{LINK_ACCESS, LINK_REFRESH, SessionRecord};
pub use types::{ConnectionId, RoomId, TokenKind, UserId};
