//! The claim set carried inside every credential.

use serde::{Deserialize, Serialize};

use crate::TokenKind;

/// Issuer identity stamped into every credential this service mints.
/// A decoded credential with any other `iss` is treated as forged.
pub const ISSUER: &str = "marigold-chat-server";

/// Claims of an access or refresh credential.
///
/// Field names follow the token wire format (`userId`, `type`), so a
/// credential minted by any other implementation of the chat server
/// decodes into this struct unchanged.
///
/// The subject is kept as a plain `String` rather than a validated
/// `UserId`: a credential with a malformed subject must still decode so
/// that the resolver can reject it as an invalid credential instead of
/// as a decode failure with a different log trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject user id.
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Expiry, unix seconds.
    pub exp: i64,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Issuer identity; [`ISSUER`] for anything we minted.
    pub iss: String,
    /// Which half of the pair this credential is.
    #[serde(rename = "type")]
    pub kind: TokenKind,
}

impl Claims {
    /// Builds claims issued at `iat` and valid for `lifetime_secs`.
    pub fn new(
        user_id: impl Into<String>,
        kind: TokenKind,
        iat: i64,
        lifetime_secs: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            exp: iat + lifetime_secs,
            iat,
            iss: ISSUER.to_string(),
            kind,
        }
    }

    /// Seconds of validity left at `now`, floored at zero.
    pub fn remaining(&self, now: i64) -> u64 {
        u64::try_from(self.exp - now).unwrap_or(0)
    }

    /// `true` once `now` is past the embedded expiry.
    pub fn is_expired(&self, now: i64) -> bool {
        self.exp < now
    }
}
