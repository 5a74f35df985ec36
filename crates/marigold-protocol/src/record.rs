//! Session records: the server-side half of a credential.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{TokenKind, UserId};

/// Extension key under which an access record names its refresh token.
pub const LINK_REFRESH: &str = "refresh_token";
/// Extension key under which a refresh record names its access token.
pub const LINK_ACCESS: &str = "access_token";

/// What the store holds for every live credential.
///
/// Serialized as a flat JSON object: `{"user_id", "token_type", ...}`
/// where the extension fields sit next to the fixed ones rather than in
/// a nested object. `#[serde(flatten)]` does that flattening for us.
/// Extension values are arbitrary JSON, so records written by other
/// services with numeric or nested fields still decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub token_type: TokenKind,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SessionRecord {
    /// A record linked to the other half of its pair.
    ///
    /// An access record stores `refresh_token = <linked>`, a refresh
    /// record stores `access_token = <linked>`.
    pub fn linked(user_id: UserId, kind: TokenKind, linked: &str) -> Self {
        let mut extra = BTreeMap::new();
        extra.insert(link_field(kind).to_string(), Value::from(linked));
        Self {
            user_id,
            token_type: kind,
            extra,
        }
    }

    /// The credential value of the other half of the pair, if recorded.
    pub fn linked_token(&self) -> Option<&str> {
        self.extra.get(link_field(self.token_type)).and_then(Value::as_str)
    }
}

fn link_field(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Access => LINK_REFRESH,
        TokenKind::Refresh => LINK_ACCESS,
    }
}
