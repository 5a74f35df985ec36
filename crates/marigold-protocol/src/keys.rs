//! Store key layout.
//!
//! Every key Marigold reads or writes is built here, so the layout lives
//! in one place:
//!
//! ```text
//! session:<access|refresh>:<credential>   → JSON SessionRecord   (TTL)
//! ws:user:<user id>                       → connection id        (TTL)
//! ws:user:<user id>:rooms                 → set of room ids
//! ws:room:<room id>:users                 → set of user ids
//! ```

use crate::{RoomId, TokenKind, UserId};

/// Glob pattern matching every session record of either kind.
pub const SESSION_PATTERN: &str = "session:*:*";

/// Key of the session record backing `credential`.
pub fn session(kind: TokenKind, credential: &str) -> String {
    format!("session:{}:{credential}", kind.as_str())
}

/// Key of a user's presence entry.
pub fn presence(user: &UserId) -> String {
    format!("ws:user:{user}")
}

/// Key of the set of users currently in a room.
pub fn room_members(room: RoomId) -> String {
    format!("ws:room:{room}:users")
}

/// Key of the set of rooms a user currently has joined.
pub fn user_rooms(user: &UserId) -> String {
    format!("ws:user:{user}:rooms")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let alice = UserId::parse("alice").unwrap();
        let room = RoomId::new(7).unwrap();
        assert_eq!(session(TokenKind::Access, "abc"), "session:access:abc");
        assert_eq!(session(TokenKind::Refresh, "xyz"), "session:refresh:xyz");
        assert_eq!(presence(&alice), "ws:user:alice");
        assert_eq!(room_members(room), "ws:room:7:users");
        assert_eq!(user_rooms(&alice), "ws:user:alice:rooms");
    }
}
