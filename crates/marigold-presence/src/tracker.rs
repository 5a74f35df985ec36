//! Presence tracker: who is connected, and which rooms they are in.
//!
//! Three kinds of keys, all in the shared store:
//!
//! ```text
//! ws:user:<user>          → connection id   (string, TTL)
//! ws:room:<room>:users    → { user, ... }   (set, no TTL)
//! ws:user:<user>:rooms    → { room, ... }   (set, no TTL)
//! ```
//!
//! The two membership sets mirror each other. They are written one after
//! the other, not atomically, so a failure between the writes can leave
//! them briefly out of step; [`PresenceTracker::clear_user_rooms`] is the
//! repair path and runs on every retract.

use std::collections::HashSet;
use std::time::Duration;

use futures_util::future::join_all;
use marigold_protocol::{ConnectionId, RoomId, UserId, keys};
use marigold_store::{KeyValueStore, Outcome, SessionStore};

use crate::PresenceConfig;

/// Records live connections and room membership in the session store.
///
/// Every operation is best-effort: reads degrade to empty/offline and
/// writes report an [`Outcome`] instead of failing.
pub struct PresenceTracker<B: KeyValueStore> {
    store: SessionStore<B>,
    config: PresenceConfig,
}

impl<B: KeyValueStore> PresenceTracker<B> {
    /// Creates a tracker over a shared store handle.
    pub fn new(store: SessionStore<B>, config: PresenceConfig) -> Self {
        Self { store, config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    // -- Connections -------------------------------------------------------

    /// Marks `user` as connected via `connection` for the default TTL.
    pub async fn connect(&self, user: &UserId, connection: &ConnectionId) -> Outcome {
        self.connect_for(user, connection, self.config.connection_ttl)
            .await
    }

    /// Marks `user` as connected via `connection` for `ttl`.
    ///
    /// Last writer wins: a second connect replaces the first connection
    /// id. The superseded connection is not told about it.
    pub async fn connect_for(
        &self,
        user: &UserId,
        connection: &ConnectionId,
        ttl: Duration,
    ) -> Outcome {
        let outcome = self
            .store
            .set(&keys::presence(user), connection.as_str(), ttl)
            .await;
        tracing::info!(%user, %connection, %outcome, "user connected");
        outcome
    }

    /// Removes the presence entry for `user`, whatever connection it holds.
    pub async fn disconnect(&self, user: &UserId) -> Outcome {
        let outcome = self.store.delete(&keys::presence(user)).await;
        tracing::info!(%user, %outcome, "user disconnected");
        outcome
    }

    /// Whether `user` has a live presence entry.
    pub async fn is_online(&self, user: &UserId) -> bool {
        self.store.exists(&keys::presence(user)).await
    }

    /// The connection id currently recorded for `user`, if any.
    pub async fn connection_of(&self, user: &UserId) -> Option<ConnectionId> {
        self.store
            .get(&keys::presence(user))
            .await
            .map(ConnectionId::new)
    }

    // -- Membership --------------------------------------------------------

    /// Adds `user` to `room` (and `room` to the user's room set).
    pub async fn join_room(&self, room: RoomId, user: &UserId) -> Outcome {
        let outcome = self
            .store
            .add_member(&keys::room_members(room), user.as_str())
            .await
            .and(
                self.store
                    .add_member(&keys::user_rooms(user), &room.to_string())
                    .await,
            );
        tracing::debug!(%user, %room, %outcome, "joined room");
        outcome
    }

    /// Removes `user` from `room` (and `room` from the user's room set).
    pub async fn leave_room(&self, room: RoomId, user: &UserId) -> Outcome {
        let outcome = self
            .store
            .remove_member(&keys::room_members(room), user.as_str())
            .await
            .and(
                self.store
                    .remove_member(&keys::user_rooms(user), &room.to_string())
                    .await,
            );
        tracing::debug!(%user, %room, %outcome, "left room");
        outcome
    }

    /// Everyone currently listed in `room`.
    ///
    /// Entries that are not valid user ids are skipped.
    pub async fn room_members(&self, room: RoomId) -> HashSet<UserId> {
        self.store
            .members(&keys::room_members(room))
            .await
            .into_iter()
            .filter_map(|raw| match UserId::parse(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::debug!(%room, member = %raw, error = %e, "skipping bad member");
                    None
                }
            })
            .collect()
    }

    /// Every room `user` is listed in.
    ///
    /// Entries that are not valid room numbers are skipped.
    pub async fn user_rooms(&self, user: &UserId) -> HashSet<RoomId> {
        self.store
            .members(&keys::user_rooms(user))
            .await
            .into_iter()
            .filter_map(|raw| match raw.parse::<RoomId>() {
                Ok(room) => Some(room),
                Err(e) => {
                    tracing::debug!(%user, room = %raw, error = %e, "skipping bad room");
                    None
                }
            })
            .collect()
    }

    /// Number of members listed in `room`.
    pub async fn room_count(&self, room: RoomId) -> usize {
        self.store.member_count(&keys::room_members(room)).await
    }

    // -- Online partition --------------------------------------------------

    /// Splits the members of `room` into `(online, offline)`.
    ///
    /// Both halves come from one membership read, so together they are
    /// exactly that read: no member is in both, none is missing. The
    /// online checks run concurrently, one store round-trip per member.
    pub async fn partition(&self, room: RoomId) -> (HashSet<UserId>, HashSet<UserId>) {
        let members: Vec<UserId> = self.room_members(room).await.into_iter().collect();
        let online = join_all(members.iter().map(|user| self.is_online(user))).await;

        let mut on = HashSet::new();
        let mut off = HashSet::new();
        for (user, is_online) in members.into_iter().zip(online) {
            if is_online {
                on.insert(user);
            } else {
                off.insert(user);
            }
        }
        (on, off)
    }

    /// Members of `room` that are currently connected.
    pub async fn online_members(&self, room: RoomId) -> HashSet<UserId> {
        self.partition(room).await.0
    }

    /// Members of `room` that are not currently connected.
    pub async fn offline_members(&self, room: RoomId) -> HashSet<UserId> {
        self.partition(room).await.1
    }

    // -- Cleanup -----------------------------------------------------------

    /// Removes `user` from every room they are listed in, then drops their
    /// room set entirely (which also clears any entries that did not
    /// parse).
    pub async fn clear_user_rooms(&self, user: &UserId) -> Outcome {
        let mut outcome = Outcome::Skipped;
        for room in self.user_rooms(user).await {
            outcome = outcome.and(self.leave_room(room, user).await);
        }
        let outcome = outcome.and(self.store.delete(&keys::user_rooms(user)).await);
        tracing::debug!(%user, %outcome, "cleared user rooms");
        outcome
    }

    /// Drops the member set of `room`.
    ///
    /// Members' own room sets are left alone; they still name the room
    /// until each member leaves or is retracted.
    pub async fn clear_room(&self, room: RoomId) -> Outcome {
        let outcome = self.store.delete(&keys::room_members(room)).await;
        tracing::info!(%room, %outcome, "room cleared");
        outcome
    }

    /// Full teardown for a user: disconnect, then leave every room.
    pub async fn retract(&self, user: &UserId) -> Outcome {
        self.disconnect(user)
            .await
            .and(self.clear_user_rooms(user).await)
    }

    /// Like [`retract`](Self::retract), but only if `connection` is still
    /// the one recorded for `user`.
    ///
    /// A client that reconnects has its new connection recorded before the
    /// old one finishes closing. The old connection calls this on its way
    /// out, finds a different id, and leaves the new one alone. The
    /// check and the delete are two separate store calls.
    pub async fn retract_connection(
        &self,
        user: &UserId,
        connection: &ConnectionId,
    ) -> Outcome {
        match self.connection_of(user).await {
            Some(current) if &current == connection => self.retract(user).await,
            Some(_) => {
                tracing::debug!(%user, %connection, "connection superseded; not retracting");
                Outcome::Skipped
            }
            None => self.clear_user_rooms(user).await,
        }
    }
}
