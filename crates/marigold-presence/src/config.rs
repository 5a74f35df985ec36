//! Presence configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for [`PresenceTracker`](crate::PresenceTracker).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// How long a presence entry lives without being refreshed.
    ///
    /// A connection that vanishes without a clean disconnect stops
    /// counting as online once this elapses. Default: 1 hour.
    pub connection_ttl: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            connection_ttl: Duration::from_secs(3600),
        }
    }
}
