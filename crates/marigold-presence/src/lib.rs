//! Presence and room membership for Marigold.
//!
//! The gateway calls [`PresenceTracker::connect`] once a connection is
//! authenticated, and [`PresenceTracker::retract_connection`] when it
//! closes. Chat features ask the tracker who is in a room and who of them
//! is online right now.
//!
//! All state lives in the shared session store (see `marigold-store`),
//! so several gateway processes pointed at the same Redis see one view.

mod config;
mod tracker;

pub use config::PresenceConfig;
pub use tracker::PresenceTracker;
