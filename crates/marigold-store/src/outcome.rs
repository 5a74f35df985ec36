//! Result type for best-effort operations.

use std::fmt;

/// What happened to a best-effort write or delete.
///
/// Best-effort operations (logout, presence cleanup, TTL extension) never
/// fail from the caller's point of view. `Outcome` still tells a test or
/// an operator which of three things happened:
///
/// ```text
/// Applied  → the store changed
/// Skipped  → nothing to do (key already absent, member already present)
/// Failed   → the store was asked and errored; the error was logged
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped,
    Failed,
}

impl Outcome {
    /// `Applied` for `true`, `Skipped` for `false`, the usual mapping of
    /// a store's "did anything change" boolean.
    pub fn from_changed(changed: bool) -> Self {
        if changed { Self::Applied } else { Self::Skipped }
    }

    /// Returns `true` if the store changed.
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }

    /// Returns `true` if the store was asked and errored.
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Combines the outcomes of two steps of one operation.
    ///
    /// Any failure wins; otherwise any applied step makes the whole
    /// operation applied.
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Failed, _) | (_, Self::Failed) => Self::Failed,
            (Self::Applied, _) | (_, Self::Applied) => Self::Applied,
            _ => Self::Skipped,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
