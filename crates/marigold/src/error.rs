//! Unified error type for the Marigold facade.

use marigold_auth::AuthError;
use marigold_protocol::ProtocolError;
use marigold_store::StoreError;
use tokio_tungstenite::tungstenite;

use crate::ConfigError;

/// Top-level error that wraps every crate-specific error.
///
/// Callers of the `marigold` crate deal with this one type. The `#[from]`
/// attributes generate the `From` impls, so `?` converts sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum MarigoldError {
    /// Identifier or record encoding problem.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The store could not be reached at startup.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A credential was rejected, or credentials could not be issued.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Settings were missing or unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The WebSocket upgrade or a frame on it failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

impl MarigoldError {
    /// The credential verdict, when this error is one.
    pub fn as_auth(&self) -> Option<&AuthError> {
        match self {
            Self::Auth(e) => Some(e),
            _ => None,
        }
    }
}
