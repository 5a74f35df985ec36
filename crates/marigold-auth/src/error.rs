//! Error types for the credential layer.

/// Errors the credential service reports.
///
/// Resolution paths return exactly one of the first three variants. The
/// reason behind an `InvalidCredential` (bad signature, missing session,
/// tampered claims, kind mismatch) is logged, never returned: to the
/// credential holder a forged token and a revoked one look the same.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No credential was presented at all.
    #[error("authentication token required")]
    MissingCredential,

    /// The credential is malformed, forged, revoked, or of the wrong kind.
    #[error("invalid token")]
    InvalidCredential,

    /// The credential is genuine but its embedded expiry has passed.
    #[error("token expired")]
    ExpiredCredential,

    /// Issuing a pair failed on our side (signing or session write).
    /// This is an operator fault, not a verdict about any credential.
    #[error("could not issue credentials: {0}")]
    IssueFailed(String),

    /// The service was constructed with unusable settings.
    #[error("credential service misconfigured: {0}")]
    Misconfigured(String),
}

impl AuthError {
    /// HTTP status a gateway should answer with.
    ///
    /// Every credential verdict is 401; only our own faults are 500.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MissingCredential
            | Self::InvalidCredential
            | Self::ExpiredCredential => 401,
            Self::IssueFailed(_) | Self::Misconfigured(_) => 500,
        }
    }

    /// `true` for the three caller-facing credential verdicts.
    pub fn is_rejection(&self) -> bool {
        self.http_status() == 401
    }
}
