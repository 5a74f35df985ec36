//! Credential service configuration.

use std::time::Duration;

use jsonwebtoken::Algorithm;

const HOUR: u64 = 60 * 60;

/// Settings for [`CredentialService`](crate::CredentialService).
///
/// Lifetimes are configured in hours upstream (see the facade's
/// `Settings`), but kept as `Duration` here so tests can use seconds.
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// Shared HMAC signing secret. Must not be empty.
    pub secret: String,

    /// Signing algorithm. Only the HMAC family (HS256/384/512) works with
    /// a shared secret.
    pub algorithm: Algorithm,

    /// How long an access credential is valid.
    ///
    /// Default: 1 hour.
    pub access_ttl: Duration,

    /// How long a refresh credential is valid.
    ///
    /// Default: 14 days.
    pub refresh_ttl: Duration,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: Algorithm::HS256,
            access_ttl: Duration::from_secs(HOUR),
            refresh_ttl: Duration::from_secs(14 * 24 * HOUR),
        }
    }
}

impl CredentialConfig {
    /// Default lifetimes with the given secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }

    /// Sets both lifetimes from whole hours.
    pub fn with_hours(mut self, access_hours: u64, refresh_hours: u64) -> Self {
        self.access_ttl = Duration::from_secs(access_hours * HOUR);
        self.refresh_ttl = Duration::from_secs(refresh_hours * HOUR);
        self
    }
}
