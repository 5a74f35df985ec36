//! Authentication hook for resolving a connecting client's identity.
//!
//! The gateway doesn't care *how* a token becomes a [`UserId`]. It holds
//! something that implements [`Authenticator`] and calls it once per
//! connection attempt. [`CredentialService`](crate::CredentialService)
//! is the production implementation; tests swap in a stub that accepts
//! a fixed token.

use marigold_protocol::UserId;

use crate::AuthError;

/// Resolves a presented access token to the user it was issued to.
///
/// # Trait bounds
///
/// - `Send + Sync` → shared across connection tasks, possibly on
///   different worker threads at once.
/// - `'static` → lives as long as the gateway; borrows nothing temporary.
///
/// # Example
///
/// ```rust
/// use marigold_auth::{AuthError, Authenticator};
/// use marigold_protocol::UserId;
///
/// /// Accepts exactly one hard-coded token. Only for tests.
/// struct FixedToken;
///
/// impl Authenticator for FixedToken {
///     async fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
///         if token == "letmein" {
///             UserId::parse("tester").map_err(|_| AuthError::InvalidCredential)
///         } else {
///             Err(AuthError::InvalidCredential)
///         }
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Resolves `token` to a user.
    ///
    /// # Returns
    /// - `Ok(UserId)`: the token is live and belongs to this user
    /// - `Err(AuthError::InvalidCredential)`: forged, revoked, or wrong kind
    /// - `Err(AuthError::ExpiredCredential)`: genuine but past its expiry
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<UserId, AuthError>> + Send;
}
