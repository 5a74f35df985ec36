//! The credential lifecycle: issue, resolve, refresh, revoke.
//!
//! A credential is only honoured while **both** hold:
//!
//! 1. its signature verifies and its claims are consistent, and
//! 2. a session record for it still exists in the store.
//!
//! The second condition is what makes logout work for stateless tokens.
//! Deleting the record kills the credential immediately even though the
//! signed token itself stays valid until its embedded expiry.
//!
//! # Resolution order
//!
//! ```text
//! decode (signature) ─✗─→ Invalid
//!     ↓
//! session record?    ─✗─→ Invalid
//!     ↓
//! tamper checks      ─✗─→ Invalid   (issuer, iat ≤ exp, iat ≤ now, kind, subject)
//!     ↓
//! exp < now?         ─✓─→ Expired
//!     ↓
//! Ok(UserId)
//! ```
//!
//! The record lookup comes before the expiry check, so a credential whose
//! record has already lapsed reports `Invalid`, not `Expired`. Records
//! are written with a TTL equal to the credential's remaining lifetime,
//! which means `Expired` is only observable in the short window where a
//! record outlives its token.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use marigold_protocol::{
    Claims, Codec, ISSUER, JsonCodec, SessionRecord, TokenKind, UserId, keys,
};
use marigold_store::{KeyValueStore, Outcome, SessionStore};

use crate::{AuthError, Authenticator, CredentialConfig, Signer};

/// Longest credential prefix ever written to logs.
const LOGGED_TOKEN_LEN: usize = 20;

fn fingerprint(token: &str) -> &str {
    token.get(..LOGGED_TOKEN_LEN).unwrap_or(token)
}

/// Current wall-clock time in whole seconds since the Unix epoch.
fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Source of the current Unix time in whole seconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn secs(lifetime: Duration) -> i64 {
    i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX / 2)
}

/// An access credential and the refresh credential bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// What [`CredentialService::logout`] did to each half of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revocation {
    pub access: Outcome,
    pub refresh: Outcome,
}

impl Revocation {
    /// Both records are gone (deleted now, or already absent).
    pub fn is_complete(&self) -> bool {
        !self.access.is_failed() && !self.refresh.is_failed()
    }
}

/// Issues and verifies credentials against a session store.
///
/// # Type parameter
///
/// `B` is the store backend: `RedisStore` in production, `MemoryStore`
/// in tests. The service holds a cloned [`SessionStore`] handle, so the
/// presence tracker can share the same backend.
pub struct CredentialService<B: KeyValueStore> {
    store: SessionStore<B>,
    signer: Signer,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Clock,
}

impl<B: KeyValueStore> CredentialService<B> {
    /// Builds a service from settings.
    ///
    /// # Errors
    /// [`AuthError::Misconfigured`] for an empty secret, a non-HMAC
    /// algorithm, or a zero lifetime.
    pub fn new(
        store: SessionStore<B>,
        config: &CredentialConfig,
    ) -> Result<Self, AuthError> {
        if config.access_ttl.as_secs() == 0 || config.refresh_ttl.as_secs() == 0 {
            return Err(AuthError::Misconfigured(
                "credential lifetimes must be at least one second".into(),
            ));
        }
        let signer = Signer::new(config.secret.as_bytes(), config.algorithm)?;

        Ok(Self {
            store,
            signer,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            clock: Arc::new(unix_now),
        })
    }

    /// Replaces the wall clock used for `iat`, `exp` and expiry checks.
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// The signer in use. Exposed so callers holding the same secret can
    /// inspect claims without a store round-trip.
    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// The session store handle.
    pub fn store(&self) -> &SessionStore<B> {
        &self.store
    }

    // -- Issue -------------------------------------------------------------

    /// Mints a fresh access/refresh pair for `user` and records both.
    ///
    /// Each record points at its partner token, and expires exactly when
    /// its own credential does.
    ///
    /// # Errors
    /// [`AuthError::IssueFailed`] if signing fails or either record
    /// could not be written. Nothing is rolled back: a record that did
    /// get written simply expires with its token.
    pub async fn issue(&self, user: &UserId) -> Result<TokenPair, AuthError> {
        let now = self.now();
        let access_claims =
            Claims::new(user.as_str(), TokenKind::Access, now, secs(self.access_ttl));
        let refresh_claims =
            Claims::new(user.as_str(), TokenKind::Refresh, now, secs(self.refresh_ttl));

        let access = self.sign(&access_claims)?;
        let refresh = self.sign(&refresh_claims)?;

        let written = self
            .record(&access, &access_claims, user, &refresh, now)
            .await
            .and(self.record(&refresh, &refresh_claims, user, &access, now).await);

        if !written.is_applied() {
            tracing::error!(%user, outcome = %written, "session records not written");
            return Err(AuthError::IssueFailed("session store unavailable".into()));
        }

        tracing::info!(%user, "credentials issued");
        Ok(TokenPair { access, refresh })
    }

    // -- Resolve -----------------------------------------------------------

    /// Resolves `token`, expected to be of `kind`, to its user.
    ///
    /// # Errors
    /// - [`AuthError::InvalidCredential`]: undecodable, no live session,
    ///   or tampered claims (including a kind mismatch)
    /// - [`AuthError::ExpiredCredential`]: everything checks out except
    ///   the embedded expiry has passed
    pub async fn resolve(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<UserId, AuthError> {
        let prefix = fingerprint(token);

        let claims = match self.signer.decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(token = prefix, error = %e, "credential undecodable");
                return Err(AuthError::InvalidCredential);
            }
        };

        let Some(record) = self.store.get_record(&keys::session(kind, token)).await
        else {
            tracing::info!(token = prefix, %kind, "no session for credential");
            return Err(AuthError::InvalidCredential);
        };

        let now = self.now();
        let user = match check_claims(&claims, &record, kind, now) {
            Ok(user) => user,
            Err(reason) => {
                tracing::warn!(token = prefix, %kind, reason, "credential tampered");
                return Err(AuthError::InvalidCredential);
            }
        };

        if claims.is_expired(now) {
            tracing::info!(token = prefix, %user, "credential expired");
            return Err(AuthError::ExpiredCredential);
        }

        Ok(user)
    }

    // -- Refresh -----------------------------------------------------------

    /// Trades a live refresh credential for a new access credential.
    ///
    /// The refresh credential is returned unchanged: it is not rotated,
    /// and the access credential it was issued alongside stays valid
    /// until it expires or is logged out.
    ///
    /// # Errors
    /// Always [`AuthError::InvalidCredential`], whatever the underlying
    /// reason (expired, revoked, wrong kind, store write failed).
    pub async fn refresh(&self, refresh: &str) -> Result<TokenPair, AuthError> {
        let user = match self.resolve(refresh, TokenKind::Refresh).await {
            Ok(user) => user,
            Err(e) => {
                tracing::info!(token = fingerprint(refresh), error = %e, "refresh rejected");
                return Err(AuthError::InvalidCredential);
            }
        };

        let now = self.now();
        let claims =
            Claims::new(user.as_str(), TokenKind::Access, now, secs(self.access_ttl));
        let access = self
            .sign(&claims)
            .map_err(|_| AuthError::InvalidCredential)?;

        let written = self.record(&access, &claims, &user, refresh, now).await;
        if !written.is_applied() {
            tracing::error!(%user, outcome = %written, "refreshed session not written");
            return Err(AuthError::InvalidCredential);
        }

        tracing::info!(%user, "access credential refreshed");
        Ok(TokenPair {
            access,
            refresh: refresh.to_string(),
        })
    }

    // -- Revoke ------------------------------------------------------------

    /// Deletes the session records for both halves of a pair.
    ///
    /// Never fails. The tokens need not be valid, related, or even
    /// decodable; logging out twice is harmless. Store failures are
    /// logged and reported in the returned [`Revocation`].
    pub async fn logout(&self, access: &str, refresh: &str) -> Revocation {
        let revocation = Revocation {
            access: self.store.delete(&keys::session(TokenKind::Access, access)).await,
            refresh: self
                .store
                .delete(&keys::session(TokenKind::Refresh, refresh))
                .await,
        };
        tracing::info!(
            access = %revocation.access,
            refresh = %revocation.refresh,
            "logout"
        );
        revocation
    }

    /// Re-arms the TTL on an existing session record.
    ///
    /// The new TTL is clamped to the credential's remaining lifetime, so a
    /// record never outlives the token it belongs to.
    ///
    /// # Returns
    /// - `Applied`: the record exists and its TTL was reset
    /// - `Skipped`: undecodable token, wrong kind, already expired, or no
    ///   record to extend
    /// - `Failed`: the store write failed
    pub async fn extend_session(
        &self,
        token: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> Outcome {
        let Ok(claims) = self.signer.decode(token) else {
            return Outcome::Skipped;
        };
        if claims.kind != kind {
            return Outcome::Skipped;
        }
        let remaining = claims.remaining(self.now());
        if remaining == 0 || ttl.is_zero() {
            return Outcome::Skipped;
        }

        let ttl = ttl.min(Duration::from_secs(remaining));
        self.store.expire(&keys::session(kind, token), ttl).await
    }

    /// Session keys (both kinds) currently recorded for `user`.
    ///
    /// Scans every session in the store: linear in the total number of
    /// sessions. Meant for administrative use, not per-request paths.
    pub async fn user_sessions(&self, user: &UserId) -> Vec<String> {
        let codec = JsonCodec;
        self.store
            .find_by_predicate(keys::SESSION_PATTERN, |value| {
                codec
                    .decode::<SessionRecord>(value)
                    .is_ok_and(|record| &record.user_id == user)
            })
            .await
    }

    /// Deletes every session recorded for `user` and returns how many
    /// were removed. Same cost as [`user_sessions`](Self::user_sessions).
    pub async fn revoke_user(&self, user: &UserId) -> usize {
        let mut removed = 0;
        for key in self.user_sessions(user).await {
            if self.store.delete(&key).await.is_applied() {
                removed += 1;
            }
        }
        tracing::info!(%user, removed, "user sessions revoked");
        removed
    }

    // -- Internal ----------------------------------------------------------

    fn now(&self) -> i64 {
        (self.clock)()
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        self.signer.encode(claims).map_err(|e| {
            tracing::error!(error = %e, "signing failed");
            AuthError::IssueFailed(e.to_string())
        })
    }

    /// Writes the session record for `token`, linked to its partner.
    async fn record(
        &self,
        token: &str,
        claims: &Claims,
        user: &UserId,
        partner: &str,
        now: i64,
    ) -> Outcome {
        let record = SessionRecord::linked(user.clone(), claims.kind, partner);
        let ttl = Duration::from_secs(claims.remaining(now));
        self.store
            .put_record(&keys::session(claims.kind, token), &record, ttl)
            .await
    }
}

impl<B: KeyValueStore> Authenticator for CredentialService<B> {
    async fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
        self.resolve(token, TokenKind::Access).await
    }
}

/// Consistency checks on decoded claims. Returns the subject on success,
/// or a short reason for the log on failure.
fn check_claims(
    claims: &Claims,
    record: &SessionRecord,
    kind: TokenKind,
    now: i64,
) -> Result<UserId, &'static str> {
    if claims.iss != ISSUER {
        return Err("issuer mismatch");
    }
    if claims.iat > claims.exp {
        return Err("issued after expiry");
    }
    if claims.iat > now {
        return Err("issued in the future");
    }
    if claims.kind != kind {
        return Err("kind mismatch");
    }
    let user = UserId::parse(&claims.user_id).map_err(|_| "malformed subject")?;
    if record.user_id != user || record.token_type != kind {
        return Err("session belongs to another credential");
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    fn record(user: &str, kind: TokenKind) -> SessionRecord {
        SessionRecord::linked(uid(user), kind, "partner")
    }

    // =====================================================================
    // check_claims
    // =====================================================================

    #[test]
    fn test_check_claims_accepts_consistent() {
        let claims = Claims::new("alice", TokenKind::Access, 100, 60);
        let result = check_claims(&claims, &record("alice", TokenKind::Access), TokenKind::Access, 120);
        assert_eq!(result, Ok(uid("alice")));
    }

    #[test]
    fn test_check_claims_passes_expired_through() {
        // Expiry is judged after the tamper checks, not inside them.
        let claims = Claims::new("alice", TokenKind::Access, 100, 10);
        let result = check_claims(&claims, &record("alice", TokenKind::Access), TokenKind::Access, 500);
        assert!(result.is_ok());
    }

    #[test]
    fn test_check_claims_rejects_foreign_issuer() {
        let mut claims = Claims::new("alice", TokenKind::Access, 100, 60);
        claims.iss = "someone-else".into();
        let result = check_claims(&claims, &record("alice", TokenKind::Access), TokenKind::Access, 120);
        assert_eq!(result, Err("issuer mismatch"));
    }

    #[test]
    fn test_check_claims_rejects_iat_after_exp() {
        let mut claims = Claims::new("alice", TokenKind::Access, 100, 60);
        claims.iat = claims.exp + 1;
        let result = check_claims(&claims, &record("alice", TokenKind::Access), TokenKind::Access, 1_000);
        assert_eq!(result, Err("issued after expiry"));
    }

    #[test]
    fn test_check_claims_rejects_future_iat() {
        let claims = Claims::new("alice", TokenKind::Access, 200, 60);
        let result = check_claims(&claims, &record("alice", TokenKind::Access), TokenKind::Access, 100);
        assert_eq!(result, Err("issued in the future"));
    }

    #[test]
    fn test_check_claims_rejects_kind_mismatch() {
        let claims = Claims::new("alice", TokenKind::Refresh, 100, 60);
        let result = check_claims(&claims, &record("alice", TokenKind::Access), TokenKind::Access, 120);
        assert_eq!(result, Err("kind mismatch"));
    }

    #[test]
    fn test_check_claims_rejects_record_for_other_user() {
        let claims = Claims::new("alice", TokenKind::Access, 100, 60);
        let result = check_claims(&claims, &record("mallory", TokenKind::Access), TokenKind::Access, 120);
        assert_eq!(result, Err("session belongs to another credential"));
    }

    #[test]
    fn test_check_claims_rejects_malformed_subject() {
        let claims = Claims::new("not valid!", TokenKind::Access, 100, 60);
        let result = check_claims(&claims, &record("alice", TokenKind::Access), TokenKind::Access, 120);
        assert_eq!(result, Err("malformed subject"));
    }

    // =====================================================================
    // Helpers
    // =====================================================================

    #[test]
    fn test_fingerprint_truncates() {
        let token = "a".repeat(100);
        assert_eq!(fingerprint(&token).len(), LOGGED_TOKEN_LEN);
        assert_eq!(fingerprint("short"), "short");
    }

    #[test]
    fn test_revocation_complete_unless_failed() {
        let ok = Revocation { access: Outcome::Applied, refresh: Outcome::Skipped };
        let bad = Revocation { access: Outcome::Applied, refresh: Outcome::Failed };
        assert!(ok.is_complete());
        assert!(!bad.is_complete());
    }
}
