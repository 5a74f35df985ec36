//! End-to-end tests for the credential lifecycle over an in-memory store.
//!
//! Expired and tampered credentials are produced by signing claims
//! directly with the service's own signer and planting a matching
//! session record, which is exactly what a forger holding the secret, or
//! a record outliving its token, would leave behind.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use marigold_auth::{
    Algorithm, AuthError, Authenticator, CredentialConfig, CredentialService,
};
use marigold_protocol::{Claims, SessionRecord, TokenKind, UserId, keys};
use marigold_store::{MemoryStore, Outcome, SessionStore};

// =========================================================================
// Helpers
// =========================================================================

const HOUR: Duration = Duration::from_secs(3600);

fn service() -> CredentialService<MemoryStore> {
    let store = SessionStore::new(Arc::new(MemoryStore::new()));
    CredentialService::new(store, &CredentialConfig::new("test-secret")).unwrap()
}

/// A service reading time from the returned cell, so tests can step it.
fn clocked_service() -> (CredentialService<MemoryStore>, Arc<AtomicI64>) {
    let clock = Arc::new(AtomicI64::new(now()));
    let reading = Arc::clone(&clock);
    let service = service().with_clock(move || reading.load(Ordering::SeqCst));
    (service, clock)
}

fn uid(raw: &str) -> UserId {
    UserId::parse(raw).unwrap()
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Signs `claims` with the service's key and stores a record for the
/// result that lives for `record_ttl`. Returns the token.
async fn plant(
    service: &CredentialService<MemoryStore>,
    claims: &Claims,
    record_ttl: Duration,
) -> String {
    let token = service.signer().encode(claims).unwrap();
    let record = SessionRecord::linked(uid(&claims.user_id), claims.kind, "partner");
    let outcome = service
        .store()
        .put_record(&keys::session(claims.kind, &token), &record, record_ttl)
        .await;
    assert_eq!(outcome, Outcome::Applied);
    token
}

// =========================================================================
// Construction
// =========================================================================

#[test]
fn test_new_rejects_empty_secret() {
    let store = SessionStore::new(Arc::new(MemoryStore::new()));
    let result = CredentialService::new(store, &CredentialConfig::new(""));
    assert!(matches!(result, Err(AuthError::Misconfigured(_))));
}

#[test]
fn test_new_rejects_zero_lifetime() {
    let store = SessionStore::new(Arc::new(MemoryStore::new()));
    let config = CredentialConfig::new("s").with_hours(0, 24);
    assert!(matches!(
        CredentialService::new(store, &config),
        Err(AuthError::Misconfigured(_))
    ));
}

#[test]
fn test_new_rejects_asymmetric_algorithm() {
    let store = SessionStore::new(Arc::new(MemoryStore::new()));
    let mut config = CredentialConfig::new("s");
    config.algorithm = Algorithm::ES256;
    assert!(matches!(
        CredentialService::new(store, &config),
        Err(AuthError::Misconfigured(_))
    ));
}

// =========================================================================
// Issue and resolve
// =========================================================================

#[tokio::test]
async fn test_issue_then_resolve_both_kinds() {
    let service = service();
    let alice = uid("alice");
    let pair = service.issue(&alice).await.unwrap();

    assert_ne!(pair.access, pair.refresh);
    assert_eq!(service.resolve(&pair.access, TokenKind::Access).await, Ok(alice.clone()));
    assert_eq!(service.resolve(&pair.refresh, TokenKind::Refresh).await, Ok(alice));
}

#[tokio::test]
async fn test_issue_writes_linked_records_with_token_ttl() {
    let service = service();
    let pair = service.issue(&uid("alice")).await.unwrap();

    let access_key = keys::session(TokenKind::Access, &pair.access);
    let record = service.store().get_record(&access_key).await.unwrap();
    assert_eq!(record.user_id, uid("alice"));
    assert_eq!(record.token_type, TokenKind::Access);
    assert_eq!(record.linked_token(), Some(pair.refresh.as_str()));

    let refresh_key = keys::session(TokenKind::Refresh, &pair.refresh);
    let record = service.store().get_record(&refresh_key).await.unwrap();
    assert_eq!(record.linked_token(), Some(pair.access.as_str()));

    let ttl = service.store().ttl(&access_key).await.unwrap();
    assert!(ttl <= HOUR && ttl > HOUR - Duration::from_secs(5));
}

#[tokio::test]
async fn test_issued_claims_carry_issuer_and_kind() {
    let service = service();
    let pair = service.issue(&uid("alice")).await.unwrap();

    let claims = service.signer().decode(&pair.access).unwrap();
    assert_eq!(claims.iss, "marigold-chat-server");
    assert_eq!(claims.kind, TokenKind::Access);
    assert_eq!(claims.user_id, "alice");
    assert_eq!(claims.exp - claims.iat, 3600);
}

#[tokio::test]
async fn test_resolve_rejects_wrong_kind() {
    let service = service();
    let pair = service.issue(&uid("alice")).await.unwrap();

    assert_eq!(
        service.resolve(&pair.access, TokenKind::Refresh).await,
        Err(AuthError::InvalidCredential)
    );
    assert_eq!(
        service.resolve(&pair.refresh, TokenKind::Access).await,
        Err(AuthError::InvalidCredential)
    );
}

#[tokio::test]
async fn test_resolve_rejects_garbage() {
    let service = service();
    for token in ["", "garbage", "a.b.c"] {
        assert_eq!(
            service.resolve(token, TokenKind::Access).await,
            Err(AuthError::InvalidCredential)
        );
    }
}

#[tokio::test]
async fn test_resolve_rejects_token_from_other_secret() {
    let service = service();
    let other = CredentialService::new(
        SessionStore::new(Arc::new(MemoryStore::new())),
        &CredentialConfig::new("another-secret"),
    )
    .unwrap();
    let pair = other.issue(&uid("alice")).await.unwrap();

    assert_eq!(
        service.resolve(&pair.access, TokenKind::Access).await,
        Err(AuthError::InvalidCredential)
    );
}

#[tokio::test]
async fn test_resolve_rejects_valid_signature_without_record() {
    let service = service();
    let claims = Claims::new("alice", TokenKind::Access, now(), 3600);
    let token = service.signer().encode(&claims).unwrap();

    assert_eq!(
        service.resolve(&token, TokenKind::Access).await,
        Err(AuthError::InvalidCredential)
    );
}

#[tokio::test]
async fn test_authenticator_resolves_access_only() {
    let service = service();
    let pair = service.issue(&uid("alice")).await.unwrap();

    assert_eq!(service.authenticate(&pair.access).await, Ok(uid("alice")));
    assert_eq!(
        service.authenticate(&pair.refresh).await,
        Err(AuthError::InvalidCredential)
    );
}

// =========================================================================
// Expiry and tampering
// =========================================================================

#[tokio::test]
async fn test_resolve_reports_expired_while_record_outlives_token() {
    let service = service();
    let claims = Claims::new("alice", TokenKind::Access, now() - 120, 60);
    let token = plant(&service, &claims, HOUR).await;

    assert_eq!(
        service.resolve(&token, TokenKind::Access).await,
        Err(AuthError::ExpiredCredential)
    );
}

#[tokio::test(start_paused = true)]
async fn test_resolve_reports_invalid_once_record_lapses() {
    let service = service();
    let claims = Claims::new("alice", TokenKind::Access, now() - 120, 60);
    let token = plant(&service, &claims, Duration::from_secs(10)).await;

    tokio::time::advance(Duration::from_secs(11)).await;

    assert_eq!(
        service.resolve(&token, TokenKind::Access).await,
        Err(AuthError::InvalidCredential)
    );
}

#[tokio::test]
async fn test_resolve_rejects_iat_after_exp_as_invalid_not_expired() {
    let service = service();
    let mut claims = Claims::new("alice", TokenKind::Access, now() - 120, 60);
    claims.iat = claims.exp + 1;
    let token = plant(&service, &claims, HOUR).await;

    assert_eq!(
        service.resolve(&token, TokenKind::Access).await,
        Err(AuthError::InvalidCredential)
    );
}

#[tokio::test]
async fn test_resolve_rejects_future_iat() {
    let service = service();
    let claims = Claims::new("alice", TokenKind::Access, now() + 600, 3600);
    let token = plant(&service, &claims, HOUR).await;

    assert_eq!(
        service.resolve(&token, TokenKind::Access).await,
        Err(AuthError::InvalidCredential)
    );
}

#[tokio::test]
async fn test_resolve_rejects_foreign_issuer() {
    let service = service();
    let mut claims = Claims::new("alice", TokenKind::Access, now(), 3600);
    claims.iss = "someone-else".into();
    let token = plant(&service, &claims, HOUR).await;

    assert_eq!(
        service.resolve(&token, TokenKind::Access).await,
        Err(AuthError::InvalidCredential)
    );
}

#[tokio::test]
async fn test_resolve_rejects_kind_claim_not_matching_record_slot() {
    // Refresh claims planted under an access-session key.
    let service = service();
    let claims = Claims::new("alice", TokenKind::Refresh, now(), 3600);
    let token = service.signer().encode(&claims).unwrap();
    let record = SessionRecord::linked(uid("alice"), TokenKind::Access, "x");
    service
        .store()
        .put_record(&keys::session(TokenKind::Access, &token), &record, HOUR)
        .await;

    assert_eq!(
        service.resolve(&token, TokenKind::Access).await,
        Err(AuthError::InvalidCredential)
    );
}

// =========================================================================
// Refresh
// =========================================================================

#[tokio::test]
async fn test_refresh_returns_same_refresh_and_live_access() {
    let (service, clock) = clocked_service();
    let pair = service.issue(&uid("alice")).await.unwrap();

    clock.fetch_add(5, Ordering::SeqCst);
    let refreshed = service.refresh(&pair.refresh).await.unwrap();

    assert_ne!(refreshed.access, pair.access);
    assert_eq!(refreshed.refresh, pair.refresh);
    assert_eq!(
        service.resolve(&refreshed.access, TokenKind::Access).await,
        Ok(uid("alice"))
    );
    assert_eq!(
        service.resolve(&pair.access, TokenKind::Access).await,
        Ok(uid("alice"))
    );

    let claims = service.signer().decode(&refreshed.access).unwrap();
    assert_eq!(claims.iat, clock.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_refresh_links_new_access_to_refresh() {
    let (service, clock) = clocked_service();
    let pair = service.issue(&uid("alice")).await.unwrap();
    clock.fetch_add(5, Ordering::SeqCst);
    let refreshed = service.refresh(&pair.refresh).await.unwrap();

    let key = keys::session(TokenKind::Access, &refreshed.access);
    let record = service.store().get_record(&key).await.unwrap();
    assert_eq!(record.linked_token(), Some(pair.refresh.as_str()));
}

#[tokio::test]
async fn test_resolve_expires_on_stepped_clock() {
    let (service, clock) = clocked_service();
    let pair = service.issue(&uid("alice")).await.unwrap();

    clock.fetch_add(3601, Ordering::SeqCst);
    assert_eq!(
        service.resolve(&pair.access, TokenKind::Access).await,
        Err(AuthError::ExpiredCredential)
    );
    assert_eq!(
        service.resolve(&pair.refresh, TokenKind::Refresh).await,
        Ok(uid("alice"))
    );
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let service = service();
    let pair = service.issue(&uid("alice")).await.unwrap();

    assert_eq!(
        service.refresh(&pair.access).await,
        Err(AuthError::InvalidCredential)
    );
}

#[tokio::test]
async fn test_refresh_collapses_expired_to_invalid() {
    let service = service();
    let claims = Claims::new("alice", TokenKind::Refresh, now() - 120, 60);
    let token = plant(&service, &claims, HOUR).await;

    assert_eq!(service.refresh(&token).await, Err(AuthError::InvalidCredential));
}

// =========================================================================
// Logout and revocation
// =========================================================================

#[tokio::test]
async fn test_logout_revokes_both_and_is_idempotent() {
    let service = service();
    let pair = service.issue(&uid("alice")).await.unwrap();

    let first = service.logout(&pair.access, &pair.refresh).await;
    assert_eq!(first.access, Outcome::Applied);
    assert_eq!(first.refresh, Outcome::Applied);

    assert_eq!(
        service.resolve(&pair.access, TokenKind::Access).await,
        Err(AuthError::InvalidCredential)
    );
    assert_eq!(
        service.refresh(&pair.refresh).await,
        Err(AuthError::InvalidCredential)
    );

    let second = service.logout(&pair.access, &pair.refresh).await;
    assert_eq!(second.access, Outcome::Skipped);
    assert_eq!(second.refresh, Outcome::Skipped);
    assert!(second.is_complete());
}

#[tokio::test]
async fn test_logout_accepts_garbage() {
    let service = service();
    let revocation = service.logout("junk", "").await;
    assert!(revocation.is_complete());
}

#[tokio::test]
async fn test_user_sessions_and_revoke_user() {
    let service = service();
    let alice = uid("alice");
    let bob = uid("bob");
    let pair = service.issue(&alice).await.unwrap();
    let bobs = service.issue(&bob).await.unwrap();

    let mut sessions = service.user_sessions(&alice).await;
    sessions.sort();
    let mut expected = vec![
        keys::session(TokenKind::Access, &pair.access),
        keys::session(TokenKind::Refresh, &pair.refresh),
    ];
    expected.sort();
    assert_eq!(sessions, expected);

    assert_eq!(service.revoke_user(&alice).await, 2);
    assert!(service.user_sessions(&alice).await.is_empty());
    assert_eq!(
        service.resolve(&pair.access, TokenKind::Access).await,
        Err(AuthError::InvalidCredential)
    );
    assert_eq!(
        service.resolve(&bobs.access, TokenKind::Access).await,
        Ok(bob)
    );
}

// =========================================================================
// Extending sessions
// =========================================================================

#[tokio::test]
async fn test_extend_session_clamps_to_token_lifetime() {
    let service = service();
    let pair = service.issue(&uid("alice")).await.unwrap();
    let key = keys::session(TokenKind::Access, &pair.access);

    let outcome = service
        .extend_session(&pair.access, TokenKind::Access, 10 * HOUR)
        .await;
    assert_eq!(outcome, Outcome::Applied);
    assert!(service.store().ttl(&key).await.unwrap() <= HOUR);

    let outcome = service
        .extend_session(&pair.access, TokenKind::Access, Duration::from_secs(30))
        .await;
    assert_eq!(outcome, Outcome::Applied);
    assert!(service.store().ttl(&key).await.unwrap() <= Duration::from_secs(30));
}

#[tokio::test]
async fn test_extend_session_skips_unusable_tokens() {
    let service = service();
    let pair = service.issue(&uid("alice")).await.unwrap();

    assert_eq!(
        service.extend_session("garbage", TokenKind::Access, HOUR).await,
        Outcome::Skipped
    );
    assert_eq!(
        service.extend_session(&pair.access, TokenKind::Refresh, HOUR).await,
        Outcome::Skipped
    );

    let expired = Claims::new("alice", TokenKind::Access, now() - 120, 60);
    let token = plant(&service, &expired, HOUR).await;
    assert_eq!(
        service.extend_session(&token, TokenKind::Access, HOUR).await,
        Outcome::Skipped
    );

    service.logout(&pair.access, &pair.refresh).await;
    assert_eq!(
        service.extend_session(&pair.access, TokenKind::Access, HOUR).await,
        Outcome::Skipped
    );
}

// =========================================================================
// Full lifecycle
// =========================================================================

#[tokio::test]
async fn test_login_refresh_logout_lifecycle() {
    let (service, clock) = clocked_service();
    let alice = uid("alice");

    let pair = service.issue(&alice).await.unwrap();
    assert_eq!(service.authenticate(&pair.access).await, Ok(alice.clone()));

    clock.fetch_add(2, Ordering::SeqCst);
    let refreshed = service.refresh(&pair.refresh).await.unwrap();
    assert_ne!(refreshed.access, pair.access);
    assert_eq!(service.authenticate(&refreshed.access).await, Ok(alice.clone()));
    assert_eq!(service.authenticate(&pair.access).await, Ok(alice.clone()));

    let revocation = service.logout(&refreshed.access, &refreshed.refresh).await;
    assert_eq!(revocation.access, Outcome::Applied);
    assert_eq!(revocation.refresh, Outcome::Applied);
    assert_eq!(
        service.authenticate(&refreshed.access).await,
        Err(AuthError::InvalidCredential)
    );
    assert_eq!(
        service.refresh(&pair.refresh).await,
        Err(AuthError::InvalidCredential)
    );

    // Logging out the newer pair leaves the first access session alone.
    assert_eq!(service.authenticate(&pair.access).await, Ok(alice));
}
