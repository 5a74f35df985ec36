//! Connection gateway: credential extraction, WebSocket admission, and
//! presence bookkeeping for the lifetime of a connection.
//!
//! The flow for a WebSocket client:
//!   1. Upgrade the HTTP request, capturing its `Authorization` header
//!      and query string
//!   2. Resolve the bearer token (header first, then `?token=`)
//!   3. Rejected → send a close frame with code 1008 and stop
//!   4. Accepted → record presence under a fresh connection id and hand
//!      back a [`LiveConnection`]
//!   5. When the `LiveConnection` goes away, presence is retracted, unless
//!      a newer connection for the same user has replaced it

use std::fmt;
use std::sync::Arc;

use marigold_auth::{AuthError, Authenticator};
use marigold_presence::PresenceTracker;
use marigold_protocol::{ConnectionId, UserId};
use marigold_store::{KeyValueStore, Outcome};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::MarigoldError;

/// WebSocket close code sent when a connection is refused for credential
/// reasons (RFC 6455 "policy violation").
pub const POLICY_VIOLATION: u16 = 1008;

/// Name of the query parameter carrying the token on WebSocket upgrades.
pub const TOKEN_PARAM: &str = "token";

// ---------------------------------------------------------------------------
// Credential extraction
// ---------------------------------------------------------------------------

/// Pulls the token out of an `Authorization` header value.
///
/// - absent or blank → [`AuthError::MissingCredential`]
/// - not exactly `<scheme> <token>`, or scheme other than `bearer`
///   (any case) → [`AuthError::InvalidCredential`]
pub fn bearer_from_header(header: Option<&str>) -> Result<&str, AuthError> {
    let header = match header.map(str::trim) {
        Some(h) if !h.is_empty() => h,
        _ => return Err(AuthError::MissingCredential),
    };

    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") =>
        {
            Ok(token)
        }
        _ => Err(AuthError::InvalidCredential),
    }
}

/// Pulls the `token` parameter out of a raw query string (`a=1&token=...`).
///
/// Absent or empty → [`AuthError::MissingCredential`]. Tokens are
/// URL-safe already, so the value is taken as-is.
pub fn token_from_query(query: Option<&str>) -> Result<&str, AuthError> {
    query
        .into_iter()
        .flat_map(|q| q.split('&'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == TOKEN_PARAM)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::MissingCredential)
}

/// Close frame sent to a client whose credential was rejected.
pub fn rejection_frame(err: &AuthError) -> CloseFrame {
    CloseFrame {
        code: CloseCode::from(POLICY_VIOLATION),
        reason: err.to_string().into(),
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Admits connections: resolves credentials and records presence.
///
/// Cheap to clone; every clone shares the same authenticator and tracker.
pub struct Gateway<A: Authenticator, B: KeyValueStore> {
    auth: Arc<A>,
    presence: Arc<PresenceTracker<B>>,
}

impl<A: Authenticator, B: KeyValueStore> Clone for Gateway<A, B> {
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
            presence: Arc::clone(&self.presence),
        }
    }
}

impl<A: Authenticator, B: KeyValueStore> Gateway<A, B> {
    pub fn new(auth: Arc<A>, presence: Arc<PresenceTracker<B>>) -> Self {
        Self { auth, presence }
    }

    /// Resolves the user behind an HTTP `Authorization` header value.
    pub async fn authorize_header(
        &self,
        header: Option<&str>,
    ) -> Result<UserId, AuthError> {
        let token = bearer_from_header(header)?;
        self.auth.authenticate(token).await
    }

    /// Resolves the user behind a `?token=` query string.
    pub async fn authorize_query(
        &self,
        query: Option<&str>,
    ) -> Result<UserId, AuthError> {
        let token = token_from_query(query)?;
        self.auth.authenticate(token).await
    }

    /// Upgrades `stream` to a WebSocket and admits it.
    ///
    /// The token is taken from the upgrade request's `Authorization`
    /// header when present, otherwise from its `token` query parameter.
    ///
    /// # Errors
    /// - [`MarigoldError::WebSocket`] if the upgrade itself fails
    /// - [`MarigoldError::Auth`] if the credential is rejected; the client
    ///   has already been sent a 1008 close frame
    pub async fn accept<S>(
        &self,
        stream: S,
    ) -> Result<LiveConnection<S, B>, MarigoldError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut header: Option<String> = None;
        let mut query: Option<String> = None;
        let capture = |request: &Request,
                       response: Response|
         -> Result<Response, ErrorResponse> {
            header = request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            query = request.uri().query().map(str::to_owned);
            Ok(response)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, capture).await?;

        let verdict = match header.as_deref() {
            Some(value) => self.authorize_header(Some(value)).await,
            None => self.authorize_query(query.as_deref()).await,
        };

        let user = match verdict {
            Ok(user) => user,
            Err(e) => {
                tracing::info!(error = %e, "websocket rejected");
                if let Err(close_err) = ws.close(Some(rejection_frame(&e))).await {
                    tracing::debug!(error = %close_err, "close after rejection failed");
                }
                return Err(e.into());
            }
        };

        let connection = ConnectionId::generate();
        let outcome = self.presence.connect(&user, &connection).await;
        tracing::info!(%user, %connection, %outcome, "websocket admitted");

        Ok(LiveConnection {
            ws,
            guard: PresenceGuard {
                user,
                connection,
                presence: Some(Arc::clone(&self.presence)),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// LiveConnection
// ---------------------------------------------------------------------------

/// Drop guard that retracts a connection's presence when it goes away.
///
/// `Drop` is synchronous, so the retraction is spawned onto the runtime
/// as a fire-and-forget task. [`LiveConnection::finish`] disarms the
/// guard and retracts inline instead.
struct PresenceGuard<B: KeyValueStore> {
    user: UserId,
    connection: ConnectionId,
    presence: Option<Arc<PresenceTracker<B>>>,
}

impl<B: KeyValueStore> Drop for PresenceGuard<B> {
    fn drop(&mut self) {
        let Some(presence) = self.presence.take() else {
            return;
        };
        let user = self.user.clone();
        let connection = self.connection.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    presence.retract_connection(&user, &connection).await;
                });
            }
            Err(_) => {
                tracing::warn!(%user, %connection, "no runtime; presence left to expire");
            }
        }
    }
}

/// An admitted WebSocket and the presence it holds.
pub struct LiveConnection<S, B: KeyValueStore> {
    ws: WebSocketStream<S>,
    guard: PresenceGuard<B>,
}

impl<S, B: KeyValueStore> fmt::Debug for LiveConnection<S, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveConnection")
            .field("user", &self.guard.user)
            .field("connection", &self.guard.connection)
            .finish_non_exhaustive()
    }
}

impl<S, B> LiveConnection<S, B>
where
    S: AsyncRead + AsyncWrite + Unpin,
    B: KeyValueStore,
{
    /// The authenticated user.
    pub fn user(&self) -> &UserId {
        &self.guard.user
    }

    /// The id this connection was recorded under.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.guard.connection
    }

    /// The underlying socket, for the chat layer to read and write.
    pub fn socket(&mut self) -> &mut WebSocketStream<S> {
        &mut self.ws
    }

    /// Closes the socket and retracts presence before returning.
    pub async fn finish(mut self) -> Outcome {
        if let Err(e) = self.ws.close(None).await {
            tracing::debug!(user = %self.guard.user, error = %e, "close failed");
        }
        match self.guard.presence.take() {
            Some(presence) => {
                presence
                    .retract_connection(&self.guard.user, &self.guard.connection)
                    .await
            }
            None => Outcome::Skipped,
        }
    }
}
