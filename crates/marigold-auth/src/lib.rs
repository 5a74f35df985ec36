//! Credential lifecycle for Marigold.
//!
//! # How it fits together
//!
//! ```text
//! login ──→ CredentialService::issue ──→ TokenPair { access, refresh }
//!                 │                         │
//!                 └─ session:<kind>:<token> records in the SessionStore
//!
//! request ──→ Authenticator::authenticate(access) ──→ UserId
//! refresh ──→ CredentialService::refresh(refresh) ──→ new access
//! logout  ──→ CredentialService::logout(access, refresh)
//! ```
//!
//! Tokens are HMAC-signed JWTs (see [`Signer`]). A token is honoured only
//! while its session record exists, which is what lets a stateless token
//! be revoked.

#![allow(async_fn_in_trait)]

mod auth;
mod config;
mod error;
mod service;
mod signer;

pub use auth::Authenticator;
pub use config::CredentialConfig;
pub use error::AuthError;
pub use jsonwebtoken::Algorithm;
pub use service::{Clock, CredentialService, Revocation, TokenPair};
pub use signer::Signer;
