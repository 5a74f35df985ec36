//! Token signing and signature verification.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use marigold_protocol::Claims;

use crate::AuthError;

/// Signs [`Claims`] into compact tokens and verifies them back.
///
/// The signer only checks the *signature* and the token structure. Every
/// claim-level rule (issuer, issued-at, expiry, kind) is left to the
/// credential service, which runs them in a fixed order after the session
/// lookup. The library's own `exp` validation is therefore switched off.
pub struct Signer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    header: Header,
    validation: Validation,
}

impl Signer {
    /// Builds a signer for an HMAC `algorithm` and shared `secret`.
    ///
    /// # Errors
    /// [`AuthError::Misconfigured`] for an empty secret or a non-HMAC
    /// algorithm (RSA/EC/EdDSA need key pairs, not a shared secret).
    pub fn new(secret: &[u8], algorithm: Algorithm) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::Misconfigured(
                "signing secret must not be empty".into(),
            ));
        }
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::Misconfigured(format!(
                "algorithm {algorithm:?} needs a key pair; only HS256/HS384/HS512 are supported"
            )));
        }

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            header: Header::new(algorithm),
            validation,
        })
    }

    /// Signs claims into a compact token.
    pub fn encode(
        &self,
        claims: &Claims,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        jsonwebtoken::encode(&self.header, claims, &self.encoding)
    }

    /// Verifies the signature and decodes the claims.
    pub fn decode(
        &self,
        token: &str,
    ) -> Result<Claims, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
    }
}
