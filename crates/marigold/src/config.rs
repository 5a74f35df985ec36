//! Settings loaded from the environment.
//!
//! | Variable                          | Default                    |
//! |-----------------------------------|----------------------------|
//! | `JWT_SECRET_KEY`                  | *(required)*               |
//! | `JWT_ALGORITHM`                   | `HS256`                    |
//! | `JWT_ACCESS_TOKEN_EXPIRE_HOURS`   | `1`                        |
//! | `JWT_REFRESH_TOKEN_EXPIRE_HOURS`  | `336` (14 days)            |
//! | `REDIS_URL`                       | `redis://127.0.0.1:6379/0` |
//! | `REDIS_PASSWORD`                  | *(none)*                   |
//! | `REDIS_MAX_CONNECTIONS`           | `10`                       |
//! | `WS_PRESENCE_TTL_SECS`            | `3600`                     |

use std::collections::BTreeMap;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Serialized};
use marigold_auth::{Algorithm, CredentialConfig};
use marigold_presence::PresenceConfig;
use marigold_store::StoreConfig;
use serde::{Deserialize, Serialize};

/// Every variable [`Settings::from_env`] reads.
pub const VARIABLES: &[&str] = &[
    "JWT_SECRET_KEY",
    "JWT_ALGORITHM",
    "JWT_ACCESS_TOKEN_EXPIRE_HOURS",
    "JWT_REFRESH_TOKEN_EXPIRE_HOURS",
    "REDIS_URL",
    "REDIS_PASSWORD",
    "REDIS_MAX_CONNECTIONS",
    "WS_PRESENCE_TTL_SECS",
];

/// Variables taken as literal text. `Env` would otherwise read a secret
/// such as `123456` as a number, or `0123` as `123`.
const VERBATIM: &[&str] = &["JWT_SECRET_KEY", "REDIS_PASSWORD"];

/// Errors from assembling [`Settings`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// A variable is set but its value is unusable.
    #[error("invalid setting {var}: {reason}")]
    Invalid { var: String, reason: String },

    /// The signing algorithm is unknown or needs a key pair.
    #[error("unsupported signing algorithm {0:?}; expected HS256, HS384 or HS512")]
    UnsupportedAlgorithm(String),
}

/// The flat, environment-shaped view. `Env::raw` lowercases names, so
/// `JWT_SECRET_KEY` lands in `jwt_secret_key`.
#[derive(Debug, Serialize, Deserialize)]
struct RawSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jwt_secret_key: Option<String>,
    jwt_algorithm: String,
    jwt_access_token_expire_hours: u64,
    jwt_refresh_token_expire_hours: u64,
    redis_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    redis_password: Option<String>,
    redis_max_connections: usize,
    ws_presence_ttl_secs: u64,
}

impl Default for RawSettings {
    fn default() -> Self {
        let store = StoreConfig::default();
        Self {
            jwt_secret_key: None,
            jwt_algorithm: "HS256".to_string(),
            jwt_access_token_expire_hours: 1,
            jwt_refresh_token_expire_hours: 14 * 24,
            redis_url: store.url,
            redis_password: None,
            redis_max_connections: store.pool_size,
            ws_presence_ttl_secs: PresenceConfig::default().connection_ttl.as_secs(),
        }
    }
}

/// Configuration for every Marigold component.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials: CredentialConfig,
    pub store: StoreConfig,
    pub presence: PresenceConfig,
}

impl Settings {
    /// Reads [`VARIABLES`] from the process environment over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// The defaults with the environment merged on top. Callers can merge
    /// further providers before handing it to [`from_figment`](Self::from_figment).
    pub fn figment() -> Figment {
        let verbatim: BTreeMap<String, String> = Env::raw()
            .only(VERBATIM)
            .iter()
            .map(|(key, value)| (key.as_str().to_owned(), value))
            .collect();

        Figment::from(Serialized::defaults(RawSettings::default()))
            .merge(Env::raw().only(VARIABLES).ignore(VERBATIM))
            .merge(Serialized::defaults(verbatim))
    }

    /// Extracts and validates settings from any figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let raw: RawSettings = figment.extract().map_err(|e| ConfigError::Invalid {
            var: e.path.join(".").to_uppercase(),
            reason: e.to_string(),
        })?;
        Self::validate(raw)
    }

    fn validate(raw: RawSettings) -> Result<Self, ConfigError> {
        let secret = raw
            .jwt_secret_key
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET_KEY"))?;

        let algorithm = parse_algorithm(&raw.jwt_algorithm)?;
        let access_hours =
            nonzero("JWT_ACCESS_TOKEN_EXPIRE_HOURS", raw.jwt_access_token_expire_hours)?;
        let refresh_hours =
            nonzero("JWT_REFRESH_TOKEN_EXPIRE_HOURS", raw.jwt_refresh_token_expire_hours)?;
        let pool_size = nonzero("REDIS_MAX_CONNECTIONS", raw.redis_max_connections as u64)?;
        let presence_ttl = nonzero("WS_PRESENCE_TTL_SECS", raw.ws_presence_ttl_secs)?;

        let mut credentials = CredentialConfig::new(secret).with_hours(access_hours, refresh_hours);
        credentials.algorithm = algorithm;

        let store = StoreConfig {
            url: raw.redis_url,
            password: raw.redis_password.filter(|p| !p.is_empty()),
            pool_size: pool_size as usize,
            ..StoreConfig::default()
        };

        let presence = PresenceConfig {
            connection_ttl: Duration::from_secs(presence_ttl),
        };

        Ok(Self {
            credentials,
            store,
            presence,
        })
    }
}

fn parse_algorithm(raw: &str) -> Result<Algorithm, ConfigError> {
    let unsupported = || ConfigError::UnsupportedAlgorithm(raw.to_string());
    let algorithm: Algorithm = raw.trim().parse().map_err(|_| unsupported())?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        _ => Err(unsupported()),
    }
}

fn nonzero(var: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            var: var.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
