//! Brokerage API credential pair.

use std::{env, fmt};

/// Env var holding the brokerage API key id.
pub const ENV_ALPACA_KEY: &str = "ALPACA_KEY";
/// Env var holding the brokerage API secret.
pub const ENV_ALPACA_SECRET: &str = "ALPACA_SECRET";

/// Errors from loading credentials out of the environment.
#[derive(thiserror::Error, Debug)]
pub enum CredentialsError {
    /// api key was not set
    #[error("environment variable {ENV_ALPACA_KEY} must be set")]
    KeyNotSet,
    /// api secret was not set
    #[error("environment variable {ENV_ALPACA_SECRET} must be set")]
    SecretNotSet,
}

/// The brokerage API credential pair.
///
/// The values never appear in `Debug` output and the type deliberately has no
/// serde derive; the only serialized form is built explicitly by the secrets
/// manager when sealing the pair for the DON.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    key: String,
    secret: String,
}

impl ApiCredentials {
    /// Create a new [Self] from explicit values.
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { key: key.into(), secret: secret.into() }
    }

    /// Load the pair from `ALPACA_KEY` / `ALPACA_SECRET`.
    pub fn from_env() -> Result<Self, CredentialsError> {
        let key = env::var(ENV_ALPACA_KEY).map_err(|_| CredentialsError::KeyNotSet)?;
        let secret = env::var(ENV_ALPACA_SECRET).map_err(|_| CredentialsError::SecretNotSet)?;
        Ok(Self { key, secret })
    }

    /// True if both values are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.key.is_empty() && !self.secret.is_empty()
    }

    /// The API key id.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The API secret.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("key", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}
