use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable holding the backend base URL.
pub const BASE_URL_ENV: &str = "PORTAL_BACKEND_URL";
/// Environment variable holding the optional server-side bearer token.
pub const SERVER_TOKEN_ENV: &str = "PORTAL_BACKEND_TOKEN";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Backend base URL must use http or https")]
    UnsupportedScheme,

    #[error("Timeouts cannot be 0")]
    ZeroTimeout,

    #[error("Per-attempt timeout must not exceed the operation deadline")]
    AttemptExceedsDeadline,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid backend base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid backend config: {0}")]
    Validation(#[from] ValidationError),
}

/// Connection parameters for the portal backend.
///
/// One instance is built at startup and shared read-only by every
/// operation; there is no process-wide global.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Base URL all candidate routes are resolved against
    pub base_url: Url,
    /// Bearer token used when the caller sends none
    #[serde(default)]
    pub server_token: Option<String>,
    /// Wall-clock budget shared by all candidates of one operation
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// Budget for a single candidate attempt, nested inside the deadline
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

fn default_deadline_secs() -> u64 {
    25
}

fn default_attempt_timeout_secs() -> u64 {
    10
}

impl BackendConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            server_token: None,
            deadline_secs: default_deadline_secs(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }

    /// Validates the backend configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(ValidationError::UnsupportedScheme);
        }
        if self.deadline_secs == 0 || self.attempt_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout);
        }
        if self.attempt_timeout_secs > self.deadline_secs {
            return Err(ValidationError::AttemptExceedsDeadline);
        }
        Ok(())
    }

    /// Loads the backend configuration from the environment.
    ///
    /// A missing base URL yields `Ok(None)`: the service still starts
    /// and answers every relay call with a configuration error, so the
    /// failure is visible to callers instead of crash-looping.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(raw_url) = std::env::var(BASE_URL_ENV) else {
            return Ok(None);
        };

        let mut config = Self::new(Url::parse(&raw_url)?);
        config.server_token = std::env::var(SERVER_TOKEN_ENV).ok();
        config.validate()?;

        Ok(Some(config))
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}
