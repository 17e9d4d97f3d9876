//! Connection settings for a Mingle project.
//!
//! Nothing is persisted; callers build a `ClientConfig` directly or load it
//! from `MINGLE_*` environment variables.

use std::time::Duration;

use crate::error::ApiError;
use crate::signer::BasicAuth;

pub const BASE_URL_VAR: &str = "MINGLE_BASE_URL";
pub const USERNAME_VAR: &str = "MINGLE_USERNAME";
pub const PASSWORD_VAR: &str = "MINGLE_PASSWORD";
pub const TIMEOUT_VAR: &str = "MINGLE_TIMEOUT_SECS";

#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Project API root, e.g. `https://mingle.example.com/api/v2/projects/demo`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Overall deadline per request; `None` keeps the transport default.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: String::new(),
            password: String::new(),
            timeout: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable lookup. `MINGLE_BASE_URL` is required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(BASE_URL_VAR)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ApiError::Config(format!("{BASE_URL_VAR} is not set")))?;

        let timeout = match lookup(TIMEOUT_VAR) {
            None => None,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    return Err(ApiError::Config(format!(
                        "{TIMEOUT_VAR} must be a positive number of seconds, got `{raw}`"
                    )))
                }
            },
        };

        Ok(Self {
            base_url: base_url.trim().to_string(),
            username: lookup(USERNAME_VAR).unwrap_or_default(),
            password: lookup(PASSWORD_VAR).unwrap_or_default(),
            timeout,
        })
    }

    pub fn signer(&self) -> BasicAuth {
        BasicAuth::new(&self.username, &self.password)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}
