use std::{fmt, time::Duration};

use anyhow::{Context, Result};

use crate::upload::RetryPolicy;

pub const KEY_VAR: &str = "NEBUIA_KEY";
pub const SECRET_VAR: &str = "NEBUIA_SECRET";
pub const BASE_URL_VAR: &str = "NEBUIA_BASE_URL";
pub const MAX_RETRIES_VAR: &str = "NEBUIA_MAX_RETRIES";
pub const RETRY_DELAY_VAR: &str = "NEBUIA_RETRY_DELAY_SECS";

/// Credentials and endpoint of an integrator account, plus the upload retry defaults.
#[derive(Clone)]
pub struct ClientConfig {
    pub key: String,
    pub secret: String,
    pub base_url: String,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(
        key: impl Into<String>,
        secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            base_url: base_url.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Reads the configuration from `NEBUIA_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required =
            |name: &str| lookup(name).with_context(|| format!("{name} env variable not set"));

        let mut config = Self::new(
            required(KEY_VAR)?,
            required(SECRET_VAR)?,
            required(BASE_URL_VAR)?,
        );

        if let Some(max_retries) = lookup(MAX_RETRIES_VAR) {
            config.retry.max_retries = max_retries
                .trim()
                .parse()
                .with_context(|| format!("{MAX_RETRIES_VAR} is not a whole number"))?;
        }
        if let Some(delay) = lookup(RETRY_DELAY_VAR) {
            let secs: u64 = delay
                .trim()
                .parse()
                .with_context(|| format!("{RETRY_DELAY_VAR} is not a whole number of seconds"))?;
            config.retry.retry_delay = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish()
    }
}
