//! Client configuration.
//!
//! [`ClientConfig`] collects the relay location, timeouts and retry knobs.
//! Every field has a default, so a TOML file only needs the keys it
//! changes.
//!
//! # Example
//!
//! ```
//! use lattice_signer_core::ClientConfig;
//!
//! let config = ClientConfig::from_toml_str(r#"
//!     retries = 4
//!     skip_retry_on_wrong_wallet = true
//! "#).unwrap();
//!
//! assert_eq!(config.retries, 4);
//! assert_eq!(config.base_url, "https://signing.gridpl.us");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Default relay base URL.
pub const DEFAULT_BASE_URL: &str = "https://signing.gridpl.us";

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relay base URL.
    pub base_url: String,

    /// Per-call transport timeout in milliseconds.
    pub timeout_ms: u64,

    /// Retries allowed after the first attempt of a device call.
    pub retries: u32,

    /// Wait before retrying a busy device, in milliseconds.
    pub busy_retry_delay_ms: u64,

    /// Fail immediately when the active wallet changed instead of
    /// refetching it and retrying.
    pub skip_retry_on_wrong_wallet: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: 60_000,
            retries: 2,
            busy_retry_delay_ms: 3_000,
            skip_retry_on_wrong_wallet: false,
        }
    }
}

impl ClientConfig {
    /// Parses and validates a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed TOML or invalid values.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for unusable values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is empty or not HTTP(S), or
    /// the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("base_url must not be empty".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "base_url {:?} must start with http:// or https://",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Returns the per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Builds the retry policy described by this configuration.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries)
            .with_busy_delay(Duration::from_millis(self.busy_retry_delay_ms))
            .skip_retry_on_wrong_wallet(self.skip_retry_on_wrong_wallet)
    }
}
