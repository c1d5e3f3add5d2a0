//! Bridge configuration.
//!
//! Configuration for the AiBridge client, including:
//! - Service base URL and credentials
//! - Connect, health and token timeouts
//! - Reconnect backoff
//! - Startup warm-up behavior

use std::path::Path;
use std::time::Duration;

use aibridge_auth::{Credentials, DEFAULT_BASE_URL, TokenCacheConfig};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::BridgeError;
use crate::session::{ReconnectConfig, SessionConfig};

/// Reconnect backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReconnectSettings {
    /// Delay before the first reconnect attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for the backoff delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Attempts before the session is marked failed.
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            max_attempts: 5,
        }
    }
}

/// Token cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenSettings {
    /// Lifetime assigned to fetched tokens, in seconds.
    pub lifetime_secs: u64,
    /// Tokens this close to expiry are refreshed, in seconds.
    pub refresh_margin_secs: u64,
    /// Timeout for a token request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            lifetime_secs: 55 * 60,
            refresh_margin_secs: 0,
            request_timeout_secs: 10,
        }
    }
}

/// Main bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// HTTP(S) base URL of the service.
    pub base_url: String,
    /// Reconnect after unexpected disconnects.
    pub auto_reconnect: bool,
    /// Probe the health endpoint during startup.
    pub warm_up: bool,
    /// Delay before the startup sequence runs, in milliseconds.
    pub warm_up_delay_ms: u64,
    /// Log lifecycle transitions at info level.
    pub verbose: bool,
    /// Handshake timeout, in seconds.
    pub connect_timeout_secs: u64,
    /// Health probe timeout, in seconds.
    pub health_timeout_secs: u64,
    /// Identity sent to the auth endpoint.
    pub credentials: Credentials,
    /// Reconnect backoff.
    pub reconnect: ReconnectSettings,
    /// Token cache.
    pub token: TokenSettings,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auto_reconnect: true,
            warm_up: true,
            warm_up_delay_ms: 0,
            verbose: false,
            connect_timeout_secs: 10,
            health_timeout_secs: 10,
            credentials: Credentials::default(),
            reconnect: ReconnectSettings::default(),
            token: TokenSettings::default(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            BridgeError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, BridgeError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| BridgeError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, BridgeError> {
        toml::to_string_pretty(self)
            .map_err(|e| BridgeError::Config(format!("failed to serialize config: {e}")))
    }

    /// Write the configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), BridgeError> {
        let content = self.to_toml()?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), BridgeError> {
        let base = Url::parse(self.base_url())
            .map_err(|e| BridgeError::Config(format!("invalid base_url: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(BridgeError::Config(
                "base_url must start with http:// or https://".to_string(),
            ));
        }

        if self.connect_timeout_secs == 0 {
            return Err(BridgeError::Config(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.health_timeout_secs == 0 {
            return Err(BridgeError::Config(
                "health_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.base_delay_ms == 0 {
            return Err(BridgeError::Config(
                "reconnect.base_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(BridgeError::Config(
                "reconnect.max_delay_ms must not be less than reconnect.base_delay_ms".to_string(),
            ));
        }

        if self.token.lifetime_secs <= self.token.refresh_margin_secs {
            return Err(BridgeError::Config(
                "token.lifetime_secs must be greater than token.refresh_margin_secs".to_string(),
            ));
        }

        if self.token.request_timeout_secs == 0 {
            return Err(BridgeError::Config(
                "token.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Base URL, falling back to the production endpoint when unset.
    #[must_use]
    pub fn base_url(&self) -> &str {
        if self.base_url.trim().is_empty() {
            DEFAULT_BASE_URL
        } else {
            &self.base_url
        }
    }

    /// Handshake timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Health probe timeout.
    #[must_use]
    pub const fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    /// Delay before the startup sequence.
    #[must_use]
    pub const fn warm_up_delay(&self) -> Duration {
        Duration::from_millis(self.warm_up_delay_ms)
    }

    /// Reconnect backoff for the session.
    #[must_use]
    pub const fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig {
            base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
            max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
            max_attempts: self.reconnect.max_attempts,
        }
    }

    /// Settings for the socket session.
    #[must_use]
    pub const fn session_config(&self) -> SessionConfig {
        SessionConfig {
            connect_timeout: self.connect_timeout(),
            auto_reconnect: self.auto_reconnect,
            reconnect: self.reconnect_config(),
            verbose: self.verbose,
        }
    }

    /// Settings for the token cache.
    #[must_use]
    pub fn token_cache_config(&self) -> TokenCacheConfig {
        TokenCacheConfig::new(self.base_url())
            .with_token_lifetime(Duration::from_secs(self.token.lifetime_secs))
            .with_refresh_margin(Duration::from_secs(self.token.refresh_margin_secs))
            .with_request_timeout(Duration::from_secs(self.token.request_timeout_secs))
    }
}
