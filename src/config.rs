//! Client configuration: store location, relay address and trust policy.
//!
//! Values come from environment variables with compiled defaults. The
//! endpoint trust level is resolved once here at startup and handed to the
//! sync coordinator as a fixed value; nothing re-derives it per call.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::sync::trust::EndpointTrust;

/// Environment variable for the relay base address.
pub const RELAY_URL_ENV: &str = "SOLACE_RELAY_URL";

/// Environment variable for the conversation store file.
pub const STORE_PATH_ENV: &str = "SOLACE_STORE_PATH";

/// Environment variable overriding the trust classification.
/// `1`/`true` forces trust, `0`/`false` revokes it.
pub const TRUST_OVERRIDE_ENV: &str = "SOLACE_TRUST_RELAY";

const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000";

/// Errors raised by configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The relay base address is not a valid URL.
    #[error("invalid relay url: {0}")]
    InvalidRelayUrl(#[from] url::ParseError),
    /// The store path is empty.
    #[error("store path must not be empty")]
    EmptyStorePath,
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Local store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Conversation collection file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        Self {
            path: PathBuf::from(format!("{home}/.solace/conversations.json")),
        }
    }
}

/// Relay endpoint settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay base address.
    pub base_url: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_RELAY_URL.to_string(),
        }
    }
}

/// Synchronization policy settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Overrides the host-based trust classification when set.
    pub trust_override: Option<bool>,
}

/// Full client configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Local store settings.
    pub store: StoreConfig,
    /// Relay endpoint settings.
    pub relay: RelayConfig,
    /// Synchronization policy settings.
    pub sync: SyncConfig,
}

impl ClientConfig {
    /// Collect configuration from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(RELAY_URL_ENV) {
            config.relay.base_url = url;
        }
        if let Ok(path) = std::env::var(STORE_PATH_ENV) {
            config.store.path = PathBuf::from(path);
        }
        if let Ok(raw) = std::env::var(TRUST_OVERRIDE_ENV) {
            config.sync.trust_override = parse_trust_override(&raw);
            if config.sync.trust_override.is_none() {
                tracing::warn!(value = %raw, "unrecognized trust override, ignoring");
            }
        }
        config
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if the relay address is not a valid URL or the store
    /// path is empty.
    pub fn validate(&self) -> ConfigResult<()> {
        Url::parse(&self.relay.base_url)?;
        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStorePath);
        }
        Ok(())
    }

    /// Resolve the trust level of the configured relay endpoint.
    ///
    /// # Errors
    /// Returns an error if the relay address is not a valid URL.
    pub fn resolve_trust(&self) -> ConfigResult<EndpointTrust> {
        let url = Url::parse(&self.relay.base_url)?;
        Ok(EndpointTrust::classify(&url, self.sync.trust_override))
    }
}

fn parse_trust_override(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}
