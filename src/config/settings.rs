use std::{path::Path, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{logging::LoggingConfig, HubError};

/// Hub configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Capacity of each subscriber mailbox created through the hub.
    pub mailbox_capacity: usize,
    /// Default acknowledgment timeout for subscribe/unsubscribe.
    pub ask_timeout_ms: u64,
    /// How long `shutdown` waits for the root node.
    pub shutdown_timeout_ms: u64,
}

/// Application settings: defaults, optional `chanhub.toml`, then `CHANHUB_*`
/// environment variables (`CHANHUB_HUB__ASK_TIMEOUT_MS=250`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hub: HubConfig,
    pub logging: LoggingConfig,
}

impl HubConfig {
    pub fn ask_timeout(&self) -> Duration {
        Duration::from_millis(self.ask_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), HubError> {
        if self.mailbox_capacity == 0 {
            return Err(HubError::InvalidConfig {
                reason: "mailbox_capacity must be greater than zero".to_string(),
            });
        }
        if self.ask_timeout_ms == 0 {
            return Err(HubError::InvalidConfig {
                reason: "ask_timeout_ms must be greater than zero".to_string(),
            });
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(HubError::InvalidConfig {
                reason: "shutdown_timeout_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1024,
            ask_timeout_ms: 5_000,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads settings, layering an explicit file (required if given) over
    /// the optional `chanhub.toml` in the working directory.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = HubConfig::default();

        let mut builder = Config::builder()
            // Adding default values
            .set_default("hub.mailbox_capacity", defaults.mailbox_capacity as u64)?
            .set_default("hub.ask_timeout_ms", defaults.ask_timeout_ms)?
            .set_default("hub.shutdown_timeout_ms", defaults.shutdown_timeout_ms)?
            .add_source(File::with_name("chanhub").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Add environment variables with the CHANHUB_ prefix.
        let cfg = builder
            .add_source(
                Environment::with_prefix("CHANHUB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        cfg.try_deserialize()
    }
}
