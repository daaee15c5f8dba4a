//! YAML configuration for the watcher and its server.
//!
//! ```yaml
//! journal_suffix: "-journal"
//! event_name: database_update
//! settle_ms: 50
//! channel_capacity: 64
//! socket: /run/user/1000/storewatch.sock
//! log_filter: info
//! ```
//!
//! Every field is optional; unknown keys are rejected.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paths::config_path_at;
use crate::target::DEFAULT_JOURNAL_SUFFIX;

/// Name of the broadcast event published when the watched store changes.
pub const DEFAULT_EVENT_NAME: &str = "database_update";
pub const DEFAULT_SETTLE_MS: u64 = 50;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    pub journal_suffix: String,
    pub event_name: String,
    /// Quiet period that closes a burst of events. `0` publishes on every wake.
    pub settle_ms: u64,
    /// Notifications buffered per subscriber before it starts lagging.
    pub channel_capacity: usize,
    /// Socket path override; `None` means `~/.storewatch/storewatch.sock`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket: Option<PathBuf>,
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            journal_suffix: DEFAULT_JOURNAL_SUFFIX.to_string(),
            event_name: DEFAULT_EVENT_NAME.to_string(),
            settle_ms: DEFAULT_SETTLE_MS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            socket: None,
            log_filter: "info".to_string(),
        }
    }
}

impl WatchConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.journal_suffix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "journal_suffix",
                reason: "must not be empty",
            });
        }
        if self.event_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "event_name",
                reason: "must not be empty",
            });
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "channel_capacity",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

/// Load and validate the config file at `path`. The file must exist.
pub fn load_from(path: &Path) -> Result<WatchConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    // An empty document deserializes to unit, not a mapping.
    let config: WatchConfig = if raw.trim().is_empty() {
        WatchConfig::default()
    } else {
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    };
    config.validate()?;
    Ok(config)
}

/// Load `<home>/.storewatch/config.yaml`, falling back to defaults when it is absent.
pub fn load_at(home: &Path) -> Result<WatchConfig, ConfigError> {
    match load_from(&config_path_at(home)) {
        Err(ConfigError::NotFound { .. }) => Ok(WatchConfig::default()),
        other => other,
    }
}

/// Resolve the effective config: an explicit file wins, otherwise the home default.
pub fn load(explicit: Option<&Path>) -> Result<WatchConfig, ConfigError> {
    match explicit {
        Some(path) => load_from(path),
        None => load_at(&crate::paths::home()?),
    }
}
