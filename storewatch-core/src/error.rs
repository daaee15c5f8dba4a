//! Error types for storewatch-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving a watched store path into a [`crate::WatchTarget`].
#[derive(Debug, Error)]
pub enum TargetError {
    /// The path has no final file-name component (`/`, `..`).
    #[error("not a file path: {path}")]
    InvalidPath { path: PathBuf },

    /// The directory that should contain the store does not exist.
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Any other failure while resolving the directory (permissions, cwd lookup).
    #[error("failed to resolve {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading or validating a [`crate::WatchConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An explicitly requested config file does not exist.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// A field holds a value the watcher cannot work with.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.storewatch/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}
