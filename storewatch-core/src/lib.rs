//! storewatch core library — watch targets, configuration, path helpers, errors.
//!
//! - [`target`] — [`WatchTarget`] resolution for a store file and its journal
//! - [`config`] — [`WatchConfig`] YAML loading
//! - [`paths`] — `~/.storewatch/` layout
//! - [`error`] — [`TargetError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod paths;
pub mod target;

pub use config::WatchConfig;
pub use error::{ConfigError, TargetError};
pub use target::{WatchTarget, DEFAULT_JOURNAL_SUFFIX};
