use std::path::PathBuf;

use thiserror::Error;

/// A watch session could not be started. Never retried internally.
#[derive(Debug, Error)]
pub enum WatchStartError {
    #[error(transparent)]
    Target(#[from] storewatch_core::TargetError),

    /// The platform watch facility refused the directory (permissions, inotify limits).
    #[error("cannot watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to spawn notifier thread: {0}")]
    Notifier(#[source] std::io::Error),
}

/// A broadcast sink rejected or failed a publish.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("broadcast sink is closed")]
    Closed,

    #[error("publish failed: {0}")]
    Failed(String),
}

/// Error surface for the server runtime and socket protocol.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    WatchStart(#[from] WatchStartError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    #[error("server is not running (socket missing: {socket})")]
    NotRunning { socket: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
