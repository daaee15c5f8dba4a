//! `storewatch serve` — run the watcher and socket server in the foreground.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use storewatch_core::WatchConfig;
use storewatch_daemon::{serve_blocking, ServeOptions};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to the database file to watch.
    #[arg(value_name = "DB_PATH")]
    pub db_path: PathBuf,

    /// Unix socket subscribers connect to.
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Quiet period that closes a burst of file events (0 publishes on every event).
    #[arg(long, value_name = "MS")]
    pub settle_ms: Option<u64>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

impl ServeArgs {
    pub fn run(self, config: &WatchConfig) -> Result<()> {
        let mut config = config.clone();
        if let Some(settle_ms) = self.settle_ms {
            config.settle_ms = settle_ms;
        }
        let socket = super::resolve_socket(self.socket, &config)?;

        let mut options = ServeOptions::new(&self.db_path, socket, &config);
        options.log_json = self.log_json;

        serve_blocking(options)
            .with_context(|| format!("failed to serve updates for {}", self.db_path.display()))
    }
}
