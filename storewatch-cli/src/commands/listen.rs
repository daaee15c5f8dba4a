//! `storewatch listen` — print notifications from a running server.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use storewatch_core::WatchConfig;
use storewatch_daemon::subscribe;

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Unix socket of the running server.
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Exit after this many notifications.
    #[arg(long)]
    pub count: Option<usize>,
}

impl ListenArgs {
    pub fn run(self, config: &WatchConfig) -> Result<()> {
        let socket = super::resolve_socket(self.socket, config)?;
        let subscription = subscribe(&socket)
            .with_context(|| format!("failed to subscribe at {}", socket.display()))?;

        let limit = self.count.unwrap_or(usize::MAX);
        for notification in subscription.take(limit) {
            let notification = notification.context("failed to read notification")?;
            println!(
                "{}",
                serde_json::to_string(&notification).context("failed to render notification")?
            );
        }
        Ok(())
    }
}
