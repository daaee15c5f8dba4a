//! `storewatch status` / `storewatch stop`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use storewatch_core::WatchConfig;
use storewatch_daemon::{request_status, request_stop, DaemonError};

#[derive(Args, Debug)]
pub struct SocketArgs {
    /// Unix socket of the running server.
    #[arg(long)]
    pub socket: Option<PathBuf>,
}

pub fn status(args: SocketArgs, config: &WatchConfig) -> Result<()> {
    let socket = super::resolve_socket(args.socket, config)?;
    let payload = match request_status(&socket) {
        Ok(status) => status,
        Err(DaemonError::NotRunning { .. }) => serde_json::json!({
            "running": false,
            "socket": socket.display().to_string(),
        }),
        Err(err) => return Err(err).context("failed to query server status"),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to render status JSON")?
    );
    Ok(())
}

pub fn stop(args: SocketArgs, config: &WatchConfig) -> Result<()> {
    let socket = super::resolve_socket(args.socket, config)?;
    match request_stop(&socket) {
        Ok(()) => println!("server stop requested"),
        Err(DaemonError::NotRunning { .. }) => println!("server is not running"),
        Err(err) => return Err(err).context("failed to stop server"),
    }
    Ok(())
}
