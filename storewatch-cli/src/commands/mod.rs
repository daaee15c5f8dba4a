pub mod control;
pub mod listen;
pub mod serve;

use std::path::PathBuf;

use anyhow::{Context, Result};
use storewatch_core::{paths, WatchConfig};

/// `--socket` wins, then the config file, then `~/.storewatch/storewatch.sock`.
pub fn resolve_socket(flag: Option<PathBuf>, config: &WatchConfig) -> Result<PathBuf> {
    if let Some(socket) = flag.or_else(|| config.socket.clone()) {
        return Ok(socket);
    }
    let home = paths::home().context("could not determine home directory")?;
    Ok(paths::socket_path_at(&home))
}
