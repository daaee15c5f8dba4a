//! storewatch — notify connected viewers when a store file changes.
//!
//! # Usage
//!
//! ```text
//! storewatch [--config <file>] serve <db_path> [--socket <path>] [--settle-ms <n>] [--log-json]
//! storewatch [--config <file>] listen [--socket <path>] [--count <n>]
//! storewatch [--config <file>] status [--socket <path>]
//! storewatch [--config <file>] stop [--socket <path>]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{control::SocketArgs, listen::ListenArgs, serve::ServeArgs};

#[derive(Parser, Debug)]
#[command(
    name = "storewatch",
    version,
    about = "Watch a database file and notify subscribers when it changes",
    long_about = None,
)]
struct Cli {
    /// Config file (default: ~/.storewatch/config.yaml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch a database file and serve change notifications in the foreground.
    Serve(ServeArgs),

    /// Print change notifications from a running server as JSON lines.
    Listen(ListenArgs),

    /// Show the running server's status as JSON.
    Status(SocketArgs),

    /// Ask the running server to shut down.
    Stop(SocketArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = storewatch_core::config::load(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Serve(args) => args.run(&config),
        Commands::Listen(args) => args.run(&config),
        Commands::Status(args) => commands::control::status(args, &config),
        Commands::Stop(args) => commands::control::stop(args, &config),
    }
}
