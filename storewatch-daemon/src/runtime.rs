use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use storewatch_core::WatchConfig;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::error::{io_err, DaemonError};
use crate::protocol::{Request, Response};
use crate::session::{watch_with, WatchOptions, WatchSession};
use crate::sink::{BroadcastHub, Notification};

/// Everything the server needs, already merged from config file and flags.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub db_path: PathBuf,
    pub socket: PathBuf,
    pub watch: WatchOptions,
    pub channel_capacity: usize,
    pub log_filter: String,
    pub log_json: bool,
}

impl ServeOptions {
    pub fn new(db_path: impl Into<PathBuf>, socket: impl Into<PathBuf>, config: &WatchConfig) -> Self {
        Self {
            db_path: db_path.into(),
            socket: socket.into(),
            watch: WatchOptions::from(config),
            channel_capacity: config.channel_capacity,
            log_filter: config.log_filter.clone(),
            log_json: false,
        }
    }
}

struct ServerContext {
    hub: Arc<BroadcastHub>,
    session: Arc<WatchSession>,
    event_name: String,
    socket: PathBuf,
    started_at_unix: u64,
}

/// Start the server and block the current thread until it exits.
pub fn serve_blocking(options: ServeOptions) -> Result<(), DaemonError> {
    init_tracing(&options.log_filter, options.log_json);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(options))
}

/// Watch the store and fan notifications out over the socket until ctrl-c
/// or a `stop` request.
///
/// A [`crate::WatchStartError`] is returned before the socket is bound.
pub async fn run(options: ServeOptions) -> Result<(), DaemonError> {
    let hub = Arc::new(BroadcastHub::new(options.channel_capacity));
    let session = Arc::new(watch_with(&options.db_path, hub.clone(), &options.watch)?);

    let ctx = Arc::new(ServerContext {
        hub,
        session: session.clone(),
        event_name: options.watch.event_name.clone(),
        socket: options.socket.clone(),
        started_at_unix: unix_seconds_now(),
    });

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let ctx = ctx.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = socket_server_task(ctx, shutdown.clone(), shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);

    // Joins the notifier thread.
    tokio::task::spawn_blocking(move || session.stop())
        .await
        .map_err(|err| DaemonError::Protocol(format!("session stop join error: {err}")))?;

    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn socket_server_task(
    ctx: Arc<ServerContext>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = ctx.socket.clone();
    if let Some(parent) = socket.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening for subscribers");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let ctx = ctx.clone();
                let shutdown_tx = shutdown_tx.clone();
                let shutdown_rx = shutdown_tx.subscribe();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, ctx, shutdown_tx, shutdown_rx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    ctx: Arc<ServerContext>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("server socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<Request>(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &Response::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        match request.cmd.as_str() {
            "status" => {
                write_response(&mut writer, &Response::ok(build_status_payload(&ctx))).await?;
            }
            "subscribe" => {
                // Subscribe before acknowledging so nothing published after the ack is missed.
                let notifications = ctx.hub.subscribe();
                write_response(
                    &mut writer,
                    &Response::ok(json!({ "event": ctx.event_name })),
                )
                .await?;
                return stream_notifications(writer, lines, notifications, shutdown_rx).await;
            }
            "stop" => {
                // Reply before signalling shutdown; the runtime may exit right after.
                write_response(&mut writer, &Response::ok(json!({ "stopping": true }))).await?;
                let _ = shutdown_tx.send(());
                break;
            }
            other => {
                write_response(
                    &mut writer,
                    &Response::error(format!("unknown command '{other}'")),
                )
                .await?;
            }
        }
    }

    Ok(())
}

/// Forward hub notifications to one subscriber until it disconnects or the server stops.
async fn stream_notifications(
    mut writer: OwnedWriteHalf,
    mut lines: Lines<BufReader<OwnedReadHalf>>,
    mut notifications: broadcast::Receiver<Notification>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            incoming = lines.next_line() => match incoming {
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            },
            received = notifications.recv() => match received {
                Ok(notification) => {
                    if let Err(err) = write_line(&mut writer, &notification).await {
                        tracing::debug!(error = %err, "subscriber went away");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "subscriber lagged; skipping to latest");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

fn build_status_payload(ctx: &ServerContext) -> Value {
    let target = ctx.session.target();
    json!({
        "running": true,
        "state": ctx.session.state(),
        "database": target.db_path().display().to_string(),
        "journal": target.journal_path().display().to_string(),
        "event": ctx.event_name,
        "subscribers": ctx.hub.subscriber_count(),
        "published": ctx.hub.published(),
        "started_at_unix": ctx.started_at_unix,
        "socket": ctx.socket.display().to_string(),
    })
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "server socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> Result<(), DaemonError> {
    write_line(writer, response).await
}

async fn write_line<T: serde::Serialize>(
    writer: &mut OwnedWriteHalf,
    value: &T,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(value)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("server socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("server socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("server socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the global subscriber. `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
