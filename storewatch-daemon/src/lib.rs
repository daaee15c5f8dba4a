//! Live-update notifications for a watched store file.
//!
//! A platform watch on the store's directory feeds an [`UpdateCoalescer`];
//! a notifier thread drains it and publishes one event per settled burst to
//! a [`BroadcastSink`]. [`run`] wraps that in a Unix-socket server that fans
//! events out to subscribers.

pub mod coalesce;
mod error;
pub mod fs_watcher;
pub mod notifier;
pub mod protocol;
mod runtime;
pub mod session;
pub mod sink;

pub use coalesce::{UpdateCoalescer, Wake};
pub use error::{DaemonError, PublishError, WatchStartError};
pub use protocol::{request_status, request_stop, send_request, subscribe, Request, Response, Subscription};
pub use runtime::{init_tracing, run, serve_blocking, ServeOptions};
pub use session::{watch, watch_with, SessionState, WatchOptions, WatchSession};
pub use sink::{BroadcastHub, BroadcastSink, Notification};
