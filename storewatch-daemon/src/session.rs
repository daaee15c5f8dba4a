//! Start/stop lifecycle tying the watcher, coalescer and notifier together.
//!
//! ```text
//! Starting ──► Running ──stop()──► Stopping ──notifier joined──► Stopped
//!    │
//!    └── WatchStartError (no session)
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use storewatch_core::config::{DEFAULT_EVENT_NAME, DEFAULT_SETTLE_MS};
use storewatch_core::{WatchConfig, WatchTarget, DEFAULT_JOURNAL_SUFFIX};

use crate::coalesce::UpdateCoalescer;
use crate::error::WatchStartError;
use crate::fs_watcher::FileSystemWatcher;
use crate::notifier::NotifierLoop;
use crate::sink::BroadcastSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub journal_suffix: String,
    pub event_name: String,
    pub settle: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            journal_suffix: DEFAULT_JOURNAL_SUFFIX.to_string(),
            event_name: DEFAULT_EVENT_NAME.to_string(),
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
        }
    }
}

impl From<&WatchConfig> for WatchOptions {
    fn from(config: &WatchConfig) -> Self {
        Self {
            journal_suffix: config.journal_suffix.clone(),
            event_name: config.event_name.clone(),
            settle: config.settle(),
        }
    }
}

struct Running {
    watcher: FileSystemWatcher,
    notifier: NotifierLoop,
}

/// One live watch: a platform watcher feeding a notifier thread.
///
/// Sessions share nothing with each other. Dropping a session stops it.
pub struct WatchSession {
    target: WatchTarget,
    coalescer: Arc<UpdateCoalescer>,
    state: Mutex<SessionState>,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("target", &self.target)
            .field("state", &self.state())
            .finish()
    }
}

/// Watch `db_path` with default options, publishing to `sink` on every settled change.
pub fn watch(
    db_path: impl AsRef<Path>,
    sink: Arc<dyn BroadcastSink>,
) -> Result<WatchSession, WatchStartError> {
    watch_with(db_path, sink, &WatchOptions::default())
}

pub fn watch_with(
    db_path: impl AsRef<Path>,
    sink: Arc<dyn BroadcastSink>,
    options: &WatchOptions,
) -> Result<WatchSession, WatchStartError> {
    let target = WatchTarget::resolve(db_path, &options.journal_suffix)?;
    let coalescer = Arc::new(UpdateCoalescer::new());

    let watcher = {
        let coalescer = coalescer.clone();
        FileSystemWatcher::start(&target, move || coalescer.signal())?
    };

    let notifier = match NotifierLoop::spawn(
        coalescer.clone(),
        sink,
        options.event_name.clone(),
        options.settle,
    ) {
        Ok(notifier) => notifier,
        Err(err) => {
            watcher.stop();
            return Err(err);
        }
    };

    tracing::info!(
        database = %target.db_path().display(),
        journal = %target.journal_path().display(),
        event = %options.event_name,
        "watch session started",
    );

    Ok(WatchSession {
        target,
        coalescer,
        state: Mutex::new(SessionState::Running),
        running: Mutex::new(Some(Running { watcher, notifier })),
    })
}

impl WatchSession {
    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Tear the session down and wait for the notifier thread to exit.
    ///
    /// No publish happens after this returns. Safe to call repeatedly and from
    /// any thread; concurrent callers all return once teardown has finished.
    pub fn stop(&self) {
        let mut running = self.running.lock();
        let Some(Running { watcher, notifier }) = running.take() else {
            return;
        };
        *self.state.lock() = SessionState::Stopping;

        watcher.stop();
        self.coalescer.request_stop();
        notifier.join();

        *self.state.lock() = SessionState::Stopped;
        tracing::info!(database = %self.target.db_path().display(), "watch session stopped");
    }

    /// The session as a zero-argument stop function.
    pub fn into_stop_fn(self) -> impl Fn() + Send + Sync + 'static {
        move || self.stop()
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use std::time::Instant;

    fn null_sink() -> Arc<dyn BroadcastSink> {
        Arc::new(|_: &str| -> Result<(), PublishError> { Ok(()) })
    }

    #[test]
    fn missing_directory_fails_to_start() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let err = watch(dir.path().join("gone").join("params.db"), null_sink()).unwrap_err();
        assert!(matches!(err, WatchStartError::Target(_)), "got: {err}");
    }

    #[test]
    fn state_moves_from_running_to_stopped() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let session = watch(dir.path().join("params.db"), null_sink()).expect("watch");
        assert_eq!(session.state(), SessionState::Running);
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn concurrent_stops_do_not_deadlock() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let session = Arc::new(watch(dir.path().join("params.db"), null_sink()).expect("watch"));

        let started = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let session = session.clone();
                std::thread::spawn(move || session.stop())
            })
            .collect();
        for handle in handles {
            handle.join().expect("join stopper");
        }
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn stop_fn_is_callable_twice() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let stop = watch(dir.path().join("params.db"), null_sink())
            .expect("watch")
            .into_stop_fn();
        stop();
        stop();
    }
}
