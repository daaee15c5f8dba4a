//! Platform file-system watch scoped to the store's directory.
//!
//! The directory is watched non-recursively; each raw event is classified
//! against the [`WatchTarget`] and only qualifying events reach the callback.

use std::path::PathBuf;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use storewatch_core::WatchTarget;

use crate::error::WatchStartError;

pub struct FileSystemWatcher {
    directory: PathBuf,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl std::fmt::Debug for FileSystemWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemWatcher")
            .field("directory", &self.directory)
            .field("running", &self.is_running())
            .finish()
    }
}

impl FileSystemWatcher {
    /// Start watching `target.directory()`. `on_update` runs on the platform's
    /// event-delivery thread for every qualifying event.
    pub fn start<F>(target: &WatchTarget, on_update: F) -> Result<Self, WatchStartError>
    where
        F: Fn() + Send + 'static,
    {
        let directory = target.directory().to_path_buf();
        let filter = target.clone();

        let mut watcher = recommended_watcher(move |event: notify::Result<Event>| match event {
            Ok(event) => {
                if is_qualifying(&filter, &event) {
                    tracing::trace!(kind = ?event.kind, paths = ?event.paths, "qualifying event");
                    on_update();
                }
            }
            Err(err) => tracing::warn!(error = %err, "watcher event error"),
        })
        .map_err(|source| WatchStartError::Watch {
            path: directory.clone(),
            source,
        })?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|source| WatchStartError::Watch {
                path: directory.clone(),
                source,
            })?;
        tracing::debug!(path = %directory.display(), "watching store directory");

        Ok(Self {
            directory,
            watcher: Mutex::new(Some(watcher)),
        })
    }

    /// Stop delivering events and release the platform watch. Idempotent.
    pub fn stop(&self) {
        let Some(mut watcher) = self.watcher.lock().take() else {
            return;
        };
        if let Err(err) = watcher.unwatch(&self.directory) {
            // The directory may already be gone; dropping the watcher still frees it.
            tracing::debug!(path = %self.directory.display(), error = %err, "unwatch failed");
        }
    }

    pub fn is_running(&self) -> bool {
        self.watcher.lock().is_some()
    }
}

impl Drop for FileSystemWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Whether `event` should mark the store as updated.
///
/// Access events (open, read, close) never qualify: clients re-reading the
/// store after a notification must not trigger another one.
pub(crate) fn is_qualifying(target: &WatchTarget, event: &Event) -> bool {
    // The platform dropped events; one of them may have been ours.
    if event.need_rescan() {
        return true;
    }
    if !is_relevant_event_kind(&event.kind) {
        return false;
    }
    event.paths.iter().any(|path| target.matches(path))
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}
