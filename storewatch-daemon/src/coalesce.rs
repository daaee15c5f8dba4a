//! Single-slot "update pending" signal shared by the watcher and the notifier.
//!
//! Any number of [`UpdateCoalescer::signal`] calls between two waits collapse
//! into one [`Wake::Updated`]. The flag is a boolean, not a counter.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Upper bound on how long a continuous write stream can hold back a
/// notification, as a multiple of the settle window.
const MAX_SETTLE_FACTOR: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Updated,
    Stopped,
}

#[derive(Debug, Default)]
struct State {
    pending: bool,
    stop_requested: bool,
}

#[derive(Debug, Default)]
pub struct UpdateCoalescer {
    state: Mutex<State>,
    changed: Condvar,
}

impl UpdateCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an update as pending and wake the waiter. Never blocks beyond the
    /// short critical section.
    pub fn signal(&self) {
        let mut state = self.state.lock();
        state.pending = true;
        drop(state);
        self.changed.notify_one();
    }

    /// Ask the waiter to exit. Sticky for the lifetime of the coalescer.
    pub fn request_stop(&self) {
        let mut state = self.state.lock();
        state.stop_requested = true;
        drop(state);
        self.changed.notify_all();
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    pub fn is_stop_requested(&self) -> bool {
        self.state.lock().stop_requested
    }

    /// Block until an update is pending (clearing it) or stop is requested.
    ///
    /// A stop request wins over a pending update.
    pub fn wait(&self) -> Wake {
        let mut state = self.state.lock();
        loop {
            if state.stop_requested {
                return Wake::Stopped;
            }
            if state.pending {
                state.pending = false;
                return Wake::Updated;
            }
            self.changed.wait(&mut state);
        }
    }

    /// Like [`wait`](Self::wait), but after the first signal keep absorbing
    /// signals until `settle` passes without one, so a burst of events from a
    /// single commit yields one wake.
    ///
    /// The burst is reported after at most `settle * 20` even if signals keep
    /// arriving. `Duration::ZERO` behaves exactly like `wait`.
    pub fn wait_settled(&self, settle: Duration) -> Wake {
        if settle.is_zero() {
            return self.wait();
        }

        let mut state = self.state.lock();
        loop {
            if state.stop_requested {
                return Wake::Stopped;
            }
            if state.pending {
                break;
            }
            self.changed.wait(&mut state);
        }

        let hard_deadline = Instant::now() + settle * MAX_SETTLE_FACTOR;
        loop {
            state.pending = false;
            let quiet_deadline = (Instant::now() + settle).min(hard_deadline);
            loop {
                if state.stop_requested {
                    return Wake::Stopped;
                }
                if state.pending {
                    break;
                }
                if self.changed.wait_until(&mut state, quiet_deadline).timed_out() {
                    break;
                }
            }
            if state.stop_requested {
                return Wake::Stopped;
            }
            if !state.pending || Instant::now() >= hard_deadline {
                state.pending = false;
                return Wake::Updated;
            }
        }
    }
}
