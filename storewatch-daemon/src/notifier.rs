//! Background thread turning coalesced wakes into broadcasts.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::coalesce::{UpdateCoalescer, Wake};
use crate::error::WatchStartError;
use crate::sink::BroadcastSink;

pub struct NotifierLoop {
    handle: JoinHandle<()>,
}

impl NotifierLoop {
    /// Spawn the loop. It publishes `event` once per [`Wake::Updated`] and
    /// exits on [`Wake::Stopped`].
    pub fn spawn(
        coalescer: Arc<UpdateCoalescer>,
        sink: Arc<dyn BroadcastSink>,
        event: String,
        settle: Duration,
    ) -> Result<Self, WatchStartError> {
        let handle = thread::Builder::new()
            .name("storewatch-notifier".to_string())
            .spawn(move || run(&coalescer, sink.as_ref(), &event, settle))
            .map_err(WatchStartError::Notifier)?;
        Ok(Self { handle })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the thread to exit. The coalescer must already have been asked to stop.
    pub fn join(self) {
        if self.handle.join().is_err() {
            tracing::error!("notifier thread panicked");
        }
    }
}

fn run(coalescer: &UpdateCoalescer, sink: &dyn BroadcastSink, event: &str, settle: Duration) {
    loop {
        match coalescer.wait_settled(settle) {
            Wake::Stopped => break,
            Wake::Updated => match sink.publish(event) {
                Ok(()) => tracing::debug!(event, "published store update"),
                // Not retried: the next change publishes again.
                Err(err) => tracing::warn!(event, error = %err, "failed to publish store update"),
            },
        }
    }
    tracing::debug!("notifier loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use parking_lot::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct FlakySink {
        attempts: Mutex<usize>,
    }

    impl BroadcastSink for FlakySink {
        fn publish(&self, _event: &str) -> Result<(), PublishError> {
            let mut attempts = self.attempts.lock();
            *attempts += 1;
            if *attempts == 1 {
                Err(PublishError::Closed)
            } else {
                Ok(())
            }
        }
    }

    fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn publish_failure_does_not_end_loop() {
        let coalescer = Arc::new(UpdateCoalescer::new());
        let sink = Arc::new(FlakySink::default());
        let notifier = NotifierLoop::spawn(
            coalescer.clone(),
            sink.clone(),
            "database_update".to_string(),
            Duration::ZERO,
        )
        .expect("spawn");

        coalescer.signal();
        assert!(wait_for(Duration::from_secs(1), || *sink.attempts.lock() == 1));
        assert!(!notifier.is_finished(), "loop must survive a failed publish");

        coalescer.signal();
        assert!(wait_for(Duration::from_secs(1), || *sink.attempts.lock() == 2));

        coalescer.request_stop();
        notifier.join();
    }
}
