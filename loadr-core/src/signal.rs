use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// One-shot stop request. Once set it stays set.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            self.notify.notify_waiters();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Resolves once [`stop`](Self::stop) has been called.
    pub async fn stopped(&self) {
        // A `Notified` future observes `notify_waiters` from the moment it is created.
        let notified = self.notify.notified();
        if self.is_stopped() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn stopped_resolves_after_stop() {
        let signal = Arc::new(StopSignal::new());
        let waiter = tokio::spawn({
            let signal = Arc::clone(&signal);
            async move { signal.stopped().await }
        });

        tokio::task::yield_now().await;
        assert!(!signal.is_stopped());
        signal.stop();

        let joined = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(matches!(joined, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn stopped_returns_immediately_when_already_stopped() {
        let signal = StopSignal::new();
        signal.stop();
        signal.stop();
        signal.stopped().await;
        assert!(signal.is_stopped());
    }
}
