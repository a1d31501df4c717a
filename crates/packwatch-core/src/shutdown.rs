//! Cooperative shutdown signalling.
//!
//! A single [`ShutdownHandle`] is held by whatever observes termination
//! signals; any number of [`Shutdown`] receivers can be polled or awaited
//! at suspension points. A dropped handle counts as a trigger.

use tokio::sync::watch;

/// Creates a linked trigger/receiver pair.
pub fn channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}

/// Triggers shutdown for all linked [`Shutdown`] receivers.
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        // Receivers may already be gone during teardown.
        let _ = self.tx.send(true);
    }
}

/// Observes a shutdown trigger.
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once shutdown is requested.
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Handle dropped without triggering: treat as shutdown.
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_is_observed() {
        let (handle, mut shutdown) = channel();
        assert!(!shutdown.is_triggered());

        handle.trigger();
        shutdown.triggered().await;
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_dropped_handle_counts_as_trigger() {
        let (handle, mut shutdown) = channel();
        drop(handle);
        // must not hang
        shutdown.triggered().await;
    }

    #[tokio::test]
    async fn test_clones_share_the_signal() {
        let (handle, shutdown) = channel();
        let mut second = shutdown.clone();
        handle.trigger();
        second.triggered().await;
        assert!(shutdown.is_triggered());
    }
}
