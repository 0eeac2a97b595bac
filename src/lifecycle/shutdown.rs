//! Shutdown coordination.

use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// The HTTP server and the file watcher both wait on the same signal; it is
/// level-triggered, so a subscriber that arrives late still observes it.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Future resolving once [`trigger`](Self::trigger) has been called.
    pub fn wait(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // An error means the sender is gone, which also ends the wait.
            let _ = rx.wait_for(|triggered| *triggered).await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
