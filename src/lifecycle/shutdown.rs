//! Shutdown coordination for the endpoints.

use tokio::sync::broadcast;

/// Coordinator for stopping accept loops.
///
/// Endpoints subscribe before they start serving; `trigger` makes every
/// subscriber's `recv` resolve. Sessions already running are not drained.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Trigger shutdown on the first Ctrl+C.
    pub fn trigger_on_ctrl_c(&self) {
        let shutdown = self.clone();
        tokio::spawn(async move {
            crate::lifecycle::signals::wait_for_ctrl_c().await;
            shutdown.trigger();
        });
    }
}

/// Resolve when shutdown is triggered.
///
/// A dropped coordinator can never trigger, so a closed channel waits forever
/// instead of stopping the caller.
pub async fn signalled(rx: &mut broadcast::Receiver<()>) {
    if let Err(broadcast::error::RecvError::Closed) = rx.recv().await {
        std::future::pending::<()>().await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
