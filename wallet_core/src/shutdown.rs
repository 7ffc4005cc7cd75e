//! Stop signal for the wallet's background tasks.
//!
//! A task calls [`ShutdownController::subscribe`] and `select!`s on the
//! receiver next to its own work. [`ShutdownController::shutdown`] wakes
//! every receiver at once.

use tokio::sync::broadcast;

pub struct ShutdownController {
    tx: broadcast::Sender<()>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Notify every subscriber. Returns how many were listening.
    pub fn shutdown(&self) -> usize {
        self.tx.send(()).unwrap_or(0)
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_notifies_subscriber() {
        let controller = ShutdownController::new();
        let mut rx = controller.subscribe();
        assert_eq!(controller.shutdown(), 1);
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn every_subscriber_is_notified() {
        let controller = ShutdownController::new();
        let mut first = controller.subscribe();
        let mut second = controller.subscribe();
        controller.shutdown();
        assert!(first.recv().await.is_ok());
        assert!(second.recv().await.is_ok());
    }

    #[test]
    fn shutdown_without_subscribers_is_harmless() {
        assert_eq!(ShutdownController::new().shutdown(), 0);
    }
}
