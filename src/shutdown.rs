//! Graceful shutdown handling

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

/// Shutdown coordinator
///
/// The signal is sticky: subscribers created or polled after shutdown still
/// observe it.
pub struct ShutdownCoordinator {
    tx: watch::Sender<bool>,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Get a shutdown notifier
    pub fn subscribe(&self) -> ShutdownNotifier {
        ShutdownNotifier {
            rx: self.tx.subscribe(),
        }
    }

    /// Wait for Ctrl+C or SIGTERM, then notify subscribers
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C signal");
            }
            _ = terminate => {
                info!("Received SIGTERM signal");
            }
        }

        self.shutdown();
    }

    /// Trigger shutdown manually
    pub fn shutdown(&self) {
        if !*self.tx.borrow() {
            info!("Shutdown triggered");
        }
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Shutdown notifier for components
#[derive(Clone)]
pub struct ShutdownNotifier {
    rx: watch::Receiver<bool>,
}

impl ShutdownNotifier {
    /// Resolve once shutdown has been signaled or the coordinator is gone
    pub async fn wait(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Check if shutdown has been signaled (non-blocking)
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_coordinator() {
        let coordinator = ShutdownCoordinator::new();
        let mut notifier = coordinator.subscribe();

        let handle = tokio::spawn(async move {
            notifier.wait().await;
            true
        });

        coordinator.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert!(result);
        assert!(coordinator.is_shutdown());
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.shutdown();

        let mut notifier = coordinator.subscribe();
        assert!(notifier.is_shutdown());
        tokio::time::timeout(Duration::from_millis(100), notifier.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_coordinator_releases_waiters() {
        let coordinator = ShutdownCoordinator::new();
        let mut notifier = coordinator.subscribe();
        drop(coordinator);

        tokio::time::timeout(Duration::from_millis(100), notifier.wait())
            .await
            .unwrap();
        assert!(!notifier.is_shutdown());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let coordinator = ShutdownCoordinator::new();
        let mut notifier1 = coordinator.subscribe();
        let mut notifier2 = coordinator.subscribe();

        let handle1 = tokio::spawn(async move {
            notifier1.wait().await;
            1
        });

        let handle2 = tokio::spawn(async move {
            notifier2.wait().await;
            2
        });

        coordinator.shutdown();

        assert_eq!(handle1.await.unwrap(), 1);
        assert_eq!(handle2.await.unwrap(), 2);
    }
}
