//! Interrupt handling for waiting lock acquisitions
//!
//! A [`ShutdownSignal`] is a broadcast channel; receivers passed to
//! [`LockManager::acquire_interruptible`](crate::LockManager::acquire_interruptible)
//! abort their wait when it fires.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

/// Shutdown signal sender and receiver
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Create a new shutdown signal with a broadcast channel
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    /// Get a receiver for shutdown notifications
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Trigger shutdown
    pub fn shutdown(&self) {
        let _ = self.sender.send(());
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once the receiver observes a shutdown.
///
/// A lagged receiver has missed at least one signal and counts as shut down.
/// A closed channel can never fire, so it never resolves.
pub(crate) async fn interrupted(rx: &mut broadcast::Receiver<()>) {
    match rx.recv().await {
        Ok(()) | Err(RecvError::Lagged(_)) => {}
        Err(RecvError::Closed) => std::future::pending::<()>().await,
    }
}

/// Wait for Ctrl+C or SIGTERM and broadcast shutdown.
///
/// Returns immediately with the signal; the OS listener runs in the background.
pub fn wait_for_shutdown_signal() -> ShutdownSignal {
    let shutdown = ShutdownSignal::new();
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C, interrupting lock wait...");
            }
            _ = terminate => {
                info!("Received SIGTERM, interrupting lock wait...");
            }
        }

        shutdown_clone.shutdown();
    });

    shutdown
}
