//! Cooperative shutdown
//!
//! A run is either running or shutting down. The transition is one-way:
//! once shutdown is requested the cancellation token stays cancelled, the
//! fetcher stops issuing requests, and the controller writes its final
//! checkpoint and output before returning.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Running,
    ShuttingDown,
}

/// Owns the run's cancellation token
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token consulted before every fetch and enrichment step
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn phase(&self) -> RunPhase {
        if self.token.is_cancelled() {
            RunPhase::ShuttingDown
        } else {
            RunPhase::Running
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.phase() == RunPhase::ShuttingDown
    }

    /// Moves the run to [`RunPhase::ShuttingDown`]; repeated calls are no-ops
    pub fn request_shutdown(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Shutdown requested, saving progress...");
            self.token.cancel();
        }
    }

    /// Spawns a task that requests shutdown on SIGINT or SIGTERM
    ///
    /// The task ends when a signal arrives or the token is cancelled by
    /// other means.
    pub fn spawn_signal_listener(&self) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = wait_for_signal() => coordinator.request_shutdown(),
                _ = coordinator.token.cancelled() => {}
            }
        })
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    // Registration can fail in restricted environments.
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
