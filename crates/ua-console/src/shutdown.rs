// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Signal handling.
//!
//! Ctrl+C (and SIGTERM on Unix) cancel a shared [`CancellationToken`]. The
//! token is handed to reverse connect waits so an operator can abort a
//! wait for a server that never dials in.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// =============================================================================
// ShutdownCoordinator
// =============================================================================

/// Turns OS signals into cancellation.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Creates a coordinator without signal handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a coordinator and spawns the signal watcher.
    pub fn install() -> Self {
        let coordinator = Self::new();
        let token = coordinator.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = wait_for_signal() => {
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        });
        coordinator
    }

    /// Returns the shared cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancels everything waiting on the token.
    pub fn initiate_shutdown(&self) {
        if !self.token.is_cancelled() {
            info!("Shutdown initiated");
            self.token.cancel();
        }
    }

    /// Returns `true` once shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "Failed to register SIGTERM handler");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = ctrl_c() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C"),
        Err(e) => {
            warn!(error = %e, "Failed to register Ctrl+C handler");
            std::future::pending::<()>().await
        }
    }
}
