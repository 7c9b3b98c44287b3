// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! A run ends on the first of: Ctrl-C / SIGTERM, the end of the run
//! duration, or an explicit [`ShutdownCoordinator::initiate_shutdown`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl-C or SIGTERM.
    Signal,
    /// The run duration elapsed.
    Deadline,
    /// [`ShutdownCoordinator::initiate_shutdown`] was called.
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal => write!(f, "signal"),
            ShutdownReason::Deadline => write!(f, "deadline"),
            ShutdownReason::Requested => write!(f, "requested"),
        }
    }
}

/// Coordinates graceful shutdown. Clones share the same state.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    reason: Arc<watch::Sender<Option<ShutdownReason>>>,
}

impl ShutdownCoordinator {
    /// Creates a coordinator that has not shut down.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            reason: Arc::new(sender),
        }
    }

    /// Requests shutdown.
    pub fn initiate_shutdown(&self) {
        self.finish(ShutdownReason::Requested);
    }

    /// Returns the reason once shutdown started.
    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.reason.borrow()
    }

    /// Returns `true` once shutdown started.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.reason().is_some()
    }

    /// Records `reason` unless shutdown already started.
    fn finish(&self, reason: ShutdownReason) -> ShutdownReason {
        let mut first = false;
        self.reason.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                first = true;
            }
            first
        });
        if first {
            info!(%reason, "Shutdown initiated");
        }
        self.reason().unwrap_or(reason)
    }

    /// Waits for a signal, a request, or the end of `deadline`.
    pub async fn wait_for_shutdown(&self, deadline: Option<Duration>) -> ShutdownReason {
        let mut receiver = self.reason.subscribe();

        let requested = async {
            loop {
                if let Some(reason) = *receiver.borrow_and_update() {
                    return reason;
                }
                if receiver.changed().await.is_err() {
                    return ShutdownReason::Requested;
                }
            }
        };
        let elapsed = async {
            match deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            reason = requested => reason,
            _ = elapsed => self.finish(ShutdownReason::Deadline),
            _ = os_signal() => self.finish(ShutdownReason::Signal),
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "Failed to register SIGTERM handler");
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn os_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl-C");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_wakes_waiter() {
        let coordinator = ShutdownCoordinator::new();
        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.wait_for_shutdown(None).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        coordinator.initiate_shutdown();
        coordinator.initiate_shutdown();

        let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, ShutdownReason::Requested);
    }

    #[tokio::test]
    async fn test_deadline_ends_wait() {
        let coordinator = ShutdownCoordinator::new();
        let reason = coordinator.wait_for_shutdown(Some(Duration::from_millis(20))).await;

        assert_eq!(reason, ShutdownReason::Deadline);
        assert_eq!(coordinator.reason(), Some(ShutdownReason::Deadline));

        // The first reason sticks.
        coordinator.initiate_shutdown();
        assert_eq!(coordinator.reason(), Some(ShutdownReason::Deadline));
    }

    #[tokio::test]
    async fn test_wait_returns_when_already_initiated() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown();
        let reason = tokio::time::timeout(Duration::from_millis(100), coordinator.wait_for_shutdown(None))
            .await
            .unwrap();
        assert_eq!(reason, ShutdownReason::Requested);
    }
}
