// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Master Balance Monitor
//!
//! Background task that checks the master account balance on a fixed
//! interval (hourly by default) so operators are warned before top-ups start
//! failing. It never touches tenant accounts and runs independently of
//! request handling.
//!
//! ## Shutdown
//!
//! Stopped through a `tokio_util::sync::CancellationToken`, the same token the
//! HTTP server uses for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::gas::GasCustodian;

/// Default interval between master balance checks.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(3600);

pub struct HealthMonitor {
    custodian: Arc<GasCustodian>,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(custodian: Arc<GasCustodian>, interval: Duration) -> Self {
        Self {
            custodian,
            interval,
        }
    }

    /// Wait for a spawned monitor task, logging a panic or abort.
    ///
    /// Returns whether the task exited cleanly.
    pub async fn join(task: JoinHandle<()>) -> bool {
        match task.await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Master balance monitor task failed");
                false
            }
        }
    }

    /// Run checks until `shutdown` is cancelled, starting immediately.
    ///
    /// ```rust,ignore
    /// tokio::spawn(monitor.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Master balance monitor starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            // Low balances are logged by the custodian itself.
            if let Err(e) = self.custodian.check_master_health().await {
                warn!(error = %e, "Master balance check failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => break,
            }
        }

        info!("Master balance monitor shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{master_secret, test_policy, MockChain};
    use crate::wallet::signer::DerivedKeySigner;

    #[tokio::test]
    async fn checks_on_interval_until_cancelled() {
        let chain = Arc::new(MockChain::new());
        let master = DerivedKeySigner::from_master(&master_secret()).unwrap();
        let custodian = Arc::new(GasCustodian::new(chain.clone(), master, test_policy()));

        let shutdown = CancellationToken::new();
        let monitor = HealthMonitor::new(custodian, Duration::from_millis(10));
        let task = tokio::spawn(monitor.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(55)).await;
        shutdown.cancel();
        let clean = tokio::time::timeout(Duration::from_secs(1), HealthMonitor::join(task))
            .await
            .expect("monitor stops after cancellation");
        assert!(clean);

        let reads = chain.balance_reads();
        assert!(reads >= 2, "expected repeated checks, saw {reads}");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(chain.balance_reads(), reads);
    }

    #[tokio::test]
    async fn cancelled_before_start_does_nothing() {
        let chain = Arc::new(MockChain::new());
        let master = DerivedKeySigner::from_master(&master_secret()).unwrap();
        let custodian = Arc::new(GasCustodian::new(chain.clone(), master, test_policy()));

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        HealthMonitor::new(custodian, DEFAULT_HEALTH_CHECK_INTERVAL)
            .run(shutdown)
            .await;
        assert_eq!(chain.balance_reads(), 0);
    }

    #[tokio::test]
    async fn join_reports_panicked_task() {
        let task: JoinHandle<()> = tokio::spawn(async { panic!("monitor crashed") });
        assert!(!HealthMonitor::join(task).await);
    }
}
