//! One-shot and watch-mode runner
//!
//! Without a poll interval a single reconciliation pass runs. With one,
//! passes repeat on a tokio interval until SIGINT or SIGTERM; a pass in
//! progress always finishes before the runner stops.

use crate::bridge::{Bridge, PassSummary};
use crate::config::BridgeConfig;
use crate::integrations::zendesk::ZendeskDesk;
use crate::integrations::{Desk, JiraAdapter, Tracker};
use crate::metrics;
use crate::store::{IdempotencyStore, SqliteStore, StoreConfig};
use crate::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Bridge wired to the live JIRA and Zendesk adapters and the SQLite store
pub type LiveBridge = Bridge<JiraAdapter, ZendeskDesk, SqliteStore>;

/// Build adapters and store from configuration and connect the bridge
pub async fn connect(config: BridgeConfig) -> Result<LiveBridge> {
    let tracker = JiraAdapter::new(&config.tracker)?;
    let desk = ZendeskDesk::new(&config.desk)?;
    let store = SqliteStore::open(StoreConfig::from(&config.state))?;
    info!(path = %store.path().display(), "Opened state database");

    Bridge::connect(tracker, desk, store, config).await
}

/// Drives reconciliation passes
pub struct Runner<T, D, S> {
    bridge: Bridge<T, D, S>,
    poll_interval: Option<Duration>,
}

impl<T, D, S> Runner<T, D, S>
where
    T: Tracker,
    D: Desk,
    S: IdempotencyStore,
{
    pub fn new(bridge: Bridge<T, D, S>) -> Self {
        Self {
            bridge,
            poll_interval: None,
        }
    }

    /// Repeat passes every `interval` instead of running once
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn bridge(&self) -> &Bridge<T, D, S> {
        &self.bridge
    }

    /// Run according to the configured mode
    pub async fn run(&self) -> Result<()> {
        match self.poll_interval {
            None => self.run_once().await.map(|_| ()),
            Some(interval) => self.watch(interval).await.map(|_| ()),
        }
    }

    /// Run a single pass
    pub async fn run_once(&self) -> Result<PassSummary> {
        let result = self.bridge.sync().await;
        metrics::record_pass(result.is_ok());
        result
    }

    /// Run passes until SIGINT or SIGTERM
    #[cfg(unix)]
    pub async fn watch(&self, interval: Duration) -> Result<usize> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).map_err(|e| {
            crate::BridgeError::Other(format!("Failed to set up SIGTERM handler: {}", e))
        })?;
        let mut sigint = signal(SignalKind::interrupt()).map_err(|e| {
            crate::BridgeError::Other(format!("Failed to set up SIGINT handler: {}", e))
        })?;

        let shutdown = async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
                _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
            }
        };

        self.run_until(interval, shutdown).await
    }

    /// Run passes until Ctrl-C
    #[cfg(not(unix))]
    pub async fn watch(&self, interval: Duration) -> Result<usize> {
        let shutdown = async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C, initiating graceful shutdown");
            }
        };

        self.run_until(interval, shutdown).await
    }

    /// Run passes on `interval` until `shutdown` resolves
    ///
    /// A failed pass is logged and the loop carries on. Returns the number of
    /// passes started.
    pub async fn run_until<F>(&self, interval: Duration, shutdown: F) -> Result<usize>
    where
        F: Future<Output = ()>,
    {
        info!(interval_secs = interval.as_secs(), "Starting watch mode");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut passes = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    passes += 1;
                    match self.run_once().await {
                        Ok(summary) if summary.failed > 0 => {
                            warn!(failed = summary.failed, "Pass finished with failed issues");
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "Reconciliation pass failed"),
                    }
                }
                _ = &mut shutdown => break,
            }
        }

        info!(passes, "Watch mode stopped");
        Ok(passes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::fakes::{self, FakeDesk, FakeTracker};

    #[tokio::test]
    async fn test_run_once_syncs_every_issue() {
        let tracker = FakeTracker::new();
        tracker.insert_issue(fakes::issue("OPS-1", "Open", None));
        tracker.insert_issue(fakes::issue("OPS-2", "Open", Some("pat")));
        let bridge = fakes::bridge(tracker, FakeDesk::new(), fakes::config()).await;

        let summary = Runner::new(bridge).run_once().await.unwrap();
        assert_eq!(summary.synced, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let tracker = FakeTracker::new();
        tracker.insert_issue(fakes::issue("OPS-1", "Open", None));
        let bridge = fakes::bridge(tracker, FakeDesk::new(), fakes::config()).await;
        let runner = Runner::new(bridge);

        let passes = runner
            .run_until(
                Duration::from_millis(10),
                tokio::time::sleep(Duration::from_millis(60)),
            )
            .await
            .unwrap();

        // The first tick fires immediately
        assert!(passes >= 1);
        assert!(runner
            .bridge()
            .store()
            .get("ticket-for-issue:OPS-1")
            .unwrap()
            .is_some());
    }
}
