//! # Reconciliation Scheduler
//!
//! Runs reconciliation sweeps with a fixed delay between the end of one sweep and
//! the start of the next. Sweeps never overlap. The loop stops when the shutdown
//! channel flips to `true` or its sender is dropped.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::run_sets_poller::SmartRunSetsPoller;
use crate::logging::log_error;

pub struct ReconciliationScheduler {
    poller: Arc<SmartRunSetsPoller>,
    interval: Duration,
}

impl ReconciliationScheduler {
    pub fn new(poller: Arc<SmartRunSetsPoller>, interval: Duration) -> Self {
        Self { poller, interval }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "Reconciliation scheduler started");
        let mut sweeps: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            sweeps += 1;
            match self.poller.reconcile_all().await {
                Ok(result) => debug!(
                    sweep = sweeps,
                    total_updated = result.total_updated,
                    fully_updated = result.fully_updated,
                    "Sweep complete"
                ),
                Err(e) => log_error("scheduler", "reconcile_all", &e.to_string(), None),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(sweeps, "Reconciliation scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollingConfig;
    use crate::monitoring::SmartRunsPoller;
    use crate::orchestration::RunCompletionHandler;
    use crate::state_machine::CbasRunSetStatus;
    use crate::test_helpers::{
        method_version, run_set, InMemoryRunStore, MockExecutionEngine, MockRecordSink,
    };

    #[tokio::test]
    async fn test_scheduler_sweeps_and_stops_on_shutdown() {
        let store = Arc::new(InMemoryRunStore::new());
        let engine = Arc::new(MockExecutionEngine::new());
        let version = method_version();
        let tracked = run_set(version.method_version_id, CbasRunSetStatus::Running, &[], &[]);
        let polled_before = tracked.last_polled_timestamp;
        store.insert_run_set(tracked.clone());

        let polling = PollingConfig::default();
        let completion = Arc::new(RunCompletionHandler::new(
            store.clone(),
            engine.clone(),
            Arc::new(MockRecordSink::new()),
        ));
        let runs_poller = SmartRunsPoller::new(store.clone(), engine, completion, &polling);
        let poller = Arc::new(SmartRunSetsPoller::new(store.clone(), runs_poller, &polling));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle =
            ReconciliationScheduler::new(poller, Duration::from_secs(3600)).spawn(shutdown_rx);

        for _ in 0..100 {
            let polled = store
                .run_set(tracked.run_set_id)
                .map(|rs| rs.last_polled_timestamp);
            if polled != Some(polled_before) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // A run set without runs aggregates to complete
        assert_eq!(
            store.run_set(tracked.run_set_id).unwrap().status,
            CbasRunSetStatus::Complete
        );

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
