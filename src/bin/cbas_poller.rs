//! CBAS Poller Binary
//!
//! Runs the reconciliation scheduler against the configured database, engine,
//! and record service until interrupted.

use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

use cbas_core::clients::{BearerToken, CromwellClient, WdsClient};
use cbas_core::config::ConfigManager;
use cbas_core::database::{DatabaseConnection, PgRunStore, RunStore};
use cbas_core::logging::init_structured_logging;
use cbas_core::monitoring::{ReconciliationScheduler, SmartRunSetsPoller, SmartRunsPoller};
use cbas_core::orchestration::RunCompletionHandler;

/// Token the record sink uses when writing outputs back
const SERVICE_TOKEN_VAR: &str = "CBAS_SERVICE_TOKEN";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let manager = ConfigManager::load().context("loading configuration")?;
    let config = manager.config();
    info!(environment = %manager.environment(), "Starting CBAS poller");

    let database = DatabaseConnection::new(&config.database)
        .await
        .context("connecting to the database")?;
    database.health_check().await.context("database health check")?;
    database.run_migrations().await.context("applying migrations")?;
    let store: Arc<dyn RunStore> = Arc::new(PgRunStore::new(database.pool().clone()));

    let engine = Arc::new(CromwellClient::new(&config.engine).context("building engine client")?);
    let mut records = WdsClient::new(&config.records).context("building record client")?;
    if let Ok(token) = std::env::var(SERVICE_TOKEN_VAR) {
        records = records.with_service_token(BearerToken::new(token));
    }

    let completion = Arc::new(RunCompletionHandler::new(
        Arc::clone(&store),
        engine.clone(),
        Arc::new(records),
    ));
    let runs_poller = SmartRunsPoller::new(Arc::clone(&store), engine, completion, &config.polling);
    let run_sets_poller = Arc::new(SmartRunSetsPoller::new(
        Arc::clone(&store),
        runs_poller,
        &config.polling,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler =
        ReconciliationScheduler::new(run_sets_poller, config.polling.reconcile_interval())
        .spawn(shutdown_rx);

    signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    scheduler.await.context("joining reconciliation scheduler")?;
    database.close().await;

    info!("CBAS poller stopped");
    Ok(())
}
