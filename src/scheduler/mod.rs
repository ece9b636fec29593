//! Scheduler (spec §4.G): a single logical timer loop, horizontally
//! safe via the same distributed lock the ingestion coordinator uses
//! per connector run.

use std::sync::Arc;
use std::time::Duration;

use crate::error::SchedulerError;
use crate::ingestion::IngestionCoordinator;
use crate::store::Repository;

/// Tick interval per spec §4.G ("every minute").
pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

pub struct Scheduler {
    store: Arc<Repository>,
    ingestion: Arc<IngestionCoordinator>,
}

impl Scheduler {
    pub fn new(store: Arc<Repository>, ingestion: Arc<IngestionCoordinator>) -> Self {
        Self { store, ingestion }
    }

    /// Runs the timer loop until `shutdown` resolves. Each tick selects
    /// connectors due for indexing, dispatches each (bounding a run to
    /// the lock it acquires — a contended lock is a silent skip, not an
    /// error), and advances `next_scheduled_at` on success.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) -> Result<(), SchedulerError> {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "scheduler tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn tick(&self) -> Result<(), SchedulerError> {
        let due = self.store.connectors_due().await?;
        tracing::debug!(count = due.len(), "connectors due for indexing");

        for record in due {
            let store = self.store.clone();
            let ingestion = self.ingestion.clone();
            let record = record.clone();
            tokio::spawn(async move {
                if let Err(e) = dispatch_one(&store, &ingestion, &record).await {
                    tracing::warn!(connector_id = %record.id, error = %e, "connector run failed");
                }
            });
        }

        Ok(())
    }
}

async fn dispatch_one(
    store: &Repository,
    ingestion: &IngestionCoordinator,
    record: &crate::store::ConnectorRecord,
) -> Result<(), SchedulerError> {
    match ingestion.run(record).await {
        Ok(Some(outcome)) if outcome.succeeded => {
            store
                .advance_connector_schedule(record.id, outcome.advanced_to)
                .await?;
        }
        Ok(Some(_)) => {
            tracing::warn!(connector_id = %record.id, "run failed threshold, not advancing schedule");
        }
        Ok(None) => {
            tracing::debug!(connector_id = %record.id, "lock contended, skipping this tick");
        }
        Err(e) => {
            tracing::warn!(connector_id = %record.id, error = %e, "ingestion run errored");
        }
    }

    Ok(())
}
