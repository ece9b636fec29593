//! Run-abandonment detection (spec §4.I): while a run is active its
//! worker periodically bumps `agent_runs.last_heartbeat_at`; a stalled
//! or crashed worker's row goes stale and [`Repository::try_start_run`]
//! lets the next caller take over.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use uuid::Uuid;

use crate::error::AgentError;
use crate::store::Repository;

/// How often a live run refreshes its heartbeat row. Kept well under
/// the TTL so a single missed tick under load doesn't look abandoned.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

pub struct RunHandle {
    store: Arc<Repository>,
    thread_id: Uuid,
    run_id: Uuid,
    stop: tokio::sync::watch::Sender<bool>,
}

impl RunHandle {
    /// Claims the run slot for `thread_id`, spawning a background task
    /// that keeps the heartbeat fresh until [`Self::release`] is called
    /// or this handle is dropped.
    pub async fn claim(
        store: Arc<Repository>,
        thread_id: Uuid,
        heartbeat_ttl: ChronoDuration,
    ) -> Result<Option<Self>, AgentError> {
        let run_id = Uuid::new_v4();
        if !store.try_start_run(thread_id, run_id, heartbeat_ttl).await? {
            return Ok(None);
        }

        let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
        let heartbeat_store = store.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = heartbeat_store.heartbeat_run(thread_id, run_id).await {
                            tracing::warn!(%thread_id, error = %e, "heartbeat update failed");
                        }
                    }
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(Some(Self { store, thread_id, run_id, stop: stop_tx }))
    }

    pub async fn release(self) -> Result<(), AgentError> {
        let _ = self.stop.send(true);
        self.store.release_run(self.thread_id, self.run_id).await?;
        Ok(())
    }
}
