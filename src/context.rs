//! Explicit application context, constructed once at startup and passed
//! to every handler/worker. No global mutable singletons (see DESIGN.md).

use std::sync::Arc;

use uuid::Uuid;

use crate::config::AppConfig;
use crate::embedder::EmbeddingProvider;
use crate::ingestion::lock::DistributedLock;
use crate::llm::LlmProvider;
use crate::quota::QuotaGuard;
use crate::vault::Vault;

/// Process-wide dependencies shared by the `serve`, `worker`, and
/// `scheduler` subcommands.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub db: deadpool_postgres::Pool,
    pub redis: deadpool_redis::Pool,
    pub vault: Arc<Vault>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmProvider>,
    pub lock: Arc<DistributedLock>,
    pub quota: Arc<QuotaGuard>,
}

impl AppContext {
    /// Check the critical dependencies this process needs to serve
    /// traffic. Used by `/health/ready` and the CLI dependency-unhealthy
    /// exit path (code 2).
    pub async fn health_check(&self) -> Result<(), String> {
        self.db
            .get()
            .await
            .map_err(|e| format!("postgres unavailable: {e}"))?;

        let mut conn = self
            .redis
            .get()
            .await
            .map_err(|e| format!("redis unavailable: {e}"))?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| format!("redis ping failed: {e}"))?;

        Ok(())
    }
}

/// Per-task context threaded through tool execution: who is running this,
/// which thread/connector run it belongs to, and a cancellation signal.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub search_space_id: Uuid,
    pub user_id: Uuid,
    pub thread_id: Option<Uuid>,
    pub cancellation: tokio_util::sync::CancellationToken,
}

impl JobContext {
    pub fn new(search_space_id: Uuid, user_id: Uuid) -> Self {
        Self {
            search_space_id,
            user_id,
            thread_id: None,
            cancellation: tokio_util::sync::CancellationToken::new(),
        }
    }

    pub fn with_thread(mut self, thread_id: Uuid) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
