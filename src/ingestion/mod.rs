//! Ingestion Coordinator (spec §4.F): drives one connector's fetch
//! cycle end to end — lock, discover, normalise, dedupe, chunk, embed,
//! summarise.

pub mod lock;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::chunker::{self, ChunkConfig};
use crate::connectors::registry::ConnectorRegistry;
use crate::connectors::{self, Watermark};
use crate::embedder::EmbeddingProvider;
use crate::error::IngestionError;
use crate::llm::LlmProvider;
use crate::quota::QuotaGuard;
use crate::store::{NewChunk, NewDocument, Repository, UpsertOutcome};
use crate::summarizer::Summariser;

use self::lock::DistributedLock;

/// Clock-skew and late-arrival tolerance for the discovery watermark.
const SAFETY_WINDOW: chrono::Duration = chrono::Duration::minutes(10);

/// A connector run is declared `failed` (and `last_indexed_at` is not
/// advanced) once more than this fraction of items error out.
const FAILURE_THRESHOLD: f64 = 0.5;

pub struct IngestionCoordinator {
    store: Arc<Repository>,
    registry: Arc<ConnectorRegistry>,
    embeddings: Arc<dyn EmbeddingProvider>,
    summariser: Summariser,
    lock: Arc<DistributedLock>,
    quota: Arc<QuotaGuard>,
}

pub struct RunOutcome {
    pub documents_created: usize,
    pub documents_updated: usize,
    pub items_failed: usize,
    pub advanced_to: chrono::DateTime<Utc>,
    pub succeeded: bool,
}

impl IngestionCoordinator {
    pub fn new(
        store: Arc<Repository>,
        registry: Arc<ConnectorRegistry>,
        embeddings: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        lock: Arc<DistributedLock>,
        quota: Arc<QuotaGuard>,
    ) -> Self {
        Self {
            store,
            registry,
            embeddings: embeddings.clone(),
            summariser: Summariser::new(llm, embeddings),
            lock,
            quota,
        }
    }

    /// Runs one full fetch cycle for `record`, per spec §4.F's 8-step
    /// algorithm. Returns `Ok(None)` (not an error) when the lock could
    /// not be acquired — another worker already owns this connector.
    pub async fn run(&self, record: &crate::store::ConnectorRecord) -> Result<Option<RunOutcome>, IngestionError> {
        let lock_name = format!("connector:{}", record.id);
        let Some(guard) = self.lock.try_acquire(&lock_name).await.map_err(|e| {
            tracing::warn!(error = %e, "lock backend error, treating as contended");
            IngestionError::LockContended
        })?
        else {
            return Ok(None);
        };

        let result = self.run_locked(record).await;
        guard.release().await;
        result.map(Some)
    }

    async fn run_locked(&self, record: &crate::store::ConnectorRecord) -> Result<RunOutcome, IngestionError> {
        let (connector, refreshed_config) = self.registry.build(record).await?;
        if refreshed_config.is_some() {
            tracing::info!(connector_id = %record.id, "refreshed OAuth credentials");
            // Persisting the refreshed config back to the connectors
            // table is the caller's responsibility (it owns the
            // connector CRUD surface); the coordinator only reports it.
        }

        let now = Utc::now();
        let since = record
            .last_indexed_at
            .map(|last| last.max(now - SAFETY_WINDOW))
            .unwrap_or(now - SAFETY_WINDOW);
        let watermark = Watermark {
            since: Some(since),
            until: Some(now),
        };

        self.quota.check_pages(record.user_id, 1).await?;

        let items = connector.discover(watermark).await?;

        let mut created = 0;
        let mut updated = 0;
        let mut failed = 0;
        let mut oldest_failure: Option<chrono::DateTime<Utc>> = None;

        for item in items {
            let source_time = item.source_time;
            match self.ingest_one(record, &*connector, item).await {
                Ok(UpsertOutcome::Created) => created += 1,
                Ok(UpsertOutcome::UpdatedInPlace) => updated += 1,
                Ok(UpsertOutcome::DedupConflict) => {}
                Err(e) => {
                    tracing::warn!(connector_id = %record.id, error = %e, "item ingest failed");
                    failed += 1;
                    oldest_failure = Some(oldest_failure.map_or(source_time, |t: chrono::DateTime<Utc>| t.min(source_time)));
                }
            }
        }

        let total = created + updated + failed;
        let succeeded = total == 0 || (failed as f64 / total as f64) <= FAILURE_THRESHOLD;
        let advanced_to = if succeeded {
            now
        } else {
            oldest_failure.unwrap_or(since)
        };

        Ok(RunOutcome {
            documents_created: created,
            documents_updated: updated,
            items_failed: failed,
            advanced_to,
            succeeded,
        })
    }

    async fn ingest_one(
        &self,
        record: &crate::store::ConnectorRecord,
        connector: &dyn connectors::Connector,
        item: connectors::RawItem,
    ) -> Result<UpsertOutcome, IngestionError> {
        let normalised = connector.normalise(item)?;
        let content_hash = connectors::content_hash(&normalised.source_markdown);

        let new_document = NewDocument {
            search_space_id: record.search_space_id,
            title: normalised.title,
            document_type: normalised.document_type,
            source_markdown: normalised.source_markdown.clone(),
            content_hash,
            unique_identifier_hash: Some(normalised.unique_identifier_hash),
            document_metadata: normalised.document_metadata,
            created_by_id: record.user_id,
        };

        let result = self.store.upsert_document(new_document).await?;
        if result.outcome == UpsertOutcome::DedupConflict {
            return Ok(result.outcome);
        }

        if result.outcome == UpsertOutcome::Created {
            self.store.increment_pages_used(record.user_id, 1).await?;
        }

        self.process_document(result.document_id, &normalised.source_markdown)
            .await?;
        Ok(result.outcome)
    }

    /// chunk → embed → summarise → embed summary → commit, idempotent on
    /// `document_id` per spec §4.F step 6 / §5.
    pub async fn process_document(
        &self,
        document_id: Uuid,
        source_markdown: &str,
    ) -> Result<(), IngestionError> {
        let chunk_texts = chunker::chunk_document(source_markdown, ChunkConfig::default());
        let embeddings = self.embeddings.embed_batch(&chunk_texts).await?;

        let new_chunks: Vec<NewChunk> = chunk_texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(order_index, (content, embedding))| NewChunk {
                order_index: order_index as i32,
                content,
                embedding: Some(embedding),
            })
            .collect();

        self.store.replace_chunks(document_id, new_chunks).await?;

        match self.summariser.summarise(source_markdown, "").await {
            Ok((summary, embedding)) => {
                self.store
                    .set_document_summary(document_id, &summary, &embedding)
                    .await?;
            }
            Err(e) => {
                self.store
                    .mark_document_failed(document_id, &e.to_string())
                    .await?;
                return Err(e);
            }
        }

        Ok(())
    }
}

/// Fixed backoff applied by callers retrying a `transient_upstream`
/// connector error (spec §7); the ingestion coordinator itself does not
/// loop retries, it surfaces the error and lets the scheduler's next
/// tick try again.
pub const TRANSIENT_RETRY_BACKOFF: Duration = Duration::from_secs(60);
