//! Postgres-backed Document Store repository.
//!
//! Grounded in the teacher's `workspace::Repository` (raw SQL over
//! `deadpool_postgres`, no ORM), generalized from a single-user memory
//! store to the full multi-space Document/Chunk model.

use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use pgvector::Vector;
use uuid::Uuid;

use crate::error::StoreError;

use super::models::{
    ChatThread, Chunk, Comment, ConnectorRecord, Document, DocumentStatus, Membership, Memory,
    MemoryScope, MessageRole, NewChatThread, NewChunk, NewComment, NewDocument, NewMemory,
    NewNotification, NewThreadMessage, Notification, PublicChatSnapshot, SearchFilters,
    ThreadMessage, ThreadVisibility, UpsertOutcome, UpsertResult,
};

pub struct Repository {
    pool: Pool,
}

impl Repository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// `upsert_document` per §4.A: a `content_hash` collision for the
    /// same owner is a dedup conflict (return the existing id, not an
    /// error); a `unique_identifier_hash` match within the space updates
    /// in place.
    pub async fn upsert_document(&self, doc: NewDocument) -> Result<UpsertResult, StoreError> {
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await?;

        if let Some(existing) = txn
            .query_opt(
                "SELECT id FROM documents WHERE created_by_id = $1 AND content_hash = $2",
                &[&doc.created_by_id, &doc.content_hash],
            )
            .await?
        {
            txn.commit().await?;
            return Ok(UpsertResult {
                document_id: existing.get(0),
                outcome: UpsertOutcome::DedupConflict,
            });
        }

        if let Some(ref uid_hash) = doc.unique_identifier_hash {
            if let Some(existing) = txn
                .query_opt(
                    "SELECT id FROM documents WHERE search_space_id = $1 AND unique_identifier_hash = $2",
                    &[&doc.search_space_id, uid_hash],
                )
                .await?
            {
                let id: Uuid = existing.get(0);
                txn.execute(
                    "UPDATE documents SET title = $2, source_markdown = $3, document_metadata = $4,
                         content_needs_reindexing = TRUE, status = 'processing', updated_at = now()
                     WHERE id = $1",
                    &[&id, &doc.title, &doc.source_markdown, &doc.document_metadata],
                )
                .await?;
                txn.commit().await?;
                return Ok(UpsertResult {
                    document_id: id,
                    outcome: UpsertOutcome::UpdatedInPlace,
                });
            }
        }

        let row = txn
            .query_one(
                "INSERT INTO documents
                    (search_space_id, title, document_type, source_markdown, content_hash,
                     unique_identifier_hash, document_metadata, created_by_id, status)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'processing')
                 RETURNING id",
                &[
                    &doc.search_space_id,
                    &doc.title,
                    &doc.document_type,
                    &doc.source_markdown,
                    &doc.content_hash,
                    &doc.unique_identifier_hash,
                    &doc.document_metadata,
                    &doc.created_by_id,
                ],
            )
            .await?;

        txn.commit().await?;
        Ok(UpsertResult {
            document_id: row.get(0),
            outcome: UpsertOutcome::Created,
        })
    }

    pub async fn set_document_summary(
        &self,
        document_id: Uuid,
        summary: &str,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE documents SET content = $2, embedding = $3, status = 'ready',
                     content_needs_reindexing = FALSE, updated_at = now()
                 WHERE id = $1",
                &[&document_id, &summary, &Vector::from(embedding.to_vec())],
            )
            .await?;
        Ok(())
    }

    pub async fn mark_document_failed(
        &self,
        document_id: Uuid,
        error: &str,
    ) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE documents SET status = 'failed', status_error = $2, updated_at = now()
                 WHERE id = $1",
                &[&document_id, &error],
            )
            .await?;
        Ok(())
    }

    pub async fn get_document(&self, id: Uuid) -> Result<Document, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, search_space_id, title, document_type, content, source_markdown,
                        blocknote_document, content_hash, unique_identifier_hash, embedding,
                        document_metadata, status, status_error, content_needs_reindexing,
                        created_by_id, created_at, updated_at
                 FROM documents WHERE id = $1",
                &[&id],
            )
            .await?
            .ok_or(StoreError::NotFound { id })?;

        Ok(row_to_document(&row))
    }

    /// `replace_chunks`: atomic delete+insert of the whole chunk set for
    /// a document, matching §4.A's "chunks are immutable per Document
    /// version; reindexing deletes and rewrites the whole set".
    pub async fn replace_chunks(
        &self,
        document_id: Uuid,
        chunks: Vec<NewChunk>,
    ) -> Result<(), StoreError> {
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await?;

        txn.execute("DELETE FROM chunks WHERE document_id = $1", &[&document_id])
            .await?;

        for chunk in chunks {
            let embedding = chunk.embedding.map(Vector::from);
            txn.execute(
                "INSERT INTO chunks (document_id, order_index, content, embedding)
                 VALUES ($1, $2, $3, $4)",
                &[&document_id, &chunk.order_index, &chunk.content, &embedding],
            )
            .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute("DELETE FROM documents WHERE id = $1", &[&id])
            .await?;
        Ok(())
    }

    /// `search_dense(space_id, vec, filters, k)`: HNSW cosine search.
    pub async fn search_dense(
        &self,
        space_id: Uuid,
        query: &[f32],
        filters: &SearchFilters,
        k: usize,
    ) -> Result<Vec<(Uuid, f32)>, StoreError> {
        let client = self.pool.get().await?;
        let vector = Vector::from(query.to_vec());

        let rows = client
            .query(
                "SELECT c.id, 1 - (c.embedding <=> $2) AS score
                 FROM chunks c
                 JOIN documents d ON d.id = c.document_id
                 WHERE d.search_space_id = $1
                   AND c.embedding IS NOT NULL
                   AND ($3::text IS NULL OR d.document_type = $3)
                   AND ($4::timestamptz IS NULL OR d.updated_at >= $4)
                 ORDER BY c.embedding <=> $2
                 LIMIT $5",
                &[
                    &space_id,
                    &vector,
                    &filters.document_type,
                    &filters.updated_after,
                    &(k as i64),
                ],
            )
            .await?;

        Ok(rows.iter().map(|r| (r.get(0), r.get::<_, f64>(1) as f32)).collect())
    }

    /// `search_lexical(space_id, text, filters, k)`: BM25-like ranking
    /// via Postgres `ts_rank_cd` over the generated `tsvector` column.
    pub async fn search_lexical(
        &self,
        space_id: Uuid,
        text: &str,
        filters: &SearchFilters,
        k: usize,
    ) -> Result<Vec<(Uuid, f32)>, StoreError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                "SELECT c.id, ts_rank_cd(c.content_tsv, plainto_tsquery('english', $2)) AS score
                 FROM chunks c
                 JOIN documents d ON d.id = c.document_id
                 WHERE d.search_space_id = $1
                   AND c.content_tsv @@ plainto_tsquery('english', $2)
                   AND ($3::text IS NULL OR d.document_type = $3)
                   AND ($4::timestamptz IS NULL OR d.updated_at >= $4)
                 ORDER BY score DESC
                 LIMIT $5",
                &[
                    &space_id,
                    &text,
                    &filters.document_type,
                    &filters.updated_after,
                    &(k as i64),
                ],
            )
            .await?;

        Ok(rows.iter().map(|r| (r.get(0), r.get::<_, f32>(1))).collect())
    }

    pub async fn get_chunks(&self, chunk_ids: &[Uuid]) -> Result<Vec<Chunk>, StoreError> {
        if chunk_ids.is_empty() {
            return Ok(vec![]);
        }
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, document_id, order_index, content, embedding
                 FROM chunks WHERE id = ANY($1)",
                &[&chunk_ids],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|r| Chunk {
                id: r.get(0),
                document_id: r.get(1),
                order_index: r.get(2),
                content: r.get(3),
                embedding: r.get::<_, Option<Vector>>(4).map(|v| v.to_vec()),
            })
            .collect())
    }

    pub async fn insert_memory(&self, memory: NewMemory) -> Result<Uuid, StoreError> {
        let client = self.pool.get().await?;
        let embedding = memory.embedding.map(Vector::from);
        let row = client
            .query_one(
                "INSERT INTO memories (user_id, search_space_id, scope, category, content, embedding)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING id",
                &[
                    &memory.user_id,
                    &memory.search_space_id,
                    &memory.scope.as_str(),
                    &memory.category,
                    &memory.content,
                    &embedding,
                ],
            )
            .await?;
        Ok(row.get(0))
    }

    /// Semantic search over a user's memories, constrained to their own
    /// `user` scope plus any `shared` memories in the given space.
    pub async fn search_memories(
        &self,
        user_id: Uuid,
        search_space_id: Option<Uuid>,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<(Memory, f32)>, StoreError> {
        let client = self.pool.get().await?;
        let vector = Vector::from(query_embedding.to_vec());

        let rows = client
            .query(
                "SELECT id, user_id, search_space_id, scope, category, content, embedding, created_at,
                        1 - (embedding <=> $1) AS score
                 FROM memories
                 WHERE embedding IS NOT NULL
                   AND (user_id = $2 OR (scope = 'shared' AND search_space_id = $3))
                 ORDER BY embedding <=> $1
                 LIMIT $4",
                &[&vector, &user_id, &search_space_id, &(limit as i64)],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let scope_str: String = r.get(3);
                (
                    Memory {
                        id: r.get(0),
                        user_id: r.get(1),
                        search_space_id: r.get(2),
                        scope: MemoryScope::try_from(scope_str.as_str()).unwrap_or(MemoryScope::User),
                        category: r.get(4),
                        content: r.get(5),
                        embedding: r.get::<_, Option<Vector>>(6).map(|v| v.to_vec()),
                        created_at: r.get(7),
                    },
                    r.get::<_, f64>(8) as f32,
                )
            })
            .collect())
    }

    pub async fn documents_due_for_quota_check(
        &self,
        owner_id: Uuid,
    ) -> Result<(i64, i64), StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "SELECT pages_used, pages_limit FROM users WHERE id = $1",
                &[&owner_id],
            )
            .await?;
        Ok((row.get(0), row.get(1)))
    }

    pub async fn increment_pages_used(&self, owner_id: Uuid, by: i64) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE users SET pages_used = pages_used + $2 WHERE id = $1",
                &[&owner_id, &by],
            )
            .await?;
        Ok(())
    }

    /// Grants `pages_granted` extra `pages_limit` to a user for a
    /// one-shot incentive task. Idempotent: the `(user_id, task_type)`
    /// primary key on `incentive_tasks` makes a repeat claim a no-op
    /// rather than a double grant. Returns whether this call actually
    /// granted anything (`false` if already claimed).
    pub async fn grant_incentive_task(
        &self,
        user_id: Uuid,
        task_type: &str,
        pages_granted: i64,
    ) -> Result<bool, StoreError> {
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await?;

        let inserted = txn
            .execute(
                "INSERT INTO incentive_tasks (user_id, task_type, pages_granted)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (user_id, task_type) DO NOTHING",
                &[&user_id, &task_type, &pages_granted],
            )
            .await?;

        if inserted > 0 {
            txn.execute(
                "UPDATE users SET pages_limit = pages_limit + $2 WHERE id = $1",
                &[&user_id, &pages_granted],
            )
            .await?;
        }

        txn.commit().await?;
        Ok(inserted > 0)
    }

    pub async fn get_connector(&self, id: Uuid) -> Result<ConnectorRecord, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, search_space_id, user_id, connector_type, name, config,
                        periodic_indexing_enabled, indexing_frequency_minutes,
                        next_scheduled_at, last_indexed_at, is_active
                 FROM connectors WHERE id = $1",
                &[&id],
            )
            .await?
            .ok_or(StoreError::NotFound { id })?;
        Ok(row_to_connector(&row))
    }

    /// Connectors due per spec §4.G: periodic indexing enabled, active,
    /// and their schedule has elapsed.
    pub async fn connectors_due(&self) -> Result<Vec<ConnectorRecord>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, search_space_id, user_id, connector_type, name, config,
                        periodic_indexing_enabled, indexing_frequency_minutes,
                        next_scheduled_at, last_indexed_at, is_active
                 FROM connectors
                 WHERE periodic_indexing_enabled AND is_active AND next_scheduled_at <= now()",
                &[],
            )
            .await?;
        Ok(rows.iter().map(row_to_connector).collect())
    }

    pub async fn advance_connector_schedule(
        &self,
        id: Uuid,
        last_indexed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE connectors
                 SET last_indexed_at = $2,
                     next_scheduled_at = next_scheduled_at + (indexing_frequency_minutes || ' minutes')::interval
                 WHERE id = $1",
                &[&id, &last_indexed_at],
            )
            .await?;
        Ok(())
    }

    pub async fn update_connector_config(&self, id: Uuid, config: &serde_json::Value) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute("UPDATE connectors SET config = $2 WHERE id = $1", &[&id, config])
            .await?;
        Ok(())
    }

    /// Appends one checkpoint row. `step_no` must be the caller's
    /// monotonic counter for `thread_id` — the primary key on
    /// `(thread_id, step_no)` turns a duplicate append into an error
    /// rather than a silent overwrite, which is what we want: a bug that
    /// replays a step number is a bug, not a retry.
    pub async fn append_checkpoint(
        &self,
        thread_id: Uuid,
        step_no: i64,
        node: &str,
        state_blob: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO agent_checkpoints (thread_id, step_no, node, state_blob)
                 VALUES ($1, $2, $3, $4)",
                &[&thread_id, &step_no, &node, state_blob],
            )
            .await?;
        Ok(())
    }

    pub async fn latest_checkpoint(
        &self,
        thread_id: Uuid,
    ) -> Result<Option<(i64, String, serde_json::Value)>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT step_no, node, state_blob FROM agent_checkpoints
                 WHERE thread_id = $1 ORDER BY step_no DESC LIMIT 1",
                &[&thread_id],
            )
            .await?;
        Ok(row.map(|r| (r.get(0), r.get(1), r.get(2))))
    }

    /// Claims the run slot for `thread_id` if no run is active or the
    /// previous holder's heartbeat has expired (`heartbeat_ttl`),
    /// matching spec §4.I's "declares the run abandoned (heartbeat
    /// expired)". Returns `Ok(true)` iff this call now owns the run.
    pub async fn try_start_run(
        &self,
        thread_id: Uuid,
        run_id: Uuid,
        heartbeat_ttl: chrono::Duration,
    ) -> Result<bool, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .execute(
                "INSERT INTO agent_runs (thread_id, run_id, last_heartbeat_at)
                 VALUES ($1, $2, now())
                 ON CONFLICT (thread_id) DO UPDATE
                     SET run_id = EXCLUDED.run_id, last_heartbeat_at = now()
                 WHERE agent_runs.last_heartbeat_at < now() - $3::interval",
                &[&thread_id, &run_id, &format!("{} seconds", heartbeat_ttl.num_seconds())],
            )
            .await?;
        Ok(rows > 0)
    }

    pub async fn heartbeat_run(&self, thread_id: Uuid, run_id: Uuid) -> Result<bool, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .execute(
                "UPDATE agent_runs SET last_heartbeat_at = now()
                 WHERE thread_id = $1 AND run_id = $2",
                &[&thread_id, &run_id],
            )
            .await?;
        Ok(rows > 0)
    }

    pub async fn release_run(&self, thread_id: Uuid, run_id: Uuid) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "DELETE FROM agent_runs WHERE thread_id = $1 AND run_id = $2",
                &[&thread_id, &run_id],
            )
            .await?;
        Ok(())
    }

    /// Writes a notification row. Per spec §4.L the back-end never
    /// pushes over the stream directly — delivery to a connected client
    /// happens out of this crate's scope, via logical replication.
    pub async fn create_notification(&self, notification: NewNotification) -> Result<Uuid, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "INSERT INTO notifications (user_id, search_space_id, type, title, message, metadata)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING id",
                &[
                    &notification.user_id,
                    &notification.search_space_id,
                    &notification.notification_type,
                    &notification.title,
                    &notification.message,
                    &notification.metadata,
                ],
            )
            .await?;
        Ok(row.get(0))
    }

    pub async fn list_notifications(
        &self,
        user_id: Uuid,
        include_archived: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, user_id, search_space_id, type, title, message, metadata, read, archived, created_at
                 FROM notifications
                 WHERE user_id = $1 AND (archived = FALSE OR $2)
                 ORDER BY created_at DESC
                 LIMIT $3",
                &[&user_id, &include_archived, &limit],
            )
            .await?;
        Ok(rows.iter().map(row_to_notification).collect())
    }

    pub async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .execute(
                "UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2",
                &[&id, &user_id],
            )
            .await?;
        Ok(rows > 0)
    }

    pub async fn archive_notification(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .execute(
                "UPDATE notifications SET archived = TRUE WHERE id = $1 AND user_id = $2",
                &[&id, &user_id],
            )
            .await?;
        Ok(rows > 0)
    }

    pub async fn get_membership(
        &self,
        user_id: Uuid,
        search_space_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT user_id, search_space_id, role, is_owner, permissions
                 FROM memberships WHERE user_id = $1 AND search_space_id = $2",
                &[&user_id, &search_space_id],
            )
            .await?;
        Ok(row.map(|r| Membership {
            user_id: r.get(0),
            search_space_id: r.get(1),
            role: r.get(2),
            is_owner: r.get(3),
            permissions: r.get(4),
        }))
    }

    /// Podcast artefacts referenced by a thread's public snapshot (spec
    /// §3/§6): notifications of type `podcast_requested` carry
    /// `thread_id` in their metadata since there is no dedicated podcast
    /// table in this store.
    pub async fn list_podcast_notifications(&self, thread_id: Uuid) -> Result<Vec<Notification>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, user_id, search_space_id, type, title, message, metadata, read, archived, created_at
                 FROM notifications
                 WHERE type = 'podcast_requested' AND metadata->>'thread_id' = $1::text
                 ORDER BY created_at",
                &[&thread_id.to_string()],
            )
            .await?;
        Ok(rows.iter().map(row_to_notification).collect())
    }

    pub async fn create_thread(&self, thread: NewChatThread) -> Result<Uuid, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "INSERT INTO chat_threads (search_space_id, visibility, created_by_id)
                 VALUES ($1, $2, $3)
                 RETURNING id",
                &[&thread.search_space_id, &thread.visibility.as_str(), &thread.created_by_id],
            )
            .await?;
        Ok(row.get(0))
    }

    pub async fn get_thread(&self, thread_id: Uuid) -> Result<ChatThread, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, search_space_id, visibility, created_by_id, state_version,
                        public_share_token, public_share_enabled, cloned_from_thread_id,
                        clone_pending, needs_history_bootstrap, created_at, updated_at
                 FROM chat_threads WHERE id = $1",
                &[&thread_id],
            )
            .await?
            .ok_or(StoreError::NotFound { id: thread_id })?;
        Ok(row_to_thread(&row))
    }

    pub async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<ThreadMessage>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, thread_id, role, author_id, content, created_at
                 FROM chat_messages WHERE thread_id = $1 ORDER BY created_at, id",
                &[&thread_id],
            )
            .await?;
        Ok(rows.iter().map(row_to_message).collect())
    }

    /// Appends a message and bumps `state_version` in the same
    /// transaction, per §4.J: "state_version increments on any message
    /// append or edit".
    pub async fn append_message(&self, message: NewThreadMessage) -> Result<Uuid, StoreError> {
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await?;

        let row = txn
            .query_one(
                "INSERT INTO chat_messages (thread_id, role, author_id, content)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id",
                &[&message.thread_id, &message.role.as_str(), &message.author_id, &message.content],
            )
            .await?;
        txn.execute(
            "UPDATE chat_threads SET state_version = state_version + 1, updated_at = now()
             WHERE id = $1",
            &[&message.thread_id],
        )
        .await?;

        txn.commit().await?;
        Ok(row.get(0))
    }

    /// Enables or disables public sharing for a thread. Enabling mints a
    /// fresh 32-byte URL-safe token (spec §4.J); disabling clears it so
    /// the old URL stops resolving.
    pub async fn set_public_share(
        &self,
        thread_id: Uuid,
        enabled: bool,
        token: Option<String>,
    ) -> Result<Option<String>, StoreError> {
        let client = self.pool.get().await?;
        let token = if enabled { token } else { None };
        let row = client
            .query_one(
                "UPDATE chat_threads
                 SET public_share_enabled = $2, public_share_token = $3, updated_at = now()
                 WHERE id = $1
                 RETURNING public_share_token",
                &[&thread_id, &enabled, &token],
            )
            .await?;
        Ok(row.get(0))
    }

    pub async fn create_snapshot(
        &self,
        share_token: &str,
        thread_id: Uuid,
        payload: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO public_chat_snapshots (share_token, thread_id, payload)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (share_token) DO UPDATE SET payload = EXCLUDED.payload",
                &[&share_token, &thread_id, payload],
            )
            .await?;
        Ok(())
    }

    pub async fn get_snapshot(&self, share_token: &str) -> Result<PublicChatSnapshot, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT share_token, thread_id, payload, created_at
                 FROM public_chat_snapshots WHERE share_token = $1",
                &[&share_token],
            )
            .await?
            .ok_or(StoreError::ShareTokenNotFound)?;
        Ok(PublicChatSnapshot {
            share_token: row.get(0),
            thread_id: row.get(1),
            payload: row.get(2),
            created_at: row.get(3),
        })
    }

    /// Creates a clone target thread flagged `clone_pending` /
    /// `needs_history_bootstrap` (spec §4.J): the agent loads the copied
    /// history into its checkpoint on the clone's first user message
    /// rather than this call replaying it eagerly.
    pub async fn clone_thread(
        &self,
        source_thread_id: Uuid,
        created_by_id: Uuid,
    ) -> Result<Uuid, StoreError> {
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await?;

        let source = txn
            .query_opt(
                "SELECT search_space_id, visibility FROM chat_threads WHERE id = $1",
                &[&source_thread_id],
            )
            .await?
            .ok_or(StoreError::NotFound { id: source_thread_id })?;
        let search_space_id: Uuid = source.get(0);
        let visibility: String = source.get(1);

        let row = txn
            .query_one(
                "INSERT INTO chat_threads
                    (search_space_id, visibility, created_by_id, cloned_from_thread_id,
                     clone_pending, needs_history_bootstrap)
                 VALUES ($1, $2, $3, $4, TRUE, TRUE)
                 RETURNING id",
                &[&search_space_id, &visibility, &created_by_id, &source_thread_id],
            )
            .await?;
        let clone_id: Uuid = row.get(0);

        txn.execute(
            "INSERT INTO chat_messages (thread_id, role, author_id, content)
             SELECT $1, role, author_id, content FROM chat_messages
             WHERE thread_id = $2 ORDER BY created_at, id",
            &[&clone_id, &source_thread_id],
        )
        .await?;

        txn.commit().await?;
        Ok(clone_id)
    }

    /// Clears the bootstrap flags once the runtime has loaded the
    /// cloned history into a fresh checkpoint.
    pub async fn mark_thread_bootstrapped(&self, thread_id: Uuid) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE chat_threads SET clone_pending = FALSE, needs_history_bootstrap = FALSE
                 WHERE id = $1",
                &[&thread_id],
            )
            .await?;
        Ok(())
    }

    pub async fn insert_comment(&self, comment: NewComment) -> Result<Uuid, StoreError> {
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await?;

        let row = txn
            .query_one(
                "INSERT INTO comments (message_id, thread_id, parent_id, author_id, content)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING id",
                &[&comment.message_id, &comment.thread_id, &comment.parent_id, &comment.author_id, &comment.content],
            )
            .await?;
        let comment_id: Uuid = row.get(0);

        for mentioned in &comment.mentions {
            txn.execute(
                "INSERT INTO comment_mentions (comment_id, user_id) VALUES ($1, $2)
                 ON CONFLICT DO NOTHING",
                &[&comment_id, mentioned],
            )
            .await?;
        }

        txn.commit().await?;
        Ok(comment_id)
    }

    pub async fn list_comments(&self, thread_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, message_id, thread_id, parent_id, author_id, content, created_at
                 FROM comments WHERE thread_id = $1 ORDER BY created_at",
                &[&thread_id],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|r| Comment {
                id: r.get(0),
                message_id: r.get(1),
                thread_id: r.get(2),
                parent_id: r.get(3),
                author_id: r.get(4),
                content: r.get(5),
                created_at: r.get(6),
            })
            .collect())
    }
}

fn row_to_notification(row: &tokio_postgres::Row) -> Notification {
    Notification {
        id: row.get(0),
        user_id: row.get(1),
        search_space_id: row.get(2),
        notification_type: row.get(3),
        title: row.get(4),
        message: row.get(5),
        metadata: row.get(6),
        read: row.get(7),
        archived: row.get(8),
        created_at: row.get(9),
    }
}

fn row_to_thread(row: &tokio_postgres::Row) -> ChatThread {
    let visibility: String = row.get(2);
    ChatThread {
        id: row.get(0),
        search_space_id: row.get(1),
        visibility: ThreadVisibility::try_from(visibility.as_str()).unwrap_or(ThreadVisibility::Private),
        created_by_id: row.get(3),
        state_version: row.get(4),
        public_share_token: row.get(5),
        public_share_enabled: row.get(6),
        cloned_from_thread_id: row.get(7),
        clone_pending: row.get(8),
        needs_history_bootstrap: row.get(9),
        created_at: row.get(10),
        updated_at: row.get(11),
    }
}

fn row_to_message(row: &tokio_postgres::Row) -> ThreadMessage {
    let role: String = row.get(2);
    ThreadMessage {
        id: row.get(0),
        thread_id: row.get(1),
        role: MessageRole::try_from(role.as_str()).unwrap_or(MessageRole::User),
        author_id: row.get(3),
        content: row.get(4),
        created_at: row.get(5),
    }
}

fn row_to_connector(row: &tokio_postgres::Row) -> ConnectorRecord {
    ConnectorRecord {
        id: row.get(0),
        search_space_id: row.get(1),
        user_id: row.get(2),
        connector_type: row.get(3),
        name: row.get(4),
        config: row.get(5),
        periodic_indexing_enabled: row.get(6),
        indexing_frequency_minutes: row.get(7),
        next_scheduled_at: row.get(8),
        last_indexed_at: row.get(9),
        is_active: row.get(10),
    }
}

fn row_to_document(row: &tokio_postgres::Row) -> Document {
    let status_state: String = row.get(11);
    let status_error: Option<String> = row.get(12);

    Document {
        id: row.get(0),
        search_space_id: row.get(1),
        title: row.get(2),
        document_type: row.get(3),
        content: row.get(4),
        source_markdown: row.get(5),
        blocknote_document: row.get(6),
        content_hash: row.get(7),
        unique_identifier_hash: row.get(8),
        embedding: row.get::<_, Option<Vector>>(9).map(|v| v.to_vec()),
        document_metadata: row.get(10),
        status: DocumentStatus::from_parts(&status_state, status_error),
        content_needs_reindexing: row.get(13),
        created_by_id: row.get(14),
        created_at: row.get::<_, DateTime<Utc>>(15),
        updated_at: row.get::<_, DateTime<Utc>>(16),
    }
}
