//! Data-model types for the Document Store. Field names follow §3 of the
//! specification document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }
}

impl TryFrom<&str> for Visibility {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "private" => Ok(Self::Private),
            "public" => Ok(Self::Public),
            other => Err(format!("unknown visibility: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSpace {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub visibility: Visibility,
    pub default_llm_id: Option<Uuid>,
    pub qna_instructions: Option<String>,
    pub citations_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A role's permission set is data, not code (spec §9 open question):
/// the catalogue of valid permission strings lives in application
/// config/seed data, and a [`Membership`] simply carries whichever
/// strings its role was granted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: Uuid,
    pub search_space_id: Uuid,
    pub role: String,
    pub is_owner: bool,
    pub permissions: Vec<String>,
}

impl Membership {
    pub fn can(&self, permission: &str) -> bool {
        self.is_owner || self.permissions.iter().any(|p| p == permission)
    }
}

/// `status.state` from the Document lifecycle state machine in §3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Ready,
    Failed { error: String },
}

impl DocumentStatus {
    pub fn as_state_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn from_parts(state: &str, error: Option<String>) -> Self {
        match state {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "ready" => Self::Ready,
            _ => Self::Failed {
                error: error.unwrap_or_default(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub search_space_id: Uuid,
    pub title: String,
    pub document_type: String,
    pub content: String,
    pub source_markdown: Option<String>,
    pub blocknote_document: Option<serde_json::Value>,
    pub content_hash: String,
    pub unique_identifier_hash: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub document_metadata: serde_json::Value,
    pub status: DocumentStatus,
    pub content_needs_reindexing: bool,
    pub created_by_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A document not yet assigned an id, as produced by a connector's
/// `normalise` step.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub search_space_id: Uuid,
    pub title: String,
    pub document_type: String,
    pub source_markdown: String,
    pub content_hash: String,
    pub unique_identifier_hash: Option<String>,
    pub document_metadata: serde_json::Value,
    pub created_by_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub order_index: i32,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct NewChunk {
    pub order_index: i32,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
}

/// Result of `upsert_document`: whether this call created a new row or
/// matched an existing one by `content_hash` (dedup) or
/// `unique_identifier_hash` (idempotent re-ingest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    DedupConflict,
    UpdatedInPlace,
}

#[derive(Debug, Clone)]
pub struct UpsertResult {
    pub document_id: Uuid,
    pub outcome: UpsertOutcome,
}

/// Filters shared by `search_dense` / `search_lexical` / the hybrid
/// retriever.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub document_type: Option<String>,
    pub updated_after: Option<DateTime<Utc>>,
    pub connector_types: Option<Vec<String>>,
}

/// Scope of a [`Memory`] entry: `user` memories are private to one
/// account, `shared` memories are visible to every member of the
/// search space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryScope {
    User,
    Shared,
}

impl MemoryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Shared => "shared",
        }
    }
}

impl TryFrom<&str> for MemoryScope {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "user" => Ok(Self::User),
            "shared" => Ok(Self::Shared),
            other => Err(format!("unknown memory scope: {other}")),
        }
    }
}

/// `UserMemory` / `SharedMemory` (spec §3): a curated fact, preference,
/// instruction, or piece of context the agent should recall across
/// threads, searchable via the same hybrid retriever as Documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub search_space_id: Option<Uuid>,
    pub scope: MemoryScope,
    pub category: String,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMemory {
    pub user_id: Uuid,
    pub search_space_id: Option<Uuid>,
    pub scope: MemoryScope,
    pub category: String,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorRecord {
    pub id: Uuid,
    pub search_space_id: Uuid,
    pub user_id: Uuid,
    pub connector_type: String,
    pub name: String,
    /// Encrypted-at-rest JSON blob; values are vault ciphertext strings.
    pub config: serde_json::Value,
    pub periodic_indexing_enabled: bool,
    pub indexing_frequency_minutes: i32,
    pub next_scheduled_at: Option<DateTime<Utc>>,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// A row in `notifications` (spec §4.L): the back-end only ever writes
/// here, it never pushes over the stream directly. Delivery to a
/// connected client happens out of this crate's scope, via logical
/// replication on the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub search_space_id: Option<Uuid>,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub read: bool,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub search_space_id: Option<Uuid>,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadVisibility {
    Private,
    Space,
}

impl ThreadVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Space => "space",
        }
    }
}

impl TryFrom<&str> for ThreadVisibility {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "private" => Ok(Self::Private),
            "space" => Ok(Self::Space),
            other => Err(format!("unknown thread visibility: {other}")),
        }
    }
}

/// `ChatThread` (spec §3): a persistent, checkpointed conversation.
/// `state_version` increments on every message append or edit so
/// downstream artefacts (a generated podcast) can detect staleness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatThread {
    pub id: Uuid,
    pub search_space_id: Uuid,
    pub visibility: ThreadVisibility,
    pub created_by_id: Uuid,
    pub state_version: i64,
    pub public_share_token: Option<String>,
    pub public_share_enabled: bool,
    pub cloned_from_thread_id: Option<Uuid>,
    pub clone_pending: bool,
    pub needs_history_bootstrap: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChatThread {
    pub search_space_id: Uuid,
    pub visibility: ThreadVisibility,
    pub created_by_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

impl TryFrom<&str> for MessageRole {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            "tool" => Ok(Self::Tool),
            other => Err(format!("unknown message role: {other}")),
        }
    }
}

/// A persisted `ChatMessage` (spec §3). `content` is polymorphic: plain
/// text or a sequence of typed parts (text/tool-call/tool-result/
/// attachment), stored as-is in JSONB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub role: MessageRole,
    pub author_id: Option<Uuid>,
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewThreadMessage {
    pub thread_id: Uuid,
    pub role: MessageRole,
    pub author_id: Option<Uuid>,
    pub content: serde_json::Value,
}

/// Threaded discussion on an assistant message (spec §3). `mentions`
/// are persisted as separate `comment_mentions` rows by the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub message_id: Uuid,
    pub thread_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub message_id: Uuid,
    pub thread_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub content: String,
    pub mentions: Vec<Uuid>,
}

/// An immutable, citation-stripped copy of a thread (spec §3/§4.J),
/// keyed by a URL-safe `share_token`. `payload` is the exact JSON shape
/// served at `GET /public/{token}` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicChatSnapshot {
    pub share_token: String,
    pub thread_id: Uuid,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
