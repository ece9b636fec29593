//! Document Store (spec component 4.A): the Postgres+pgvector-backed
//! source of truth for search spaces, documents, and chunks.

pub mod migrations;
pub mod models;
pub mod repository;

pub use models::{
    ChatThread, Chunk, Comment, ConnectorRecord, Document, DocumentStatus, Membership, Memory,
    MemoryScope, MessageRole, NewChatThread, NewChunk, NewComment, NewDocument, NewMemory,
    NewNotification, NewThreadMessage, Notification, PublicChatSnapshot, SearchFilters,
    SearchSpace, ThreadMessage, ThreadVisibility, UpsertOutcome, UpsertResult, Visibility,
};
pub use repository::Repository;
