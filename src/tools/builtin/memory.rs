//! Retrieval and memory tools available to the agent's tool-call node.
//!
//! Adapted from the teacher's `MemorySearchTool`/`MemoryWriteTool`/
//! `MemoryReadTool` (same `Tool` shape, same test-setup idiom for a
//! throwaway `deadpool_postgres::Pool`), retargeted from a single
//! `Workspace` onto this crate's [`HybridRetriever`] for documents and
//! [`Repository`] for curated user/shared memories (spec §4.I's
//! `retrieve` tool and §3's `UserMemory`/`SharedMemory`).

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::JobContext;
use crate::embedder::EmbeddingProvider;
use crate::retriever::HybridRetriever;
use crate::store::{MemoryScope, NewMemory, Repository, SearchFilters};
use crate::tools::tool::{Tool, ToolError, ToolOutput};

/// `retrieve`: hybrid search over a search space's Documents. The node
/// that calls this formats results as `[citation:doc-ID]` anchors
/// before handing them to the answer node (spec §4.I).
pub struct RetrieveTool {
    retriever: Arc<HybridRetriever>,
}

impl RetrieveTool {
    pub fn new(retriever: Arc<HybridRetriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for RetrieveTool {
    fn name(&self) -> &str {
        "retrieve"
    }

    fn description(&self) -> &str {
        "Search the knowledge base for documents relevant to a query. MUST be called before \
         answering questions that might be grounded in ingested documents. Returns ranked \
         documents with their chunk text and score."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Natural-language search query."
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of documents to return (default 5, max 20)",
                    "default": 5,
                    "minimum": 1,
                    "maximum": 20
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();

        let query = params
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'query' parameter".to_string()))?;
        let limit = params.get("limit").and_then(|v| v.as_u64()).unwrap_or(5).min(20) as usize;

        let ranked = self
            .retriever
            .search(ctx.search_space_id, query, &SearchFilters::default(), limit)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("retrieval failed: {e}")))?;

        let output = serde_json::json!({
            "query": query,
            "documents": ranked.iter().map(|doc| serde_json::json!({
                "document_id": doc.document_id.to_string(),
                "score": doc.score,
                "chunk_count": doc.chunks.len(),
            })).collect::<Vec<_>>(),
        });

        Ok(ToolOutput::success(output, start.elapsed()).with_raw(format!("{} documents", ranked.len())))
    }
}

/// `memory_write`: persists a curated fact/preference/instruction to
/// `user` or `shared` scope (spec §3's `UserMemory`/`SharedMemory`).
pub struct MemoryWriteTool {
    store: Arc<Repository>,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl MemoryWriteTool {
    pub fn new(store: Arc<Repository>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embeddings }
    }
}

#[async_trait]
impl Tool for MemoryWriteTool {
    fn name(&self) -> &str {
        "memory_write"
    }

    fn description(&self) -> &str {
        "Persist an important fact, preference, or instruction to memory so it can be recalled \
         in future conversations. Use scope 'shared' only for facts every member of the search \
         space should see."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The fact or instruction to remember, stated concisely."
                },
                "category": {
                    "type": "string",
                    "description": "A short label for the kind of memory, e.g. 'preference', 'fact', 'todo'."
                },
                "scope": {
                    "type": "string",
                    "enum": ["user", "shared"],
                    "default": "user"
                }
            },
            "required": ["content", "category"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();

        let content = params
            .get("content")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidParameters("missing or empty 'content' parameter".to_string()))?;
        let category = params
            .get("category")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'category' parameter".to_string()))?;
        let scope = match params.get("scope").and_then(|v| v.as_str()).unwrap_or("user") {
            "shared" => MemoryScope::Shared,
            "user" => MemoryScope::User,
            other => return Err(ToolError::InvalidParameters(format!("invalid scope '{other}'"))),
        };

        let embedding = self
            .embeddings
            .embed(content)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let id = self
            .store
            .insert_memory(NewMemory {
                user_id: ctx.user_id,
                search_space_id: Some(ctx.search_space_id),
                scope,
                category: category.to_string(),
                content: content.to_string(),
                embedding: Some(embedding),
            })
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("write failed: {e}")))?;

        Ok(ToolOutput::success(
            serde_json::json!({ "memory_id": id.to_string(), "status": "written" }),
            start.elapsed(),
        ))
    }
}

/// `memory_read`: semantic search over a user's own memories plus any
/// `shared` memories in the current search space.
pub struct MemoryReadTool {
    store: Arc<Repository>,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl MemoryReadTool {
    pub fn new(store: Arc<Repository>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embeddings }
    }
}

#[async_trait]
impl Tool for MemoryReadTool {
    fn name(&self) -> &str {
        "memory_read"
    }

    fn description(&self) -> &str {
        "Recall previously stored memories relevant to a query. Use this before answering \
         questions about the user's preferences, prior decisions, or recurring context."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What to recall." },
                "limit": { "type": "integer", "default": 5, "minimum": 1, "maximum": 20 }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();

        let query = params
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'query' parameter".to_string()))?;
        let limit = params.get("limit").and_then(|v| v.as_u64()).unwrap_or(5).min(20) as usize;

        let embedding = self
            .embeddings
            .embed(query)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let hits = self
            .store
            .search_memories(ctx.user_id, Some(ctx.search_space_id), &embedding, limit)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("recall failed: {e}")))?;

        let output = serde_json::json!({
            "query": query,
            "memories": hits.iter().map(|(memory, score)| serde_json::json!({
                "memory_id": memory.id.to_string(),
                "category": memory.category,
                "content": memory.content,
                "score": score,
            })).collect::<Vec<_>>(),
        });

        Ok(ToolOutput::success(output, start.elapsed()))
    }
}
