//! Optional reranking pass over the RRF-fused, grouped documents.
//!
//! Per §4.H's supplement: the reranker is a trait object so it can be
//! swapped for a cross-encoder HTTP call, a local model, or omitted
//! entirely; the retriever falls back to RRF order whenever no
//! reranker is configured or the call fails.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RetrieverError;
use crate::llm::LlmProvider;

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score each `(document_id, concatenated_chunk_text)` candidate
    /// against `query`. Missing entries in the returned map are treated
    /// as "keep the RRF score" by the caller.
    async fn rerank(
        &self,
        query: &str,
        candidates: &[(Uuid, String)],
    ) -> Result<HashMap<Uuid, f64>, RetrieverError>;
}

/// A reranker that asks a chat-completion model to score each document
/// 0.0-1.0 for relevance, one call per candidate. Grounded in the same
/// `LlmProvider` seam the agent runtime uses for everything else —
/// there is no separate cross-encoder crate in the teacher's stack, so
/// reranking is just another completion call with a constrained
/// prompt.
pub struct LlmReranker {
    llm: std::sync::Arc<dyn LlmProvider>,
}

impl LlmReranker {
    pub fn new(llm: std::sync::Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Reranker for LlmReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[(Uuid, String)],
    ) -> Result<HashMap<Uuid, f64>, RetrieverError> {
        use crate::llm::{ChatMessage, CompletionRequest};

        let mut scores = HashMap::with_capacity(candidates.len());
        for (document_id, text) in candidates {
            let snippet: String = text.chars().take(2000).collect();
            let prompt = format!(
                "Query: {query}\n\nDocument:\n{snippet}\n\n\
                 Rate how relevant this document is to the query on a scale from 0.0 to 1.0. \
                 Respond with only the number."
            );
            let request = CompletionRequest::new(vec![ChatMessage::user(prompt)]);
            let response = self
                .llm
                .complete(request)
                .await
                .map_err(|e| RetrieverError::Reranker(e.to_string()))?;

            let score: f64 = response.content.trim().parse().unwrap_or(0.0);
            scores.insert(*document_id, score.clamp(0.0, 1.0));
        }
        Ok(scores)
    }
}
