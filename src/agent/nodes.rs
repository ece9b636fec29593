//! The five node bodies of the agent graph (spec §4.I): plan, route,
//! retrieve, tool-call, answer. Each node takes the run's
//! [`RunState`] and returns the updated state; the runtime decides node
//! order and persists a checkpoint after each transition.

use std::sync::Arc;

use uuid::Uuid;

use crate::context::JobContext;
use crate::error::AgentError;
use crate::llm::reasoning::{Reasoning, ReasoningContext, ToolSelection};
use crate::llm::{ChatMessage, ToolDefinition};
use crate::retriever::HybridRetriever;
use crate::store::{Repository, SearchFilters};
use crate::tools::{ToolOutput, ToolRegistry};

use super::checkpoint::RunState;

/// Per-space settings that shape how nodes prompt the model, carried
/// over from `SearchSpace.qna_instructions` / `citations_enabled`.
pub struct SpaceSettings {
    pub qna_instructions: Option<String>,
    pub citations_enabled: bool,
}

pub struct AgentNodes {
    reasoning: Reasoning,
    retriever: Arc<HybridRetriever>,
    tools: Arc<ToolRegistry>,
    store: Arc<Repository>,
}

impl AgentNodes {
    pub fn new(
        reasoning: Reasoning,
        retriever: Arc<HybridRetriever>,
        tools: Arc<ToolRegistry>,
        store: Arc<Repository>,
    ) -> Self {
        Self { reasoning, retriever, tools, store }
    }

    /// **plan**: optionally emits a to-do list via the `write_todos`
    /// tool so the client can render plan progress as a stream event.
    /// Skipped when the tool isn't registered for this space.
    pub async fn plan(&self, state: &RunState, ctx: &JobContext) -> Result<Option<ToolOutput>, AgentError> {
        let Some(write_todos) = self.tools.get("write_todos") else {
            return Ok(None);
        };

        let context = ReasoningContext::new()
            .with_preamble(
                "Before doing anything else, call write_todos with the steps you intend to take. \
                 If the request is trivial, skip straight to answering instead.",
            )
            .with_message_list(state.messages.clone())
            .with_tools(vec![ToolDefinition {
                name: write_todos.name().to_string(),
                description: write_todos.description().to_string(),
                parameters: write_todos.parameters_schema(),
            }]);

        let selections = self.reasoning.select_tools(&context).await.map_err(AgentError::Llm)?;
        let Some(selection) = selections.into_iter().find(|s| s.tool_name == "write_todos") else {
            return Ok(None);
        };

        let output = write_todos
            .execute(selection.parameters, ctx)
            .await
            .map_err(AgentError::Tool)?;
        Ok(Some(output))
    }

    /// **route**: asks the model which tool(s), if any, to call next
    /// given the conversation and the space's enabled tools.
    pub async fn route(&self, state: &RunState, settings: &SpaceSettings) -> Result<Vec<ToolSelection>, AgentError> {
        let mut context = ReasoningContext::new().with_message_list(state.messages.clone());
        if let Some(preamble) = &settings.qna_instructions {
            context = context.with_preamble(preamble.clone());
        }
        context = context.with_tools(self.tools.definitions());

        self.reasoning.select_tools(&context).await.map_err(AgentError::Llm)
    }

    /// **retrieve**: runs the Hybrid Retriever and formats hits as
    /// `[citation:doc-ID]`-anchored context for the answer node,
    /// recording every cited document id onto the run state.
    pub async fn retrieve(
        &self,
        space_id: Uuid,
        query: &str,
        state: &mut RunState,
    ) -> Result<String, AgentError> {
        let ranked = self
            .retriever
            .search(space_id, query, &SearchFilters::default(), 8)
            .await
            .map_err(AgentError::Retriever)?;

        let chunk_ids: Vec<Uuid> = ranked.iter().flat_map(|d| d.chunks.iter().map(|c| c.chunk_id)).collect();
        let chunks = self.store.get_chunks(&chunk_ids).await.map_err(AgentError::Store)?;
        let content_by_id: std::collections::HashMap<Uuid, &str> =
            chunks.iter().map(|c| (c.id, c.content.as_str())).collect();

        let mut context = String::new();
        for doc in &ranked {
            state.citations.push(doc.document_id);
            context.push_str(&format!("[citation:{}]\n", doc.document_id));
            for chunk in &doc.chunks {
                if let Some(text) = content_by_id.get(&chunk.chunk_id) {
                    context.push_str(text);
                    context.push('\n');
                }
            }
        }
        Ok(context)
    }

    /// **tool-call**: executes exactly one model-selected tool call.
    /// Podcast generation returns its task handle immediately here; the
    /// runtime does not block the conversation waiting on it.
    pub async fn call_tool(&self, selection: &ToolSelection, ctx: &JobContext) -> Result<ToolOutput, AgentError> {
        let tool = self
            .tools
            .get(&selection.tool_name)
            .ok_or_else(|| AgentError::UnknownTool { name: selection.tool_name.clone() })?;
        tool.execute(selection.parameters.clone(), ctx).await.map_err(AgentError::Tool)
    }

    /// **answer**: generates the final assistant message conditioned on
    /// retrieved context, the citations-enabled flag, and the space's
    /// custom instructions.
    pub async fn answer(
        &self,
        state: &RunState,
        settings: &SpaceSettings,
        retrieved_context: Option<&str>,
    ) -> Result<String, AgentError> {
        let mut preamble = settings.qna_instructions.clone().unwrap_or_default();
        if settings.citations_enabled {
            preamble.push_str(
                "\nCite sources inline using [citation:doc-ID] anchors for any claim drawn from \
                 retrieved context.",
            );
        } else {
            preamble.push_str("\nDo not emit citation anchors in your answer.");
        }

        let mut context = ReasoningContext::new().with_preamble(preamble).with_message_list(state.messages.clone());
        if let Some(retrieved) = retrieved_context {
            context = context.with_message(ChatMessage::system(format!(
                "Retrieved context:\n{retrieved}"
            )));
        }

        self.reasoning.respond(&context).await.map_err(AgentError::Llm)
    }
}

