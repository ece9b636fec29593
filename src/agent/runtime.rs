//! Per-ChatThread tool-calling run loop (spec §4.I / §5): claims the
//! run slot via heartbeat, walks the node graph, persists a checkpoint
//! after every transition, and observes cancellation at node
//! boundaries rather than mid-node.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Duration as ChronoDuration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::context::JobContext;
use crate::error::AgentError;
use crate::llm::{ChatMessage, Role};
use crate::store::Repository;
use crate::streaming::{StreamEvent, StreamSink};

use super::checkpoint::{CheckpointLog, Node, RunState};
use super::heartbeat::RunHandle;
use super::nodes::{AgentNodes, SpaceSettings};
use super::submission::{Submission, SubmissionResult};

/// Bound on model-selected tool-call rounds in a single run, so a model
/// that never stops requesting tools can't loop forever.
const MAX_TOOL_CALL_ROUNDS: usize = 6;

pub struct AgentRuntime {
    store: Arc<Repository>,
    nodes: Arc<AgentNodes>,
    heartbeat_ttl: ChronoDuration,
    /// In-process cancellation tokens for threads with an active run on
    /// this worker, keyed by thread id, so an `Interrupt` submission can
    /// reach the run without a round trip through Postgres.
    active: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl AgentRuntime {
    pub fn new(store: Arc<Repository>, nodes: Arc<AgentNodes>, heartbeat_ttl_seconds: i64) -> Self {
        Self {
            store,
            nodes,
            heartbeat_ttl: ChronoDuration::seconds(heartbeat_ttl_seconds),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub async fn submit(
        &self,
        ctx: JobContext,
        thread_id: Uuid,
        submission: Submission,
        settings: SpaceSettings,
        sink: Option<StreamSink>,
    ) -> SubmissionResult {
        match submission {
            Submission::Interrupt => {
                if let Some(token) = self.active.lock().unwrap().get(&thread_id) {
                    token.cancel();
                }
                SubmissionResult::Interrupted
            }
            Submission::UserMessage { content } => {
                self.run(ctx, thread_id, Some(content), settings, sink).await
            }
            Submission::Resume => self.run(ctx, thread_id, None, settings, sink).await,
        }
    }

    async fn run(
        &self,
        ctx: JobContext,
        thread_id: Uuid,
        new_message: Option<String>,
        settings: SpaceSettings,
        sink: Option<StreamSink>,
    ) -> SubmissionResult {
        let handle = match RunHandle::claim(self.store.clone(), thread_id, self.heartbeat_ttl).await {
            Ok(Some(handle)) => handle,
            Ok(None) => return SubmissionResult::Busy { thread_id },
            Err(e) => return SubmissionResult::Error { message: e.to_string() },
        };

        let cancellation = ctx.cancellation.clone();
        self.active.lock().unwrap().insert(thread_id, cancellation.clone());

        let result = self
            .run_inner(&ctx, thread_id, new_message, &settings, &cancellation, sink.as_ref())
            .await;

        self.active.lock().unwrap().remove(&thread_id);
        if let Err(e) = handle.release().await {
            tracing::warn!(%thread_id, error = %e, "failed to release run slot");
        }

        match result {
            Ok(content) => SubmissionResult::response(content),
            Err(e) => SubmissionResult::Error { message: e.to_string() },
        }
    }

    async fn run_inner(
        &self,
        ctx: &JobContext,
        thread_id: Uuid,
        new_message: Option<String>,
        settings: &SpaceSettings,
        cancellation: &CancellationToken,
        sink: Option<&StreamSink>,
    ) -> Result<String, AgentError> {
        let log = CheckpointLog::new(self.store.as_ref(), thread_id);
        let mut state = match log.latest().await? {
            Some(checkpoint) => checkpoint.state,
            None => RunState::default(),
        };

        if let Some(content) = new_message {
            state.messages.push(ChatMessage::user(content));
        }

        emit(sink, StreamEvent::State { label: "planning".into() }).await;
        log.append(Node::Plan, &state).await?;
        if cancellation.is_cancelled() {
            return Ok(last_assistant_message(&state));
        }
        self.nodes.plan(&state, ctx).await?;

        let query = last_user_message(&state);

        emit(sink, StreamEvent::State { label: "retrieving".into() }).await;
        log.append(Node::Retrieve, &state).await?;
        if cancellation.is_cancelled() {
            return Ok(last_assistant_message(&state));
        }
        let retrieved_context = self.nodes.retrieve(ctx.search_space_id, &query, &mut state).await?;

        for _ in 0..MAX_TOOL_CALL_ROUNDS {
            log.append(Node::Route, &state).await?;
            if cancellation.is_cancelled() {
                return Ok(last_assistant_message(&state));
            }
            let selections = self.nodes.route(&state, settings).await?;
            if selections.is_empty() {
                break;
            }

            for selection in selections {
                log.append(Node::ToolCall, &state).await?;
                if cancellation.is_cancelled() {
                    return Ok(last_assistant_message(&state));
                }

                emit(
                    sink,
                    StreamEvent::ToolCallStart {
                        call_id: selection.call_id.clone(),
                        name: selection.tool_name.clone(),
                        args: selection.parameters.clone(),
                    },
                )
                .await;

                state.pending_tool_call_ids.push(selection.call_id.clone());
                let outcome = self.nodes.call_tool(&selection, ctx).await;
                state.pending_tool_call_ids.retain(|id| id != &selection.call_id);

                let content = match outcome {
                    Ok(output) => output.raw.unwrap_or_else(|| output.result.to_string()),
                    Err(e) => format!("tool error: {e}"),
                };

                emit(
                    sink,
                    StreamEvent::ToolCallEnd {
                        call_id: selection.call_id.clone(),
                        result: serde_json::Value::String(content.clone()),
                    },
                )
                .await;

                state.messages.push(ChatMessage::tool_result(selection.call_id, content));
            }
        }

        emit(sink, StreamEvent::State { label: "answering".into() }).await;
        log.append(Node::Answer, &state).await?;
        let answer = self.nodes.answer(&state, settings, Some(&retrieved_context)).await?;
        emit(sink, StreamEvent::TextDelta { text: answer.clone() }).await;
        state.messages.push(ChatMessage::assistant(answer.clone()));
        log.append(Node::Answer, &state).await?;
        emit(sink, StreamEvent::Done { message_id: Uuid::new_v4() }).await;

        Ok(answer)
    }
}

async fn emit(sink: Option<&StreamSink>, event: StreamEvent) {
    if let Some(sink) = sink {
        sink.emit(event).await;
    }
}

fn last_user_message(state: &RunState) -> String {
    state
        .messages
        .iter()
        .rev()
        .find(|m| matches!(m.role, Role::User))
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

fn last_assistant_message(state: &RunState) -> String {
    state
        .messages
        .iter()
        .rev()
        .find(|m| matches!(m.role, Role::Assistant))
        .map(|m| m.content.clone())
        .unwrap_or_default()
}
