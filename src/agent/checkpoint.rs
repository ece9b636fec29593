//! Append-only checkpoint log (spec §4.I / §9): the agent persists its
//! state after every node transition so a crashed request can resume,
//! and so a clone can hand the thread to a fresh worker mid-run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AgentError;
use crate::llm::ChatMessage;
use crate::store::Repository;

/// Which node produced this checkpoint, per the node list in spec §4.I.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Plan,
    Route,
    Retrieve,
    ToolCall,
    Answer,
}

impl Node {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Route => "route",
            Self::Retrieve => "retrieve",
            Self::ToolCall => "tool_call",
            Self::Answer => "answer",
        }
    }
}

/// The full resumable state of one run: conversation so far, any
/// pending tool calls, and retrieved context carried between nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    pub messages: Vec<ChatMessage>,
    pub citations: Vec<Uuid>,
    pub pending_tool_call_ids: Vec<String>,
}

pub struct Checkpoint {
    pub step_no: i64,
    pub node: Node,
    pub state: RunState,
}

/// Thin wrapper over [`Repository`]'s checkpoint rows that knows how to
/// serialise/deserialise [`RunState`] and enforce the monotonic
/// `step_no` sequence.
pub struct CheckpointLog<'a> {
    store: &'a Repository,
    thread_id: Uuid,
}

impl<'a> CheckpointLog<'a> {
    pub fn new(store: &'a Repository, thread_id: Uuid) -> Self {
        Self { store, thread_id }
    }

    pub async fn append(&self, node: Node, state: &RunState) -> Result<i64, AgentError> {
        let next_step = match self.store.latest_checkpoint(self.thread_id).await? {
            Some((last_step, _, _)) => last_step + 1,
            None => 0,
        };
        let blob = serde_json::to_value(state).map_err(|e| AgentError::CorruptCheckpoint {
            thread_id: self.thread_id,
            reason: e.to_string(),
        })?;
        self.store
            .append_checkpoint(self.thread_id, next_step, node.as_str(), &blob)
            .await?;
        Ok(next_step)
    }

    pub async fn latest(&self) -> Result<Option<Checkpoint>, AgentError> {
        let Some((step_no, node_str, blob)) = self.store.latest_checkpoint(self.thread_id).await? else {
            return Ok(None);
        };
        let node = parse_node(&node_str).ok_or_else(|| AgentError::CorruptCheckpoint {
            thread_id: self.thread_id,
            reason: format!("unknown node `{node_str}`"),
        })?;
        let state: RunState = serde_json::from_value(blob).map_err(|e| AgentError::CorruptCheckpoint {
            thread_id: self.thread_id,
            reason: e.to_string(),
        })?;
        Ok(Some(Checkpoint { step_no, node, state }))
    }
}

fn parse_node(s: &str) -> Option<Node> {
    match s {
        "plan" => Some(Node::Plan),
        "route" => Some(Node::Route),
        "retrieve" => Some(Node::Retrieve),
        "tool_call" => Some(Node::ToolCall),
        "answer" => Some(Node::Answer),
        _ => None,
    }
}
