//! The `Tool` capability trait the agent's tool-call node dispatches
//! through. Carried over from the teacher's tool layer unchanged in
//! shape: callers never match on a concrete tool type, only on
//! `name()`/`parameters_schema()`/`execute()`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::context::JobContext;

pub use crate::error::ToolError;

#[derive(Debug, Clone, Serialize)]
pub struct ToolOutput {
    pub success: bool,
    pub result: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(result: serde_json::Value, duration: Duration) -> Self {
        Self {
            success: true,
            result,
            raw: None,
            duration,
        }
    }

    pub fn text(content: impl Into<String>, duration: Duration) -> Self {
        let content = content.into();
        Self {
            success: true,
            result: serde_json::Value::String(content),
            raw: None,
            duration,
        }
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &JobContext,
    ) -> Result<ToolOutput, ToolError>;

    fn estimated_duration(&self, _params: &serde_json::Value) -> Option<Duration> {
        None
    }

    /// Whether the tool's output came from an untrusted external source
    /// and must be sanitized before being fed back into the model.
    fn requires_sanitization(&self) -> bool {
        false
    }

    /// Whether invoking this tool needs the user's up-front consent
    /// (destructive or externally visible side effects).
    fn requires_approval(&self) -> bool {
        false
    }
}
