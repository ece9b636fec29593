//! `generate_podcast`: an "Engine" tool per spec §9 — it returns a task
//! handle immediately rather than blocking on synthesis, since actual
//! TTS rendering is an external collaborator this crate only specifies
//! the contract for (spec §1's Non-goals list the TTS podcast
//! generator explicitly). Completion is surfaced later through the
//! Notification Bus, which the client polls or subscribes to.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::context::JobContext;
use crate::store::{NewNotification, Repository};
use crate::tools::tool::{Tool, ToolError, ToolOutput};

pub struct GeneratePodcastTool {
    store: Arc<Repository>,
}

impl GeneratePodcastTool {
    pub fn new(store: Arc<Repository>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GeneratePodcastTool {
    fn name(&self) -> &str {
        "generate_podcast"
    }

    fn description(&self) -> &str {
        "Queue generation of an audio podcast from a transcript. Returns a task id immediately; \
         completion is reported via notifications, not in this call's result."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "transcript": {
                    "type": "string",
                    "description": "The script to render as audio."
                }
            },
            "required": ["title", "transcript"]
        })
    }

    async fn execute(&self, params: serde_json::Value, ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();

        let title = params
            .get("title")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'title' parameter".to_string()))?;
        let transcript = params
            .get("transcript")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidParameters("missing or empty 'transcript' parameter".to_string()))?;

        let task_id = Uuid::new_v4();

        self.store
            .create_notification(NewNotification {
                user_id: ctx.user_id,
                search_space_id: Some(ctx.search_space_id),
                notification_type: "podcast_requested".to_string(),
                title: format!("Generating podcast: {title}"),
                message: "Your podcast is being generated.".to_string(),
                metadata: serde_json::json!({
                    "task_id": task_id,
                    "title": title,
                    "transcript_len": transcript.len(),
                    "thread_id": ctx.thread_id,
                }),
            })
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("failed to queue podcast task: {e}")))?;

        Ok(ToolOutput::success(
            serde_json::json!({ "task_id": task_id, "status": "queued" }),
            start.elapsed(),
        ))
    }

    fn requires_approval(&self) -> bool {
        true
    }
}
