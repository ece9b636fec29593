//! `write_todos`: the plan node's tool for emitting a to-do list as a
//! streamed UI event (spec §4.I). The tool itself holds no state — it
//! just validates and echoes the list back; the runtime is responsible
//! for forwarding the call as a `state` stream event to the client.

use async_trait::async_trait;

use crate::context::JobContext;
use crate::tools::tool::{Tool, ToolError, ToolOutput};

pub struct WriteTodosTool;

impl WriteTodosTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WriteTodosTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WriteTodosTool {
    fn name(&self) -> &str {
        "write_todos"
    }

    fn description(&self) -> &str {
        "Emit the current plan as a list of steps, each marked pending, in_progress, or done. \
         Call again to update the plan as steps complete."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "step": { "type": "string" },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "done"]
                            }
                        },
                        "required": ["step", "status"]
                    }
                }
            },
            "required": ["todos"]
        })
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();

        let todos = params
            .get("todos")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'todos' parameter".to_string()))?;

        Ok(ToolOutput::success(serde_json::json!({ "todos": todos }), start.elapsed()))
    }
}
