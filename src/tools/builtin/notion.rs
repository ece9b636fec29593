//! `create_notion_page`: the agent's write-side counterpart to the
//! read-only Notion connector, delegating to the same MCP server
//! rather than a bespoke REST client.
//!
//! Grounded in `original_source`'s `create_notion_page.py`, which posts
//! a page body to Notion's MCP tool of the same name; here that call
//! goes through [`McpClient::call_tool`] instead of a raw HTTP POST.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::JobContext;
use crate::tools::mcp::McpClient;
use crate::tools::tool::{Tool, ToolError, ToolOutput};

pub struct CreateNotionPageTool {
    mcp: Arc<McpClient>,
}

impl CreateNotionPageTool {
    pub fn new(mcp: Arc<McpClient>) -> Self {
        Self { mcp }
    }
}

#[async_trait]
impl Tool for CreateNotionPageTool {
    fn name(&self) -> &str {
        "create_notion_page"
    }

    fn description(&self) -> &str {
        "Create a new page in the user's connected Notion workspace."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "parent_page_id": {
                    "type": "string",
                    "description": "The Notion page or database to create this page under."
                },
                "title": { "type": "string" },
                "markdown_content": {
                    "type": "string",
                    "description": "Page body as Markdown."
                }
            },
            "required": ["parent_page_id", "title", "markdown_content"]
        })
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();

        for field in ["parent_page_id", "title", "markdown_content"] {
            if params.get(field).and_then(|v| v.as_str()).is_none() {
                return Err(ToolError::InvalidParameters(format!("missing '{field}' parameter")));
            }
        }

        let result = self.mcp.call_tool("create_notion_page", params).await?;

        let content: String = result
            .content
            .iter()
            .filter_map(|block| block.as_text())
            .collect::<Vec<_>>()
            .join("\n");

        if result.is_error {
            return Err(ToolError::ExecutionFailed(content));
        }

        Ok(ToolOutput::text(content, start.elapsed()))
    }

    fn requires_sanitization(&self) -> bool {
        true
    }

    fn requires_approval(&self) -> bool {
        true
    }
}
