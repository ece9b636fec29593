//! Tool layer: the capability seam the agent's tool-call node dispatches
//! through (spec §4.I), plus the concrete built-ins and the MCP client
//! used by tools that delegate to an external server.

pub mod builtin;
pub mod mcp;
pub mod tool;

use std::collections::HashMap;
use std::sync::Arc;

use crate::llm::ToolDefinition;

pub use tool::{Tool, ToolError, ToolOutput};

/// Name-keyed lookup the agent's tool-call node uses to resolve a
/// model-requested tool call to a concrete [`Tool`] impl. Registration
/// happens once at startup; lookups never mutate it afterwards.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// JSON Schema function definitions for every registered tool, in
    /// the shape an LLM provider's `tools` request field expects.
    pub fn schemas(&self) -> Vec<serde_json::Value> {
        self.tools
            .values()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema(),
                })
            })
            .collect()
    }

    /// [`ToolDefinition`]s for every registered tool, the shape
    /// [`crate::llm::LlmProvider::complete_with_tools`] expects.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::JobContext;
    use async_trait::async_trait;

    struct PingTool;

    #[async_trait]
    impl Tool for PingTool {
        fn name(&self) -> &str {
            "ping"
        }
        fn description(&self) -> &str {
            "Replies pong."
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _params: serde_json::Value, _ctx: &JobContext) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::text("pong", std::time::Duration::from_millis(0)))
        }
    }

    #[test]
    fn register_and_lookup_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(PingTool));
        assert!(registry.get("ping").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.schemas().len(), 1);
    }
}
