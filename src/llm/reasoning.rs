//! Tool-selection and answer-generation prompts shared by the agent
//! graph's `route` and `answer` nodes.

use std::sync::Arc;

use crate::error::LlmError;
use crate::llm::{
    ChatMessage, CompletionRequest, LlmProvider, ToolCompletionRequest, ToolDefinition,
};

/// Context for a single reasoning call: history so far, the tools the
/// thread's search space has enabled, and citation instructions.
pub struct ReasoningContext {
    pub messages: Vec<ChatMessage>,
    pub available_tools: Vec<ToolDefinition>,
    pub system_preamble: Option<String>,
}

impl ReasoningContext {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            available_tools: Vec::new(),
            system_preamble: None,
        }
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_message_list(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.available_tools = tools;
        self
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.system_preamble = Some(preamble.into());
        self
    }
}

impl Default for ReasoningContext {
    fn default() -> Self {
        Self::new()
    }
}

/// One tool the `route` node decided to invoke this step.
#[derive(Debug, Clone)]
pub struct ToolSelection {
    pub tool_name: String,
    pub parameters: serde_json::Value,
    pub call_id: String,
}

pub struct Reasoning {
    llm: Arc<dyn LlmProvider>,
}

impl Reasoning {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// `route` node: ask the model which tool(s), if any, to call next.
    /// An empty result means the model is ready to answer directly.
    pub async fn select_tools(
        &self,
        context: &ReasoningContext,
    ) -> Result<Vec<ToolSelection>, LlmError> {
        if context.available_tools.is_empty() {
            return Ok(vec![]);
        }

        let request =
            ToolCompletionRequest::new(context.messages.clone(), context.available_tools.clone())
                .with_max_tokens(1024)
                .with_tool_choice("auto");

        let response = self.llm.complete_with_tools(request).await?;

        Ok(response
            .tool_calls
            .into_iter()
            .map(|tool_call| ToolSelection {
                tool_name: tool_call.name,
                parameters: tool_call.arguments,
                call_id: tool_call.id,
            })
            .collect())
    }

    /// `answer` node: produce the final assistant message once retrieval
    /// and any tool calls are done.
    pub async fn respond(&self, context: &ReasoningContext) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(context.messages.len() + 1);
        if let Some(ref preamble) = context.system_preamble {
            messages.push(ChatMessage::system(preamble.clone()));
        }
        messages.extend(context.messages.clone());

        let request = CompletionRequest::new(messages)
            .with_max_tokens(2048)
            .with_temperature(0.7);

        let response = self.llm.complete(request).await?;
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_context_builder() {
        let context = ReasoningContext::new()
            .with_message(ChatMessage::user("Hello"))
            .with_preamble("Be concise.");

        assert_eq!(context.messages.len(), 1);
        assert!(context.system_preamble.is_some());
    }
}
