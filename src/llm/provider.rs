//! OpenAI-compatible chat-completion provider: the same upstream shape
//! the connector adapters and [`crate::embedder::OpenAiEmbeddings`] use
//! for their own HTTP calls, so one `reqwest::Client` idiom runs
//! through the whole crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

use super::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role, ToolCall,
    ToolCompletionRequest, ToolCompletionResponse, ToolDefinition,
};

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

fn role_str(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Default)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireToolCallFunction,
}

#[derive(Deserialize)]
struct WireToolCallFunction {
    name: String,
    arguments: String,
}

impl OpenAiProvider {
    async fn send(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
        tools: Option<Vec<ToolDefinition>>,
        tool_choice: Option<&str>,
    ) -> Result<ResponseMessage, LlmError> {
        let wire_messages = messages
            .iter()
            .map(|m| WireMessage {
                role: role_str(&m.role),
                content: &m.content,
                tool_call_id: m.tool_call_id.as_deref(),
            })
            .collect();

        let wire_tools = tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|t| WireTool {
                    kind: "function",
                    function: WireFunction {
                        name: &t.name,
                        description: &t.description,
                        parameters: &t.parameters,
                    },
                })
                .collect()
        });

        let request = ChatRequest {
            model: &self.model,
            messages: wire_messages,
            max_tokens,
            temperature,
            tools: wire_tools,
            tool_choice,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.model.clone(),
                reason: e.to_string(),
            })?;

        if resp.status() == reqwest::StatusCode::REQUEST_TIMEOUT {
            return Err(LlmError::Timeout {
                provider: self.model.clone(),
            });
        }

        let resp = resp.error_for_status().map_err(|e| LlmError::RequestFailed {
            provider: self.model.clone(),
            reason: e.to_string(),
        })?;

        let mut body: ChatResponse = resp.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: self.model.clone(),
            reason: e.to_string(),
        })?;

        body.choices
            .drain(..)
            .next()
            .map(|c| c.message)
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: self.model.clone(),
                reason: "no choices in response".to_string(),
            })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let message = self
            .send(&request.messages, request.max_tokens, request.temperature, None, None)
            .await?;

        Ok(CompletionResponse {
            content: message.content.unwrap_or_default(),
        })
    }

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        let message = self
            .send(
                &request.messages,
                request.max_tokens,
                0.2,
                Some(request.tools),
                Some(&request.tool_choice),
            )
            .await?;

        let tool_calls = message
            .tool_calls
            .into_iter()
            .map(|tc| {
                let arguments = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::Null);
                ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments,
                }
            })
            .collect();

        Ok(ToolCompletionResponse {
            content: message.content,
            tool_calls,
        })
    }
}
