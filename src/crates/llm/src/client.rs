//! The chat-completion HTTP client.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::LlmConfig;
use crate::error::{LlmError, Result};

/// Message role in a chat exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Response-format constraint attached to a request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Force the response to validate against a named JSON schema.
    JsonSchema { json_schema: NamedSchema },
    /// Force a generic JSON object response.
    JsonObject,
}

/// Schema payload for [`ResponseFormat::JsonSchema`].
#[derive(Debug, Clone, Serialize)]
pub struct NamedSchema {
    pub name: String,
    pub schema: Value,
}

impl ResponseFormat {
    pub fn json_schema(name: impl Into<String>, schema: Value) -> Self {
        ResponseFormat::JsonSchema {
            json_schema: NamedSchema {
                name: name.into(),
                schema,
            },
        }
    }
}

/// A callable tool advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSpec,
}

/// Function payload of a tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionSpec {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub function: FunctionCall,
}

/// Function name and raw JSON arguments of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// The full assistant message, including any tool calls.
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

/// Client for an OpenAI-compatible chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    config: LlmConfig,
    client: Client,
}

impl ChatClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    async fn post(
        &self,
        model: &str,
        messages: &[ChatMessage],
        response_format: Option<&ResponseFormat>,
        tools: Option<&[ToolDefinition]>,
        tool_choice: Option<&str>,
    ) -> Result<AssistantMessage> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatRequestBody {
            model,
            messages,
            response_format,
            tools,
            tool_choice,
        };

        tracing::debug!(model, messages = messages.len(), "chat completion request");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponseBody = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| LlmError::InvalidResponse("response contained no choices".to_string()))
    }

    /// Submit messages and return the assistant's text content.
    pub async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        response_format: Option<ResponseFormat>,
    ) -> Result<String> {
        let message = self
            .post(model, &messages, response_format.as_ref(), None, None)
            .await?;
        message
            .content
            .ok_or_else(|| LlmError::InvalidResponse("assistant message had no content".to_string()))
    }

    /// Submit messages with tools and return the full assistant message,
    /// including any tool-call payloads.
    pub async fn chat_full(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
        tool_choice: Option<&str>,
    ) -> Result<AssistantMessage> {
        self.post(model, &messages, None, Some(tools), tool_choice)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_omits_absent_fields() {
        let messages = vec![ChatMessage::user("hello")];
        let body = ChatRequestBody {
            model: "gpt-5-nano",
            messages: &messages,
            response_format: None,
            tools: None,
            tool_choice: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-5-nano");
        assert!(json.get("response_format").is_none());
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn json_schema_format_serialises_like_the_api_expects() {
        let format = ResponseFormat::json_schema("facts", serde_json::json!({"type": "object"}));
        let json = serde_json::to_value(&format).unwrap();
        assert_eq!(json["type"], "json_schema");
        assert_eq!(json["json_schema"]["name"], "facts");
        assert_eq!(json["json_schema"]["schema"]["type"], "object");
    }

    #[test]
    fn assistant_message_parses_tool_calls() {
        let json = serde_json::json!({
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "function": {"name": "query_facts", "arguments": "{\"subjects\": [\"John\"]}"}
            }]
        });
        let message: AssistantMessage = serde_json::from_value(json).unwrap();
        assert!(message.content.is_none());
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].function.name, "query_facts");
    }
}
