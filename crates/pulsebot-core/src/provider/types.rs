//! Shared types for the provider contract.
//!
//! These define the boundary between the tool-call loop and any LLM
//! backend: the message sequence, parsed tool-call requests, the provider
//! response, and the tool definitions handed to the backend.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A single message in a conversation sequence.
///
/// The sequence is owned by one tool-call loop invocation and discarded
/// when the loop ends — there is no cross-request persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallMessage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant_with_tool_calls(
        content: Option<&str>,
        tool_calls: Vec<ToolCallMessage>,
    ) -> Self {
        Self {
            role: "assistant".into(),
            content: content.map(Into::into),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn tool_result(tool_call_id: &str, name: &str, result: &str) -> Self {
        Self {
            role: "tool".into(),
            content: Some(result.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
        }
    }

    /// Whether this message is a tool result.
    pub fn is_tool_result(&self) -> bool {
        self.role == "tool"
    }

    /// Whether this is an assistant message carrying tool-call requests —
    /// the boundary marker of a round.
    pub fn is_round_boundary(&self) -> bool {
        self.role == "assistant" && self.tool_calls.as_ref().is_some_and(|tc| !tc.is_empty())
    }
}

/// A tool call embedded in an assistant message (wire form — arguments
/// are the raw JSON string the backend sent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

/// The function name + serialized arguments within a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// A parsed tool-call request (arguments already deserialized).
///
/// Produced by the provider from a raw backend response; consumed by the
/// tool-call loop to dispatch execution.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Map<String, Value>,
}

/// Response from a provider `send` call.
///
/// Exactly one of `text` or a non-empty `tool_calls` list should be
/// populated. The loop treats both-empty as a protocol violation; when a
/// backend populates both, tool calls take precedence.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Usage,
}

impl ProviderResponse {
    /// Convenience: a plain-text response.
    pub fn text(content: &str) -> Self {
        Self {
            text: Some(content.into()),
            ..Default::default()
        }
    }

    /// Convenience: a response requesting the given tool calls.
    pub fn calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls,
            ..Default::default()
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Tool-schema exchange format a provider speaks.
///
/// Each tool is described once (name/description/parameters); the caller
/// serializes it per the provider's declared format via
/// [`ToolSpec::to_wire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    OpenAi,
    Anthropic,
}

/// A named, schema-described capability as seen by the provider.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub parameters: Value,
    /// One-line routing hint injected into the system prompt.
    pub usage_hint: Option<String>,
}

impl ToolSpec {
    /// Serialize this tool for the given backend wire format.
    pub fn to_wire(&self, format: WireFormat) -> Value {
        match format {
            WireFormat::OpenAi => json!({
                "type": "function",
                "function": {
                    "name": self.name,
                    "description": self.description,
                    "parameters": self.parameters,
                },
            }),
            WireFormat::Anthropic => json!({
                "name": self.name,
                "description": self.description,
                "input_schema": self.parameters,
            }),
        }
    }
}
