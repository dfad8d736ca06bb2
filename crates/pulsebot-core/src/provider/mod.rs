//! Provider contract and shared sequence operations.
//!
//! `ChatProvider` is the uniform surface over chat-completion backends:
//! build a message sequence, send it with the available tools, append tool
//! results back, and compress consumed results. The `openai` module covers
//! every OpenAI-compatible endpoint; `mock` is the scripted offline
//! provider used for tests and as the out-of-the-box default.

pub mod mock;
pub mod openai;
pub mod types;

use async_trait::async_trait;

use types::{
    ChatMessage, FunctionCall, ProviderResponse, ToolCallMessage, ToolCallRequest, ToolSpec,
    WireFormat,
};

/// Tool results longer than this are compressed once a later round has
/// consumed them. Shorter results cost about as much as the marker itself.
pub const COMPRESS_THRESHOLD: usize = 200;

/// Uniform contract over chat-completion backends.
///
/// One instance is shared by the tool-call loop and every background job.
/// Sequence-editing methods mutate the message list in place.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// The tool-schema exchange format this backend expects.
    fn wire_format(&self) -> WireFormat {
        WireFormat::OpenAi
    }

    /// Build the initial message sequence for one invocation.
    fn build_messages(&self, system_prompt: &str, user_prompt: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_prompt),
        ]
    }

    /// Send the sequence with the available tools and parse the reply.
    async fn send(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> anyhow::Result<ProviderResponse>;

    /// Append the assistant message carrying this response's tool calls.
    /// Must be called before the results are appended so the sequence
    /// keeps request/result linkage intact.
    fn append_tool_calls(&self, messages: &mut Vec<ChatMessage>, response: &ProviderResponse) {
        let calls = response
            .tool_calls
            .iter()
            .map(|tc| ToolCallMessage {
                id: tc.id.clone(),
                call_type: "function".into(),
                function: FunctionCall {
                    name: tc.name.clone(),
                    arguments: serde_json::to_string(&tc.arguments).unwrap_or_default(),
                },
            })
            .collect();
        messages.push(ChatMessage::assistant_with_tool_calls(
            response.text.as_deref(),
            calls,
        ));
    }

    /// Append one tool result, linked to the request it answers.
    fn append_tool_result(
        &self,
        messages: &mut Vec<ChatMessage>,
        call: &ToolCallRequest,
        result: &str,
    ) {
        messages.push(ChatMessage::tool_result(&call.id, &call.name, result));
    }

    /// Compress tool results from rounds strictly older than the most
    /// recent one. See [`compress_tool_results`].
    fn compress_tool_results(&self, messages: &mut [ChatMessage]) {
        compress_tool_results(messages, COMPRESS_THRESHOLD);
    }
}

/// Replace consumed tool results with a short length-preserving marker.
///
/// The most recent assistant-with-tool-calls message marks the newest
/// round; every tool result *before* it whose content exceeds `threshold`
/// chars is replaced. Results of the newest round are never touched — the
/// model has not produced a response computed with them yet. Markers are
/// shorter than the threshold, so a second pass is a no-op.
///
/// This bounds steady-state context growth to one round of full tool
/// output plus a constant per prior round.
pub fn compress_tool_results(messages: &mut [ChatMessage], threshold: usize) {
    let Some(boundary) = messages.iter().rposition(ChatMessage::is_round_boundary) else {
        return;
    };

    for msg in &mut messages[..boundary] {
        if !msg.is_tool_result() {
            continue;
        }
        let Some(content) = msg.content.as_ref() else {
            continue;
        };
        let len = content.chars().count();
        if len > threshold {
            msg.content = Some(format!("[compressed tool result: {} chars]", len));
        }
    }
}
