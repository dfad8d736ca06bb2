//! Mention handling — the tool-call loop.
//!
//! One invocation per inbound user turn. Each round: the provider
//! responds; any requested tool calls are validated, executed and fed
//! back; the loop ends when the provider returns plain text or the round
//! limit is hit. Between rounds, tool results the model has already
//! consumed are compressed so context growth stays bounded.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::prompts;
use crate::error::CoreError;
use crate::provider::ChatProvider;
use crate::tools::ToolRegistry;

/// Truncate tool results and replies in logs to keep them readable.
const LOG_RESULT_MAX: usize = 200;

/// Tuning knobs for the loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Hard cap on provider rounds per invocation.
    pub max_rounds: u32,
    /// Pause between rounds, bounding request rate to the backend.
    pub round_pause: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            round_pause: Duration::from_secs(1),
        }
    }
}

/// One entry of recent channel history supplied by the transport.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub author: String,
    pub content: String,
}

/// Handles one user turn through the tool-call loop.
///
/// Holds no mutable state — the message sequence lives on the stack of
/// each `handle` call, so concurrent invocations are independent.
pub struct MentionHandler {
    provider: Arc<dyn ChatProvider>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    config: LoopConfig,
}

impl MentionHandler {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        tools: Arc<ToolRegistry>,
        config: LoopConfig,
    ) -> Self {
        let system_prompt = prompts::build_system_prompt(&tools.tool_hints(), !tools.is_empty());
        Self {
            provider,
            tools,
            system_prompt,
            config,
        }
    }

    /// Process a mention: build context, call the provider, orchestrate
    /// the tool-call loop.
    ///
    /// Always returns a string — errors are caught and turned into a
    /// user-visible message so the transport never sees a raw failure.
    pub async fn handle(&self, content: &str, history: &[HistoryEntry]) -> String {
        match self.run_loop(content, history).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "Unhandled error in mention handler");
                "Something went wrong while processing your request. Please try again later."
                    .into()
            }
        }
    }

    async fn run_loop(&self, content: &str, history: &[HistoryEntry]) -> anyhow::Result<String> {
        info!(
            length = content.len(),
            history = history.len(),
            tools = ?self.tools.names(),
            "Handling mention"
        );

        let user_prompt = build_user_prompt(content, history);
        let mut messages = self
            .provider
            .build_messages(&self.system_prompt, &user_prompt);
        let tool_specs = self.tools.specs();

        for round in 1..=self.config.max_rounds {
            debug!(round, max = self.config.max_rounds, msg_count = messages.len(), "Tool-call loop round");

            let response = self.provider.send(&messages, &tool_specs).await?;

            // Tool calls take precedence when a backend populates both.
            if response.tool_calls.is_empty() {
                let text = match response.text {
                    Some(t) if !t.is_empty() => t,
                    // Neither text nor tool calls: protocol violation,
                    // never silently treated as completion.
                    _ => return Err(CoreError::EmptyResponse.into()),
                };
                info!(round, length = text.len(), reply = %preview(&text), "Model returned text");
                return Ok(text);
            }

            info!(
                round,
                count = response.tool_calls.len(),
                tools = ?response.tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "Model requested tool calls"
            );

            self.provider.append_tool_calls(&mut messages, &response);

            // Execute in the order the provider emitted the calls — later
            // calls in a round may assume earlier ones already ran.
            for call in &response.tool_calls {
                let Some(tool) = self.tools.get(&call.name) else {
                    warn!(tool = %call.name, "Unknown tool requested");
                    self.provider.append_tool_result(
                        &mut messages,
                        call,
                        &format!("Error: unknown tool '{}'", call.name),
                    );
                    continue;
                };

                let payload = Value::Object(call.arguments.clone());
                if let Err(detail) = self.tools.check_args(&call.name, &payload) {
                    warn!(tool = %call.name, error = %detail, "Invalid tool arguments");
                    self.provider.append_tool_result(
                        &mut messages,
                        call,
                        &format!(
                            "Parameter error: {}. Check the tool schema and retry.",
                            detail
                        ),
                    );
                    continue;
                }

                debug!(tool = %call.name, args = %payload, "Executing tool");
                let result = tool.execute(call.arguments.clone()).await;
                debug!(tool = %call.name, length = result.len(), result = %preview(&result), "Tool result");

                self.provider.append_tool_result(&mut messages, call, &result);
            }

            // The model has consumed everything before this round's
            // results — compress older tool output so the next request
            // doesn't re-send large payloads.
            self.provider.compress_tool_results(&mut messages);

            if round < self.config.max_rounds && !self.config.round_pause.is_zero() {
                debug!("Pausing before next round");
                tokio::time::sleep(self.config.round_pause).await;
            }
        }

        warn!(max_rounds = self.config.max_rounds, "Tool-call loop hit round limit");
        Ok("Sorry, I got stuck in a loop. Please try again.".into())
    }
}

/// Build the user prompt from the message plus recent channel history.
fn build_user_prompt(content: &str, history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return content.to_string();
    }

    let context = history
        .iter()
        .map(|m| format!("{}: {}", m.author, m.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "[Recent channel messages]\n{}\n\n[User message]\n{}",
        context, content
    )
}

/// Collapse newlines so multi-line text stays on one log line.
fn preview(text: &str) -> String {
    text.chars()
        .take(LOG_RESULT_MAX)
        .collect::<String>()
        .replace('\n', " | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::{json, Map};

    use crate::provider::mock::MockProvider;
    use crate::provider::types::{ProviderResponse, ToolCallRequest};
    use crate::tools::Tool;

    struct EchoTool {
        executions: AtomicUsize,
        reply: String,
    }

    impl EchoTool {
        fn new(reply: &str) -> Self {
            Self {
                executions: AtomicUsize::new(0),
                reply: reply.into(),
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes a fixed reply"
        }
        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            })
        }
        async fn execute(&self, _args: Map<String, Value>) -> String {
            self.executions.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn call(id: &str, name: &str, args: Value) -> ToolCallRequest {
        let arguments = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        ToolCallRequest {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    fn handler_with(
        provider: Arc<MockProvider>,
        tool: Option<Arc<EchoTool>>,
    ) -> MentionHandler {
        let mut registry = ToolRegistry::new();
        if let Some(t) = tool {
            registry.register(t).unwrap();
        }
        MentionHandler::new(
            provider,
            Arc::new(registry),
            LoopConfig {
                max_rounds: 10,
                round_pause: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn test_text_response_returns_immediately() {
        let provider = Arc::new(MockProvider::scripted(vec![ProviderResponse::text("hello")]));
        let tool = Arc::new(EchoTool::new("unused"));
        let handler = handler_with(provider.clone(), Some(tool.clone()));

        let reply = handler.handle("hi", &[]).await;
        assert_eq!(reply, "hello");
        assert_eq!(provider.calls(), 1);
        assert_eq!(tool.executions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tool_round_then_text() {
        let provider = Arc::new(MockProvider::scripted(vec![
            ProviderResponse::calls(vec![call("c1", "echo", json!({"text": "x"}))]),
            ProviderResponse::text("done"),
        ]));
        let tool = Arc::new(EchoTool::new("echoed"));
        let handler = handler_with(provider.clone(), Some(tool.clone()));

        let reply = handler.handle("go", &[]).await;
        assert_eq!(reply, "done");
        assert_eq!(tool.executions.load(Ordering::SeqCst), 1);

        // The second send must have seen the appended tool result.
        let seen = provider.sequences_seen();
        let last = &seen[1];
        let result_msg = last.iter().find(|m| m.is_tool_result()).unwrap();
        assert_eq!(result_msg.content.as_deref(), Some("echoed"));
        assert_eq!(result_msg.tool_call_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_execute() {
        let provider = Arc::new(MockProvider::scripted(vec![
            // "text" is required and must be a string.
            ProviderResponse::calls(vec![call("c1", "echo", json!({"text": 42}))]),
            ProviderResponse::text("recovered"),
        ]));
        let tool = Arc::new(EchoTool::new("echoed"));
        let handler = handler_with(provider.clone(), Some(tool.clone()));

        let reply = handler.handle("go", &[]).await;
        assert_eq!(reply, "recovered");
        assert_eq!(tool.executions.load(Ordering::SeqCst), 0, "execute must not run");

        let seen = provider.sequences_seen();
        let results: Vec<_> = seen[1].iter().filter(|m| m.is_tool_result()).collect();
        assert_eq!(results.len(), 1, "exactly one synthesized error result");
        assert!(results[0]
            .content
            .as_deref()
            .unwrap()
            .starts_with("Parameter error:"));
    }

    #[tokio::test]
    async fn test_unknown_tool_continues() {
        let provider = Arc::new(MockProvider::scripted(vec![
            ProviderResponse::calls(vec![call("c1", "missing_tool", json!({}))]),
            ProviderResponse::text("still fine"),
        ]));
        let handler = handler_with(provider.clone(), Some(Arc::new(EchoTool::new("x"))));

        let reply = handler.handle("go", &[]).await;
        assert_eq!(reply, "still fine");

        let seen = provider.sequences_seen();
        let result = seen[1].iter().find(|m| m.is_tool_result()).unwrap();
        assert_eq!(
            result.content.as_deref(),
            Some("Error: unknown tool 'missing_tool'")
        );
    }

    #[tokio::test]
    async fn test_pathological_provider_hits_round_limit() {
        // Unscripted MockProvider would return text; script 10 rounds of
        // tool calls so every round requests work.
        let script: Vec<ProviderResponse> = (0..10)
            .map(|i| ProviderResponse::calls(vec![call(&format!("c{}", i), "echo", json!({"text": "x"}))]))
            .collect();
        let provider = Arc::new(MockProvider::scripted(script));
        let tool = Arc::new(EchoTool::new("r"));
        let handler = handler_with(provider.clone(), Some(tool.clone()));

        let reply = handler.handle("go", &[]).await;
        assert_eq!(reply, "Sorry, I got stuck in a loop. Please try again.");
        assert_eq!(provider.calls(), 10, "one provider call per round, then stop");
        assert_eq!(tool.executions.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_older_round_compressed_before_third_send() {
        let long = "z".repeat(500);
        let provider = Arc::new(MockProvider::scripted(vec![
            ProviderResponse::calls(vec![call("c1", "echo", json!({"text": "a"}))]),
            ProviderResponse::calls(vec![call("c2", "echo", json!({"text": "b"}))]),
            ProviderResponse::text("done"),
        ]));
        let tool = Arc::new(EchoTool::new(&long));
        let handler = handler_with(provider.clone(), Some(tool.clone()));

        let reply = handler.handle("go", &[]).await;
        assert_eq!(reply, "done");

        let seen = provider.sequences_seen();
        // Round 2 saw round 1's result in full.
        let round2_result = seen[1].iter().find(|m| m.is_tool_result()).unwrap();
        assert_eq!(round2_result.content.as_deref().unwrap().len(), 500);

        // Round 3 saw round 1 compressed but round 2 in full.
        let round3_results: Vec<_> = seen[2].iter().filter(|m| m.is_tool_result()).collect();
        assert_eq!(round3_results.len(), 2);
        assert_eq!(
            round3_results[0].content.as_deref(),
            Some("[compressed tool result: 500 chars]")
        );
        assert_eq!(round3_results[1].content.as_deref().unwrap().len(), 500);
    }

    #[tokio::test]
    async fn test_empty_response_is_user_visible_failure() {
        let provider = Arc::new(MockProvider::scripted(vec![ProviderResponse::default()]));
        let handler = handler_with(provider, None);

        let reply = handler.handle("hi", &[]).await;
        assert!(reply.contains("Something went wrong"));
    }

    #[test]
    fn test_user_prompt_includes_history() {
        let history = vec![
            HistoryEntry {
                author: "alice".into(),
                content: "what's up".into(),
            },
            HistoryEntry {
                author: "bot".into(),
                content: "not much".into(),
            },
        ];
        let prompt = build_user_prompt("remind me", &history);
        assert!(prompt.starts_with("[Recent channel messages]\nalice: what's up\nbot: not much"));
        assert!(prompt.ends_with("[User message]\nremind me"));

        assert_eq!(build_user_prompt("plain", &[]), "plain");
    }
}
