//! Mock provider — scripted responses for tests and offline use.
//!
//! Responses are consumed in order; an unscripted call returns a fixed
//! text reply. Sequences passed to `send` are recorded so tests can
//! assert what the backend actually saw (e.g. compression state).

use std::sync::Mutex;

use async_trait::async_trait;

use super::types::{ChatMessage, ProviderResponse, ToolSpec};
use super::ChatProvider;

pub struct MockProvider {
    script: Mutex<Vec<ProviderResponse>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that replays the given responses in order.
    pub fn scripted(responses: Vec<ProviderResponse>) -> Self {
        let mut script = responses;
        script.reverse(); // pop() from the back
        Self {
            script: Mutex::new(script),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Message sequences received by `send`, one per call.
    pub fn sequences_seen(&self) -> Vec<Vec<ChatMessage>> {
        self.seen.lock().unwrap().clone()
    }

    /// Number of `send` calls so far.
    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    async fn send(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSpec],
    ) -> anyhow::Result<ProviderResponse> {
        self.seen.lock().unwrap().push(messages.to_vec());
        let next = self.script.lock().unwrap().pop();
        Ok(next.unwrap_or_else(|| ProviderResponse::text("mock hello")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unscripted_returns_default() {
        let provider = MockProvider::new();
        let messages = provider.build_messages("sys", "hi");
        let response = provider.send(&messages, &[]).await.unwrap();
        assert_eq!(response.text.as_deref(), Some("mock hello"));
        assert!(response.tool_calls.is_empty());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_replays_in_order() {
        let provider = MockProvider::scripted(vec![
            ProviderResponse::text("first"),
            ProviderResponse::text("second"),
        ]);
        let messages = provider.build_messages("sys", "hi");

        let r1 = provider.send(&messages, &[]).await.unwrap();
        let r2 = provider.send(&messages, &[]).await.unwrap();
        assert_eq!(r1.text.as_deref(), Some("first"));
        assert_eq!(r2.text.as_deref(), Some("second"));
    }
}
