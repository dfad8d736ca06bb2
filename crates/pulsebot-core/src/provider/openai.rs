//! OpenAI-compatible provider.
//!
//! One implementation covers every backend exposing an OpenAI-style
//! `/chat/completions` endpoint:
//!
//! - OpenAI (`https://api.openai.com/v1`)
//! - OpenRouter (`https://openrouter.ai/api/v1`)
//! - DeepSeek (`https://api.deepseek.com/v1`)
//! - Groq (`https://api.groq.com/openai/v1`)
//! - Gemini (`https://generativelanguage.googleapis.com/v1beta/openai`)
//! - GitHub Models (`https://models.inference.ai.azure.com`)
//! - Ollama / any local server (`http://localhost:11434/v1`)

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{ChatMessage, ProviderResponse, ToolCallRequest, ToolSpec, Usage, WireFormat};
use super::ChatProvider;

/// Known provider base URLs.
const PROVIDER_URLS: &[(&str, &str)] = &[
    ("openai", "https://api.openai.com/v1"),
    ("openrouter", "https://openrouter.ai/api/v1"),
    ("deepseek", "https://api.deepseek.com/v1"),
    ("groq", "https://api.groq.com/openai/v1"),
    (
        "gemini",
        "https://generativelanguage.googleapis.com/v1beta/openai",
    ),
    ("github", "https://models.inference.ai.azure.com"),
    ("ollama", "http://localhost:11434/v1"),
];

/// Maximum number of retry attempts for transient errors.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const BASE_DELAY_MS: u64 = 500;

/// OpenAI-compatible provider with automatic retry and exponential
/// backoff for transient HTTP errors (429, 5xx) and network failures.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiProvider {
    /// Create a new provider.
    ///
    /// `api_base` overrides the default URL for `provider_name`; unknown
    /// names without an explicit base fall back to the OpenAI endpoint.
    pub fn new(
        provider_name: &str,
        api_key: &str,
        api_base: Option<&str>,
        model: &str,
        max_tokens: u32,
        temperature: f32,
        client: Client,
    ) -> Self {
        let base_url = api_base
            .map(|s| s.to_string())
            .unwrap_or_else(|| {
                PROVIDER_URLS
                    .iter()
                    .find(|(name, _)| *name == provider_name)
                    .map(|(_, url)| url.to_string())
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            })
            .trim_end_matches('/')
            .to_string();

        debug!(provider = provider_name, base_url = %base_url, model, "Initialized provider");

        Self {
            client,
            api_key: api_key.to_string(),
            base_url,
            model: model.to_string(),
            max_tokens,
            temperature,
        }
    }

    /// Returns `true` if the HTTP status is transient and worth retrying.
    fn is_retryable_status(status: reqwest::StatusCode) -> bool {
        matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
    }
}

// ── Wire request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageResponse>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageResponse,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct MessageResponse {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallResponse>>,
}

#[derive(Deserialize)]
struct ToolCallResponse {
    id: String,
    function: FunctionCallResponse,
}

#[derive(Deserialize)]
struct FunctionCallResponse {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct UsageResponse {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── ChatProvider implementation ─────────────────────────────────────

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn wire_format(&self) -> WireFormat {
        WireFormat::OpenAi
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ProviderResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        let wire_tools: Vec<Value> = tools
            .iter()
            .map(|t| t.to_wire(self.wire_format()))
            .collect();
        let tools_opt = if wire_tools.is_empty() {
            None
        } else {
            Some(wire_tools.as_slice())
        };

        let request_body = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            tools: tools_opt,
            tool_choice: tools_opt.is_some().then_some("auto"),
        };

        debug!(model = %self.model, url = %url, msg_count = messages.len(), "Sending chat completion request");

        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_DELAY_MS * 2u64.pow(attempt - 1);
                warn!(attempt, delay_ms = delay, "Retrying chat completion request");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }

            let result = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match result {
                Ok(r) => r,
                Err(e) => {
                    // Network-level errors are always retryable.
                    warn!(attempt, error = %e, "Network error calling chat API");
                    last_error = Some(e.into());
                    continue;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read chat API response body")?;

            if !status.is_success() {
                let err_msg = serde_json::from_str::<ErrorBody>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or_else(|_| body.clone());

                if Self::is_retryable_status(status) {
                    warn!(attempt, status = %status, "Transient chat API error, will retry");
                    last_error = Some(anyhow::anyhow!("chat API error ({}): {}", status, err_msg));
                    continue;
                }

                anyhow::bail!("chat API error ({}): {}", status, err_msg);
            }

            let completion: CompletionResponse =
                serde_json::from_str(&body).context("Failed to parse chat API response")?;

            let choice = completion
                .choices
                .into_iter()
                .next()
                .context("chat API returned no choices")?;

            let tool_calls = parse_tool_calls(choice.message.tool_calls.unwrap_or_default());

            let usage = completion.usage.map_or(Usage::default(), |u| Usage {
                prompt_tokens: u.prompt_tokens.unwrap_or(0),
                completion_tokens: u.completion_tokens.unwrap_or(0),
                total_tokens: u.total_tokens.unwrap_or(0),
            });

            debug!(
                finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
                tool_calls = tool_calls.len(),
                tokens = usage.total_tokens,
                "Received chat response"
            );

            return Ok(ProviderResponse {
                text: choice.message.content,
                tool_calls,
                usage,
            });
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("chat API request failed after {} retries", MAX_RETRIES)))
    }
}

/// Convert wire tool calls into parsed requests.
///
/// Arguments that fail to parse become an empty set rather than dropping
/// the call: the request still reaches schema validation, which feeds a
/// parameter error back to the model so it can retry with valid JSON.
fn parse_tool_calls(calls: Vec<ToolCallResponse>) -> Vec<ToolCallRequest> {
    calls
        .into_iter()
        .map(|tc| {
            let arguments = match serde_json::from_str::<serde_json::Map<String, Value>>(
                &tc.function.arguments,
            ) {
                Ok(args) => args,
                Err(e) => {
                    warn!(
                        tool = %tc.function.name,
                        error = %e,
                        raw = %tc.function.arguments,
                        "Unparseable tool arguments — passing an empty set"
                    );
                    serde_json::Map::new()
                }
            };
            ToolCallRequest {
                id: tc.id,
                name: tc.function.name,
                arguments,
            }
        })
        .collect()
}
