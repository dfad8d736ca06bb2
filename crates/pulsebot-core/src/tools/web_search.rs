//! Web search via the Brave Search API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error};

use super::Tool;

const SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";

pub struct WebSearchTool {
    client: Client,
    api_key: String,
    max_results: u32,
}

impl WebSearchTool {
    pub fn new(api_key: &str, max_results: u32, client: Client) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            max_results,
        }
    }
}

#[derive(Deserialize)]
struct BraveSearchResponse {
    web: Option<BraveWebResults>,
}

#[derive(Deserialize)]
struct BraveWebResults {
    results: Vec<BraveWebResult>,
}

#[derive(Deserialize)]
struct BraveWebResult {
    title: String,
    url: String,
    description: Option<String>,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Use this when the user asks \
         about recent events, real-time data, or anything you are unsure about."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "count": {
                    "type": "integer",
                    "description": "Number of results (default: 5, max: 20)"
                }
            },
            "required": ["query"]
        })
    }

    fn usage_hint(&self) -> Option<&str> {
        Some("Current events, real-time data, or facts you're unsure about.")
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            anyhow::bail!(
                "web search API key is required for the web_search tool \
                 (tools.webSearch.apiKey in config.json)"
            );
        }
        Ok(())
    }

    async fn execute(&self, args: Map<String, Value>) -> String {
        let Some(query) = args.get("query").and_then(|v| v.as_str()) else {
            return "Error: 'query' parameter is required".into();
        };

        let count = args
            .get("count")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.max_results as u64)
            .min(20);

        debug!(query, count, "Performing web search");

        let response = self
            .client
            .get(SEARCH_URL)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query), ("count", &count.to_string())])
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<BraveSearchResponse>().await {
                    Ok(data) => {
                        let results = data.web.map(|w| w.results).unwrap_or_default();
                        if results.is_empty() {
                            return "No results found.".into();
                        }

                        results
                            .iter()
                            .map(|r| {
                                let desc = r.description.as_deref().unwrap_or("No description");
                                format!("- {}: {}\n  {}", r.title, desc, r.url)
                            })
                            .collect::<Vec<_>>()
                            .join("\n")
                    }
                    Err(e) => format!("Error parsing search results: {}", e),
                }
            }
            Ok(resp) => {
                error!(status = %resp.status(), "Search API error");
                format!("Search failed ({})", resp.status())
            }
            Err(e) => {
                error!(error = %e, "Search request failed");
                "Search request failed".into()
            }
        }
    }
}
