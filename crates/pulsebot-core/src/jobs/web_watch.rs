//! Web page watcher — polls configured URLs and reports content changes.
//!
//! Each cycle fetches every URL, extracts the readable text, and hashes
//! it. A changed hash produces one [`JobItem`] carrying the new text; the
//! first fetch of a URL only records the baseline. Per-URL failures are
//! reported in the cycle's error count but never abort the batch.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::{JobItem, PollJob};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Keep summarization inputs bounded; pages can be huge.
const MAX_PAGE_CHARS: usize = 8_000;

pub struct WebWatchJob {
    client: reqwest::Client,
    urls: Vec<String>,
    /// Content hash per URL from the previous cycle.
    seen: Mutex<HashMap<String, u64>>,
}

impl WebWatchJob {
    pub fn new(urls: Vec<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent("pulsebot/0.1")
            .build()
            .unwrap_or_default();
        Self {
            client,
            urls,
            seen: Mutex::new(HashMap::new()),
        }
    }

    async fn fetch_text(&self, url: &str) -> anyhow::Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let html = response.text().await?;
        Ok(extract_text(&html))
    }
}

/// Pull readable text out of an HTML document, preferring the main
/// content containers over boilerplate.
fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in ["main", "article", "body"] {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&sel).next() {
            let text = element
                .text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            if !text.is_empty() {
                return truncate_chars(&text, MAX_PAGE_CHARS);
            }
        }
    }
    String::new()
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

fn content_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

#[async_trait]
impl PollJob for WebWatchJob {
    fn name(&self) -> &str {
        "web_watch"
    }

    fn default_schedule(&self) -> &str {
        // Every 30 minutes.
        "0 */30 * * * *"
    }

    fn default_prompt(&self) -> &str {
        "You monitor web pages for a user. Summarize what this page now says \
         in 2-3 sentences, focusing on anything that looks new or time-sensitive. \
         Reply in plain text."
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.urls.is_empty() {
            anyhow::bail!(
                "no URLs configured for web_watch (jobs.webWatch.urls in config.json)"
            );
        }
        Ok(())
    }

    async fn fetch(&self) -> anyhow::Result<Vec<JobItem>> {
        let mut items = Vec::new();
        let mut failures = 0usize;

        for url in &self.urls {
            let text = match self.fetch_text(url).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(url, error = %e, "web_watch fetch failed");
                    failures += 1;
                    continue;
                }
            };

            let hash = content_hash(&text);
            let previous = self.seen.lock().unwrap().insert(url.clone(), hash);
            match previous {
                None => {
                    // Baseline cycle for this URL.
                    debug!(url, "web_watch baseline recorded");
                }
                Some(old) if old != hash => {
                    debug!(url, "web_watch content changed");
                    items.push(
                        JobItem::new(format!("Page updated: {}", url))
                            .field("url", url.as_str())
                            .field("content", text),
                    );
                }
                Some(_) => {
                    debug!(url, "web_watch unchanged");
                }
            }
        }

        if failures == self.urls.len() && !self.urls.is_empty() {
            anyhow::bail!("all {} web_watch fetches failed", failures);
        }
        Ok(items)
    }
}
