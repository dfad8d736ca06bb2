//! Background jobs: contracts and the item pipeline.
//!
//! A job is a long-lived producer of [`JobItem`]s. Two shapes exist:
//! [`PollJob`] fetches a batch on a cron schedule, [`StreamJob`] pushes
//! items continuously from an external source. Both funnel items through
//! the same pipeline: render to text, summarize via the shared provider,
//! format a notification, and hand it to the injected `notify` callback.
//! The scheduler (see [`scheduler`]) owns the per-job task loops.

pub mod scheduler;
pub mod web_watch;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::jobs::JobConfig;
use crate::provider::ChatProvider;

/// Outbound delivery callback, injected by the transport at startup.
/// Arguments are (target, message).
pub type NotifyFn =
    Arc<dyn Fn(String, String) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// One unit of work discovered by a job. Transient — consumed by the
/// summarize/notify pipeline immediately, never stored.
#[derive(Debug, Clone, Default)]
pub struct JobItem {
    /// Short label used in the notification header.
    pub title: String,
    /// Ordered fields rendered into the summarization input.
    pub fields: Vec<(String, String)>,
}

impl JobItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Render the item as `key: value` lines for the summarization prompt.
    pub fn render(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Interval-polling job: fetches a batch of new items when its cron
/// schedule fires.
#[async_trait]
pub trait PollJob: Send + Sync {
    /// Stable name, used as the JobConfig lookup key.
    fn name(&self) -> &str;

    /// Compiled-in cron schedule, used when the config has no override.
    fn default_schedule(&self) -> &str;

    /// Fallback summarization prompt.
    fn default_prompt(&self) -> &str;

    /// Check static configuration at startup. A failure skips the job.
    fn validate(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Fetch items that are new since the last cycle.
    async fn fetch(&self) -> anyhow::Result<Vec<JobItem>>;
}

/// Continuous job: pushes items into a channel as an external source
/// produces them, with no fixed schedule.
///
/// `listen` is restartable — when the returned channel closes (source
/// disconnect, upstream error), the scheduler logs and calls it again.
#[async_trait]
pub trait StreamJob: Send + Sync {
    /// Stable name, used as the JobConfig lookup key.
    fn name(&self) -> &str;

    /// Fallback summarization prompt.
    fn default_prompt(&self) -> &str;

    /// Check static configuration at startup. A failure skips the job.
    fn validate(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Connect to the source and start pushing items. The job must stop
    /// producing and drop the sender once `cancel` fires.
    async fn listen(
        &self,
        cancel: CancellationToken,
    ) -> anyhow::Result<mpsc::Receiver<JobItem>>;
}

/// A registered job of either shape.
pub enum JobKind {
    Poll(Arc<dyn PollJob>),
    Stream(Arc<dyn StreamJob>),
}

impl JobKind {
    pub fn name(&self) -> &str {
        match self {
            JobKind::Poll(j) => j.name(),
            JobKind::Stream(j) => j.name(),
        }
    }

    fn default_prompt(&self) -> &str {
        match self {
            JobKind::Poll(j) => j.default_prompt(),
            JobKind::Stream(j) => j.default_prompt(),
        }
    }
}

/// Summarize one item's rendered text against the job's active prompt.
///
/// Uses a plain two-message exchange with no tools; an empty reply is an
/// upstream protocol error.
pub async fn summarize(
    provider: &Arc<dyn ChatProvider>,
    prompt: &str,
    text: &str,
) -> anyhow::Result<String> {
    let messages = provider.build_messages(prompt, text);
    let response = provider.send(&messages, &[]).await?;
    match response.text {
        Some(t) if !t.is_empty() => Ok(t),
        _ => Err(crate::error::CoreError::EmptyResponse.into()),
    }
}

/// Run one item through the pipeline: summarize, format, notify.
///
/// The config's `prompt` overrides the job's compiled-in default. Errors
/// propagate to the scheduler, which logs them and moves on — one bad
/// item never kills the job task.
pub async fn process_item(
    job: &JobKind,
    config: &JobConfig,
    provider: &Arc<dyn ChatProvider>,
    notify: &NotifyFn,
    target: &str,
    item: JobItem,
) -> anyhow::Result<()> {
    let prompt = config.prompt.as_deref().unwrap_or_else(|| job.default_prompt());

    debug!(job = job.name(), title = %item.title, "Summarizing item");
    let summary = summarize(provider, prompt, &item.render()).await?;

    let message = format!("[{}] {}\n{}", job.name(), item.title, summary);
    info!(job = job.name(), target, length = message.len(), "Sending notification");
    notify(target.to_string(), message).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::provider::mock::MockProvider;
    use crate::provider::types::ProviderResponse;

    pub(crate) fn recording_notify() -> (NotifyFn, Arc<Mutex<Vec<(String, String)>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = sent.clone();
        let notify: NotifyFn = Arc::new(move |target, message| {
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock().unwrap().push((target, message));
                Ok(())
            })
        });
        (notify, sent)
    }

    struct StubPoll;

    #[async_trait]
    impl PollJob for StubPoll {
        fn name(&self) -> &str {
            "stub"
        }
        fn default_schedule(&self) -> &str {
            "0 * * * * *"
        }
        fn default_prompt(&self) -> &str {
            "Summarize this."
        }
        async fn fetch(&self) -> anyhow::Result<Vec<JobItem>> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_item_render_preserves_field_order() {
        let item = JobItem::new("update")
            .field("url", "https://example.com")
            .field("body", "text here");
        assert_eq!(item.render(), "url: https://example.com\nbody: text here");
    }

    #[tokio::test]
    async fn test_summarize_rejects_empty_reply() {
        let provider: Arc<dyn ChatProvider> =
            Arc::new(MockProvider::scripted(vec![ProviderResponse::default()]));
        let result = summarize(&provider, "prompt", "text").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_process_item_notifies_with_summary() {
        let provider: Arc<dyn ChatProvider> =
            Arc::new(MockProvider::scripted(vec![ProviderResponse::text("short summary")]));
        let (notify, sent) = recording_notify();
        let job = JobKind::Poll(Arc::new(StubPoll));
        let config = JobConfig::default();

        let item = JobItem::new("page changed").field("url", "https://example.com");
        process_item(&job, &config, &provider, &notify, "chat-1", item)
            .await
            .unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "chat-1");
        assert!(sent[0].1.starts_with("[stub] page changed\n"));
        assert!(sent[0].1.contains("short summary"));
    }

    #[tokio::test]
    async fn test_prompt_override_reaches_provider() {
        let provider = Arc::new(MockProvider::scripted(vec![ProviderResponse::text("ok")]));
        let dyn_provider: Arc<dyn ChatProvider> = provider.clone();
        let (notify, _) = recording_notify();
        let job = JobKind::Poll(Arc::new(StubPoll));
        let config = JobConfig {
            prompt: Some("Custom prompt.".into()),
            ..Default::default()
        };

        process_item(&job, &config, &dyn_provider, &notify, "t", JobItem::new("x"))
            .await
            .unwrap();

        let seen = provider.sequences_seen();
        assert_eq!(seen[0][0].content.as_deref(), Some("Custom prompt."));
    }
}
