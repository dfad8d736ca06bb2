//! Job scheduler: one long-lived task per job.
//!
//! Poll jobs cycle `SLEEPING → DUE → FETCHING → PROCESSING`; stream jobs
//! cycle `IDLE → LISTENING → PROCESSING`. Every cycle starts by re-reading
//! the job's config from `jobs.json`, so enable/disable, schedule and
//! prompt edits take effect without a restart. A job whose config is
//! absent, disabled, or missing a notify target idle-polls at a fixed
//! low-frequency interval instead of running its active schedule.
//!
//! Failures fetching, summarizing, or notifying are logged and the job
//! proceeds to its next cycle; only cancellation stops a task.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::jobs::{JobConfig, JobConfigStore};
use crate::jobs::{process_item, JobKind, NotifyFn, PollJob, StreamJob};
use crate::provider::ChatProvider;

/// Recheck interval while a job is disabled or misconfigured.
const IDLE_INTERVAL: Duration = Duration::from_secs(60);

/// Fallback wait when a cron expression fails to parse.
const BAD_SCHEDULE_DELAY: Duration = Duration::from_secs(60);

/// Spawns and supervises the per-job tasks.
pub struct JobScheduler {
    provider: Arc<dyn ChatProvider>,
    notify: NotifyFn,
    store: Arc<JobConfigStore>,
    idle_interval: Duration,
}

impl JobScheduler {
    pub fn new(provider: Arc<dyn ChatProvider>, notify: NotifyFn, store: JobConfigStore) -> Self {
        Self {
            provider,
            notify,
            store: Arc::new(store),
            idle_interval: IDLE_INTERVAL,
        }
    }

    /// Shorten the idle recheck interval (tests).
    #[cfg(test)]
    fn with_idle_interval(mut self, idle: Duration) -> Self {
        self.idle_interval = idle;
        self
    }

    /// Spawn one task per job. Tasks run until `cancel` fires; join the
    /// returned handles on shutdown so no task is killed mid-notification.
    ///
    /// `validate()` is re-checked every cycle rather than once here, so a
    /// job missing configuration starts working as soon as it appears.
    pub fn spawn_all(&self, jobs: Vec<JobKind>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for job in jobs {
            let ctx = JobContext {
                provider: self.provider.clone(),
                notify: self.notify.clone(),
                store: self.store.clone(),
                idle_interval: self.idle_interval,
                cancel: cancel.clone(),
            };
            info!(job = job.name(), "Starting job task");
            handles.push(tokio::spawn(async move {
                match &job {
                    JobKind::Poll(p) => run_poll(&job, p.clone(), ctx).await,
                    JobKind::Stream(s) => run_stream(&job, s.clone(), ctx).await,
                }
            }));
        }
        handles
    }
}

struct JobContext {
    provider: Arc<dyn ChatProvider>,
    notify: NotifyFn,
    store: Arc<JobConfigStore>,
    idle_interval: Duration,
    cancel: CancellationToken,
}

impl JobContext {
    /// Sleep that wakes early on cancellation. Returns false when
    /// cancelled.
    async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Load this job's config; `None` means it should idle-poll.
    fn active_config(&self, name: &str) -> Option<JobConfig> {
        let config = self.store.load(name);
        if !config.enabled {
            return None;
        }
        if config.notify_target.is_none() {
            warn!(job = name, "Job enabled but has no notify target — idling");
            return None;
        }
        Some(config)
    }
}

// ── Poll jobs ───────────────────────────────────────────────────────

async fn run_poll(job: &JobKind, poll: Arc<dyn PollJob>, ctx: JobContext) {
    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }

        let Some(config) = ctx.active_config(job.name()) else {
            debug!(job = job.name(), "Job inactive — idle poll");
            if !ctx.sleep(ctx.idle_interval).await {
                break;
            }
            continue;
        };

        if let Err(e) = poll.validate() {
            warn!(job = job.name(), error = %e, "Job not ready — idling");
            if !ctx.sleep(ctx.idle_interval).await {
                break;
            }
            continue;
        }

        let expr = config.schedule.as_deref().unwrap_or(poll.default_schedule());
        let delay = next_cron_delay(expr).unwrap_or_else(|e| {
            warn!(job = job.name(), schedule = expr, error = %e, "Bad cron expression — falling back");
            BAD_SCHEDULE_DELAY
        });
        debug!(job = job.name(), delay_secs = delay.as_secs(), "Sleeping until next run");
        if !ctx.sleep(delay).await {
            break;
        }

        let items = match poll.fetch().await {
            Ok(items) => items,
            Err(e) => {
                warn!(job = job.name(), error = %e, "Fetch failed");
                continue;
            }
        };
        debug!(job = job.name(), count = items.len(), "Fetched items");

        // Safe: active_config guarantees the target is present.
        let target = config.notify_target.clone().unwrap_or_default();
        for item in items {
            if let Err(e) =
                process_item(job, &config, &ctx.provider, &ctx.notify, &target, item).await
            {
                warn!(job = job.name(), error = %e, "Item processing failed");
            }
        }
    }
    info!(job = job.name(), "Job task stopped");
}

// ── Stream jobs ─────────────────────────────────────────────────────

async fn run_stream(job: &JobKind, stream: Arc<dyn StreamJob>, ctx: JobContext) {
    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }

        if ctx.active_config(job.name()).is_none() {
            debug!(job = job.name(), "Job inactive — idle poll");
            if !ctx.sleep(ctx.idle_interval).await {
                break;
            }
            continue;
        }

        if let Err(e) = stream.validate() {
            warn!(job = job.name(), error = %e, "Job not ready — idling");
            if !ctx.sleep(ctx.idle_interval).await {
                break;
            }
            continue;
        }

        let listen_cancel = ctx.cancel.child_token();
        let mut rx = match stream.listen(listen_cancel.clone()).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(job = job.name(), error = %e, "Listen failed — retrying after idle interval");
                if !ctx.sleep(ctx.idle_interval).await {
                    break;
                }
                continue;
            }
        };
        info!(job = job.name(), "Listening");

        loop {
            let item = tokio::select! {
                _ = ctx.cancel.cancelled() => None,
                item = rx.recv() => item,
            };
            let Some(item) = item else {
                break;
            };

            // Config is re-read per item so disabling mid-stream takes
            // effect without waiting for the source to disconnect.
            let Some(config) = ctx.active_config(job.name()) else {
                info!(job = job.name(), "Job disabled mid-stream — disconnecting");
                listen_cancel.cancel();
                break;
            };

            let target = config.notify_target.clone().unwrap_or_default();
            if let Err(e) =
                process_item(job, &config, &ctx.provider, &ctx.notify, &target, item).await
            {
                warn!(job = job.name(), error = %e, "Item processing failed");
            }
        }

        if ctx.cancel.is_cancelled() {
            break;
        }
        warn!(job = job.name(), "Stream ended — reconnecting after idle interval");
        if !ctx.sleep(ctx.idle_interval).await {
            break;
        }
    }
    info!(job = job.name(), "Job task stopped");
}

// ── Cron ────────────────────────────────────────────────────────────

/// Time until the expression's next fire, from now.
///
/// Accepts both 6/7-field expressions (seconds first) and the common
/// 5-field form, which is normalized by prepending a `0` seconds field.
pub fn next_cron_delay(expr: &str) -> anyhow::Result<Duration> {
    let normalized = if expr.split_whitespace().count() == 5 {
        format!("0 {}", expr)
    } else {
        expr.to_string()
    };

    let schedule = cron::Schedule::from_str(&normalized)
        .map_err(|e| anyhow::anyhow!("invalid cron expression '{}': {}", expr, e))?;
    let next = schedule
        .upcoming(Local)
        .next()
        .ok_or_else(|| anyhow::anyhow!("cron expression '{}' never fires", expr))?;

    let delta = next - Local::now();
    Ok(delta.to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::jobs::tests::recording_notify;
    use crate::jobs::JobItem;
    use crate::provider::mock::MockProvider;
    use crate::provider::types::ProviderResponse;

    struct CountingPoll {
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PollJob for CountingPoll {
        fn name(&self) -> &str {
            "counting"
        }
        fn default_schedule(&self) -> &str {
            "* * * * * *"
        }
        fn default_prompt(&self) -> &str {
            "Summarize."
        }
        async fn fetch(&self) -> anyhow::Result<Vec<JobItem>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![JobItem::new("tick").field("n", "1")])
        }
    }

    struct TwoItemStream;

    #[async_trait]
    impl StreamJob for TwoItemStream {
        fn name(&self) -> &str {
            "twostream"
        }
        fn default_prompt(&self) -> &str {
            "Summarize."
        }
        async fn listen(
            &self,
            _cancel: CancellationToken,
        ) -> anyhow::Result<mpsc::Receiver<JobItem>> {
            let (tx, rx) = mpsc::channel(4);
            tokio::spawn(async move {
                tx.send(JobItem::new("first")).await.ok();
                tx.send(JobItem::new("second")).await.ok();
                // Keep the channel open so the stream doesn't restart.
                tokio::time::sleep(Duration::from_secs(60)).await;
                drop(tx);
            });
            Ok(rx)
        }
    }

    fn jobs_file(tag: &str, content: &str) -> (PathBuf, JobConfigStore) {
        let path = std::env::temp_dir().join(format!(
            "pulsebot_test_sched_{}_{}.json",
            tag,
            std::process::id()
        ));
        fs::write(&path, content).unwrap();
        (path.clone(), JobConfigStore::new(path))
    }

    fn endless_provider() -> Arc<dyn ChatProvider> {
        // Unscripted mock answers every summarize call with fixed text.
        Arc::new(MockProvider::scripted(vec![]))
    }

    #[tokio::test]
    async fn test_disabled_job_never_fetches() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let (path, store) = jobs_file("disabled", r#"{"counting": {"enabled": false}}"#);
        let (notify, _) = recording_notify();

        let scheduler = JobScheduler::new(endless_provider(), notify, store)
            .with_idle_interval(Duration::from_millis(10));
        let cancel = CancellationToken::new();
        let handles = scheduler.spawn_all(
            vec![JobKind::Poll(Arc::new(CountingPoll {
                fetches: fetches.clone(),
            }))],
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 0);
        let _ = fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_enabling_mid_run_takes_effect_without_restart() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let (path, store) = jobs_file("hotreload", r#"{"counting": {"enabled": false}}"#);
        let (notify, sent) = recording_notify();

        let scheduler = JobScheduler::new(endless_provider(), notify, store)
            .with_idle_interval(Duration::from_millis(10));
        let cancel = CancellationToken::new();
        let handles = scheduler.spawn_all(
            vec![JobKind::Poll(Arc::new(CountingPoll {
                fetches: fetches.clone(),
            }))],
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 0);

        // Flip the file on disk; the next idle recheck must pick it up
        // and run on the every-second schedule.
        fs::write(
            &path,
            r#"{"counting": {"enabled": true, "notify_target": "chat-9", "schedule": "* * * * * *"}}"#,
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        cancel.cancel();
        for h in handles {
            h.await.unwrap();
        }

        assert!(fetches.load(Ordering::SeqCst) >= 1, "job must start after reload");
        let sent = sent.lock().unwrap();
        assert!(!sent.is_empty());
        assert_eq!(sent[0].0, "chat-9");
        let _ = fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_missing_notify_target_keeps_job_idle() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let (path, store) = jobs_file("notarget", r#"{"counting": {"enabled": true}}"#);
        let (notify, _) = recording_notify();

        let scheduler = JobScheduler::new(endless_provider(), notify, store)
            .with_idle_interval(Duration::from_millis(10));
        let cancel = CancellationToken::new();
        let handles = scheduler.spawn_all(
            vec![JobKind::Poll(Arc::new(CountingPoll {
                fetches: fetches.clone(),
            }))],
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 0);
        let _ = fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_stream_items_are_notified_in_order() {
        let (path, store) = jobs_file(
            "stream",
            r#"{"twostream": {"enabled": true, "notify_target": "chat-s"}}"#,
        );
        let (notify, sent) = recording_notify();

        let provider: Arc<dyn ChatProvider> = Arc::new(MockProvider::scripted(vec![
            ProviderResponse::text("summary one"),
            ProviderResponse::text("summary two"),
        ]));
        let scheduler = JobScheduler::new(provider, notify, store)
            .with_idle_interval(Duration::from_millis(10));
        let cancel = CancellationToken::new();
        let handles =
            scheduler.spawn_all(vec![JobKind::Stream(Arc::new(TwoItemStream))], cancel.clone());

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        for h in handles {
            h.await.unwrap();
        }

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].1.contains("first"));
        assert!(sent[0].1.contains("summary one"));
        assert!(sent[1].1.contains("second"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_cron_delay_six_field() {
        // Every second: the next fire is at most one second away.
        let delay = next_cron_delay("* * * * * *").unwrap();
        assert!(delay <= Duration::from_secs(1));
    }

    #[test]
    fn test_cron_delay_normalizes_five_field() {
        // Every minute in 5-field form: fires within the next 60s.
        let delay = next_cron_delay("* * * * *").unwrap();
        assert!(delay <= Duration::from_secs(60));
    }

    #[test]
    fn test_cron_delay_rejects_garbage() {
        assert!(next_cron_delay("not a cron expr").is_err());
    }
}
