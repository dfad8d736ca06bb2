//! Hot-reloadable per-job configuration.
//!
//! `jobs.json` maps job names to their runtime config:
//!
//! ```json
//! {
//!   "web_watch": {
//!     "enabled": true,
//!     "schedule": "0 */30 * * * *",
//!     "notify_target": "chat-123",
//!     "prompt": "Summarize what changed."
//!   }
//! }
//! ```
//!
//! Every call to [`JobConfigStore::load`] re-reads the file from disk, so
//! edits take effect on the job's next tick without restarting the
//! process. A missing or unparseable document disables all jobs (they
//! keep idle-polling) until it is fixed — it never crashes the process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

/// Runtime configuration for one job.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub enabled: bool,
    /// Cron expression override; the job's compiled-in default applies
    /// when absent.
    pub schedule: Option<String>,
    /// Destination id for notifications. Required for an enabled job to
    /// actually run.
    pub notify_target: Option<String>,
    /// Summarization prompt override.
    pub prompt: Option<String>,
}

/// Reader for the hot-reloadable job config document.
///
/// The store never caches: each `load` hits the filesystem, which is the
/// whole point — the sole writer is an external edit, and jobs observe it
/// within one cycle.
pub struct JobConfigStore {
    path: PathBuf,
}

impl JobConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load config for a single job by name.
    ///
    /// Returns a disabled default if the file is missing, unparseable, or
    /// has no entry for this job.
    pub fn load(&self, name: &str) -> JobConfig {
        match self.document() {
            Ok(mut doc) => doc.remove(name).unwrap_or_default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "jobs.json unreadable — all jobs disabled");
                JobConfig::default()
            }
        }
    }

    /// Read and parse the whole document.
    pub fn document(&self) -> anyhow::Result<HashMap<String, JobConfig>> {
        let content = std::fs::read_to_string(&self.path)?;
        let doc = serde_json::from_str(&content)?;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store_with(content: &str, tag: &str) -> (PathBuf, JobConfigStore) {
        let path = std::env::temp_dir().join(format!(
            "pulsebot_test_jobs_{}_{}.json",
            tag,
            std::process::id()
        ));
        fs::write(&path, content).unwrap();
        (path.clone(), JobConfigStore::new(path))
    }

    #[test]
    fn test_load_existing_entry() {
        let (path, store) = store_with(
            r#"{"web_watch": {"enabled": true, "notify_target": "chat-1", "schedule": "*/5 * * * * *"}}"#,
            "existing",
        );

        let cfg = store.load("web_watch");
        assert!(cfg.enabled);
        assert_eq!(cfg.notify_target.as_deref(), Some("chat-1"));
        assert_eq!(cfg.schedule.as_deref(), Some("*/5 * * * * *"));
        assert!(cfg.prompt.is_none());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_missing_entry_is_disabled() {
        let (path, store) = store_with(r#"{"other": {"enabled": true}}"#, "missing");
        assert!(!store.load("web_watch").enabled);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_missing_file_disables_all() {
        let store = JobConfigStore::new("/definitely/not/here/jobs.json");
        assert!(!store.load("web_watch").enabled);
    }

    #[test]
    fn test_malformed_document_disables_all() {
        let (path, store) = store_with("{not json", "malformed");
        assert!(!store.load("web_watch").enabled);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_reload_sees_edit() {
        let (path, store) = store_with(r#"{"web_watch": {"enabled": false}}"#, "reload");
        assert!(!store.load("web_watch").enabled);

        fs::write(&path, r#"{"web_watch": {"enabled": true}}"#).unwrap();
        assert!(store.load("web_watch").enabled, "edit must be visible on next load");

        let _ = fs::remove_file(path);
    }
}
