//! Configuration for pulsebot.
//!
//! Loads typed settings from `~/.pulsebot/config.json`. All fields use
//! `serde` with defaults so a partial (or missing) file still yields a
//! runnable configuration. Per-job runtime config lives in `jobs.json`
//! and is hot-reloaded — see the [`jobs`] submodule.

pub mod jobs;
pub mod prompts;

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Root settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub agent: AgentSettings,
    pub tools: ToolsSettings,
    pub jobs: JobsSettings,
}

impl Settings {
    /// Load settings from the default path (`~/.pulsebot/config.json`).
    /// A missing file yields defaults; a malformed file is an error.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Settings::default())
        }
    }

    /// Load settings from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Default config directory.
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pulsebot")
    }

    /// Resolved path of the hot-reloadable job config document.
    pub fn jobs_config_path(&self) -> PathBuf {
        self.jobs
            .config_path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("jobs.json"))
    }

    /// Write the default config template to disk.
    pub fn write_default_template() -> anyhow::Result<PathBuf> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = serde_json::json!({
            "provider": {
                "active": "mock",
                "apiKey": "",
                "model": "gpt-4o-mini"
            },
            "tools": {
                "webSearch": { "apiKey": "" },
                "localFiles": { "allowedPaths": [] }
            },
            "jobs": {
                "webWatch": { "urls": [] }
            }
        });

        std::fs::write(&path, serde_json::to_string_pretty(&template)?)?;
        Ok(path)
    }
}

// ── Provider settings ───────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderSettings {
    /// Registered provider name ("mock", "openai", "openrouter", ...).
    pub active: String,
    pub api_key: String,
    pub api_base: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            active: "mock".into(),
            api_key: String::new(),
            api_base: None,
            model: "gpt-4o-mini".into(),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

// ── Agent settings ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentSettings {
    /// Maximum tool-call rounds per invocation.
    pub max_rounds: u32,
    /// Pause between rounds, bounding request rate to the backend.
    pub round_pause_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            round_pause_secs: 1,
        }
    }
}

// ── Tools settings ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolsSettings {
    pub web_search: WebSearchSettings,
    pub local_files: LocalFilesSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebSearchSettings {
    pub api_key: String,
    pub max_results: u32,
}

impl Default for WebSearchSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            max_results: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocalFilesSettings {
    /// Root directories the local_files tool may read.
    pub allowed_paths: Vec<String>,
}

// ── Jobs settings ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobsSettings {
    /// Override for the jobs.json path (defaults to `~/.pulsebot/jobs.json`).
    pub config_path: Option<PathBuf>,
    pub web_watch: WebWatchSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebWatchSettings {
    /// Pages the web_watch job monitors for changes.
    pub urls: Vec<String>,
}
