//! Capability registry — assembles the process from registered builders.
//!
//! Each capability kind (provider, tool, job) has a builder map keyed by
//! name. `builtin()` registers everything shipped in this crate; `build`
//! instantiates exactly one provider (selected by `provider.active`) plus
//! every tool and job whose `validate()` passes. One broken tool or job
//! is logged and skipped; a duplicate name or an unknown provider is a
//! fatal startup error.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Settings;
use crate::error::CoreError;
use crate::jobs::web_watch::WebWatchJob;
use crate::jobs::JobKind;
use crate::provider::mock::MockProvider;
use crate::provider::openai::OpenAiProvider;
use crate::provider::ChatProvider;
use crate::tools::local_files::LocalFilesTool;
use crate::tools::web_search::WebSearchTool;
use crate::tools::{Tool, ToolRegistry};

type ProviderBuilder = Box<dyn Fn(&Settings) -> Arc<dyn ChatProvider> + Send + Sync>;
type ToolBuilder = Box<dyn Fn(&Settings) -> Arc<dyn Tool> + Send + Sync>;
type JobBuilder = Box<dyn Fn(&Settings) -> JobKind + Send + Sync>;

/// Everything the orchestrator needs, built from one registry pass.
pub struct Capabilities {
    pub provider: Arc<dyn ChatProvider>,
    pub tools: Arc<ToolRegistry>,
    pub jobs: Vec<JobKind>,
}

#[derive(Default)]
pub struct CapabilityRegistry {
    providers: HashMap<String, ProviderBuilder>,
    tools: HashMap<String, ToolBuilder>,
    jobs: HashMap<String, JobBuilder>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with all built-in capabilities.
    ///
    /// # Panics
    /// Panics if two built-ins declare the same name, which cannot happen
    /// for the shipped set.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .install_builtins()
            .expect("built-in capability names are unique");
        registry
    }

    fn install_builtins(&mut self) -> Result<(), CoreError> {
        self.register_provider("mock", |_| Arc::new(MockProvider::new()))?;
        for name in [
            "openai",
            "openrouter",
            "deepseek",
            "groq",
            "gemini",
            "ollama",
            "github",
        ] {
            self.register_provider(name, move |s| {
                Arc::new(OpenAiProvider::new(
                    name,
                    &s.provider.api_key,
                    s.provider.api_base.as_deref(),
                    &s.provider.model,
                    s.provider.max_tokens,
                    s.provider.temperature,
                    reqwest::Client::new(),
                ))
            })?;
        }

        self.register_tool("web_search", |s| {
            Arc::new(WebSearchTool::new(
                &s.tools.web_search.api_key,
                s.tools.web_search.max_results,
                reqwest::Client::new(),
            ))
        })?;
        self.register_tool("local_files", |s| {
            Arc::new(LocalFilesTool::new(&s.tools.local_files.allowed_paths))
        })?;

        self.register_job("web_watch", |s| {
            JobKind::Poll(Arc::new(WebWatchJob::new(s.jobs.web_watch.urls.clone())))
        })?;
        Ok(())
    }

    pub fn register_provider(
        &mut self,
        name: &str,
        builder: impl Fn(&Settings) -> Arc<dyn ChatProvider> + Send + Sync + 'static,
    ) -> Result<(), CoreError> {
        if self.providers.contains_key(name) {
            return Err(CoreError::DuplicateName {
                kind: "provider",
                name: name.into(),
            });
        }
        self.providers.insert(name.into(), Box::new(builder));
        Ok(())
    }

    pub fn register_tool(
        &mut self,
        name: &str,
        builder: impl Fn(&Settings) -> Arc<dyn Tool> + Send + Sync + 'static,
    ) -> Result<(), CoreError> {
        if self.tools.contains_key(name) {
            return Err(CoreError::DuplicateName {
                kind: "tool",
                name: name.into(),
            });
        }
        self.tools.insert(name.into(), Box::new(builder));
        Ok(())
    }

    pub fn register_job(
        &mut self,
        name: &str,
        builder: impl Fn(&Settings) -> JobKind + Send + Sync + 'static,
    ) -> Result<(), CoreError> {
        if self.jobs.contains_key(name) {
            return Err(CoreError::DuplicateName {
                kind: "job",
                name: name.into(),
            });
        }
        self.jobs.insert(name.into(), Box::new(builder));
        Ok(())
    }

    /// Registered provider names.
    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate the active provider, all valid tools, and all jobs.
    ///
    /// Tools failing `validate()` or schema compilation are skipped with a
    /// warning. Jobs are returned unconditionally here — the scheduler
    /// re-checks each job's `validate()` and JobConfig every cycle.
    pub fn build(&self, settings: &Settings) -> anyhow::Result<Capabilities> {
        let active = settings.provider.active.as_str();
        let builder = self
            .providers
            .get(active)
            .ok_or_else(|| CoreError::UnknownProvider(active.to_string()))?;
        let provider = builder(settings);
        info!(provider = active, "Provider selected");

        let mut tools = ToolRegistry::new();
        let mut tool_names: Vec<&String> = self.tools.keys().collect();
        tool_names.sort();
        for name in tool_names {
            let tool = self.tools[name](settings);
            if let Err(e) = tool.validate() {
                warn!(tool = %name, error = %e, "Tool validation failed — skipping");
                continue;
            }
            match tools.register(tool) {
                Ok(()) => info!(tool = %name, "Tool enabled"),
                // Duplicates were already rejected at registration time,
                // so only a bad schema lands here.
                Err(e @ CoreError::InvalidSchema { .. }) => {
                    warn!(tool = %name, error = %e, "Tool schema invalid — skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut job_names: Vec<&String> = self.jobs.keys().collect();
        job_names.sort();
        let jobs = job_names
            .into_iter()
            .map(|name| self.jobs[name](settings))
            .collect();

        Ok(Capabilities {
            provider,
            tools: Arc::new(tools),
            jobs,
        })
    }
}
