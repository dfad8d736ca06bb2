//! Tool system: trait, schema-validating registry, and built-in tools.
//!
//! Every tool implements the `Tool` trait and is registered in the
//! `ToolRegistry` at startup. The registry compiles each tool's JSON
//! Schema once at registration; the tool-call loop validates argument
//! payloads against it before dispatching execution.

pub mod local_files;
pub mod web_search;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::CoreError;
use crate::provider::types::ToolSpec;

/// Trait that all agent tools must implement.
///
/// Tools are capabilities the model can invoke. Each declares its name,
/// description, JSON Schema parameters, and an async `execute` method
/// that always returns text — upstream failures come back as error
/// strings, never as panics or fatal errors.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name used in function calls (e.g. "web_search").
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments.
    fn parameters(&self) -> Value;

    /// One-line routing hint injected into the system prompt.
    fn usage_hint(&self) -> Option<&str> {
        None
    }

    /// Check static configuration (API keys, paths) at discovery time.
    /// A failure here skips the tool; it never fails execution.
    fn validate(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Execute the tool with schema-validated arguments.
    async fn execute(&self, args: Map<String, Value>) -> String;
}

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    schema: jsonschema::Validator,
}

/// Registry of discovered tools, keyed by name.
///
/// Names are unique across the process — registering a second tool under
/// an existing name is a fatal startup error (ambiguous dispatch).
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, compiling its parameter schema.
    ///
    /// Errors: [`CoreError::DuplicateName`] (fatal to startup) or
    /// [`CoreError::InvalidSchema`] (caller logs and skips the tool).
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), CoreError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(CoreError::DuplicateName {
                kind: "tool",
                name,
            });
        }

        let schema = jsonschema::validator_for(&tool.parameters()).map_err(|e| {
            CoreError::InvalidSchema {
                name: name.clone(),
                message: e.to_string(),
            }
        })?;

        debug!(tool = %name, "Registered tool");
        self.tools.insert(name, RegisteredTool { tool, schema });
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name).map(|r| &r.tool)
    }

    /// Check if a tool is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Validate an argument payload against the tool's compiled schema.
    ///
    /// `Err` carries a human-readable description suitable for feeding
    /// back to the model. Unknown tool names are the caller's problem.
    pub fn check_args(&self, name: &str, args: &Value) -> Result<(), String> {
        match self.tools.get(name) {
            Some(r) => r.schema.validate(args).map_err(|e| e.to_string()),
            None => Err(format!("unknown tool '{}'", name)),
        }
    }

    /// Tool definitions for the provider.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|r| ToolSpec {
                name: r.tool.name().into(),
                description: r.tool.description().into(),
                parameters: r.tool.parameters(),
                usage_hint: r.tool.usage_hint().map(Into::into),
            })
            .collect();
        // Stable order for reproducible requests and tests.
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Per-tool routing hints for the system prompt, one `- name: hint`
    /// line per tool that declares one.
    pub fn tool_hints(&self) -> String {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();

        let mut hints = String::new();
        for name in names {
            if let Some(hint) = self.tools[name].tool.usage_hint() {
                hints.push_str(&format!("- {}: {}\n", name, hint));
            }
        }
        hints
    }

    /// Registered tool names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
