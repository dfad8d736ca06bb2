//! Typed errors for conditions the core treats specially.
//!
//! Most plumbing failures travel as `anyhow::Error`. The variants here are
//! the ones callers match on: protocol violations from a provider, and the
//! startup conditions that are fatal (ambiguous names, unknown provider)
//! versus skippable (a tool whose schema won't compile).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The provider returned neither text nor tool calls. Fatal to the
    /// current invocation — never silently treated as completion.
    #[error("provider returned neither text nor tool calls")]
    EmptyResponse,

    /// Two capabilities of the same kind declared the same name.
    /// Dispatch would be ambiguous, so this aborts startup.
    #[error("duplicate {kind} name: '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    /// The configured provider name has no registered builder.
    #[error("unknown provider '{0}' — not registered")]
    UnknownProvider(String),

    /// A tool's parameter schema failed to compile. The tool is skipped
    /// at discovery rather than failing at execution time.
    #[error("invalid parameter schema for tool '{name}': {message}")]
    InvalidSchema { name: String, message: String },
}
