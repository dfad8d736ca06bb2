//! pulsebot-core: Core library for the pulsebot personal assistant.
//!
//! This crate contains the building blocks for a tool-calling assistant
//! with background jobs:
//!
//! - [`config`] — Typed configuration loading from JSON, plus the
//!   hot-reloadable per-job config store
//! - [`provider`] — Chat provider trait, OpenAI-compatible implementation,
//!   and context compression
//! - [`tools`] — Tool trait, schema-validating registry, and built-in
//!   web-search/local-files tools
//! - [`agent`] — The bounded tool-call loop handling one user turn
//! - [`jobs`] — Job contracts, the summarize/notify pipeline, the
//!   scheduler, and the built-in web watcher
//! - [`registry`] — Capability registry wiring providers, tools, and jobs
//!   together from settings
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use pulsebot_core::agent::{LoopConfig, MentionHandler};
//! use pulsebot_core::config::Settings;
//! use pulsebot_core::registry::CapabilityRegistry;
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = Settings::load()?;
//! let caps = CapabilityRegistry::builtin().build(&settings)?;
//! let handler = MentionHandler::new(caps.provider, caps.tools, LoopConfig::default());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod jobs;
pub mod provider;
pub mod registry;
pub mod tools;

pub use error::CoreError;
