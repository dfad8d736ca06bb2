//! pulsebot CLI — interactive assistant with background jobs.
//!
//! Usage:
//!   pulsebot run          — Start the assistant (REPL + job scheduler)
//!   pulsebot onboard      — Create a default configuration
//!   pulsebot status       — Show current configuration and health
//!   pulsebot jobs list    — Show job config and enabled state

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use pulsebot_core::agent::{HistoryEntry, LoopConfig, MentionHandler};
use pulsebot_core::config::jobs::JobConfigStore;
use pulsebot_core::config::Settings;
use pulsebot_core::jobs::scheduler::JobScheduler;
use pulsebot_core::jobs::NotifyFn;
use pulsebot_core::registry::CapabilityRegistry;

/// Number of recent exchanges kept as context for the next turn.
const HISTORY_WINDOW: usize = 10;

#[derive(Parser)]
#[command(
    name = "pulsebot",
    version,
    about = "A personal AI assistant with background jobs",
    long_about = "pulsebot — a personal assistant with a tool-calling core.\n\nChat interactively while background jobs watch your sources and notify you."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the assistant: interactive chat plus the job scheduler
    Run,

    /// Create or reset the default configuration
    Onboard,

    /// Show configuration status and health
    Status,

    /// Inspect background jobs
    Jobs {
        #[command(subcommand)]
        action: JobsCommands,
    },
}

#[derive(Subcommand)]
enum JobsCommands {
    /// List jobs from jobs.json with their enabled state
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run) | None => cmd_run().await?,
        Some(Commands::Onboard) => cmd_onboard()?,
        Some(Commands::Status) => cmd_status()?,
        Some(Commands::Jobs { action }) => cmd_jobs(action)?,
    }

    Ok(())
}

// ── Run Command ─────────────────────────────────────────────────────

async fn cmd_run() -> Result<()> {
    let settings = Settings::load()?;
    let caps = CapabilityRegistry::builtin().build(&settings)?;

    let handler = Arc::new(MentionHandler::new(
        caps.provider.clone(),
        caps.tools.clone(),
        LoopConfig {
            max_rounds: settings.agent.max_rounds,
            round_pause: Duration::from_secs(settings.agent.round_pause_secs),
        },
    ));

    // Job notifications land on the terminal, tagged with their target.
    let notify: NotifyFn = Arc::new(|target, message| {
        Box::pin(async move {
            println!("\n  \x1b[33m[notify:{}]\x1b[0m {}\n", target, message);
            Ok(())
        })
    });

    let cancel = CancellationToken::new();
    let store = JobConfigStore::new(settings.jobs_config_path());
    let scheduler = JobScheduler::new(caps.provider.clone(), notify, store);
    let job_tasks = scheduler.spawn_all(caps.jobs, cancel.clone());

    println!();
    println!("  pulsebot v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Provider: {} | Model: {} | Tools: {}",
        settings.provider.active,
        settings.provider.model,
        caps.tools.names().join(", ")
    );
    println!("  Jobs: {} task(s) running", job_tasks.len());
    println!();
    println!("  Type your message, or /quit to exit.");
    println!("  ─────────────────────────────────────");
    println!();

    let mut history: VecDeque<HistoryEntry> = VecDeque::new();
    let stdin = io::stdin();
    loop {
        print!("  \x1b[36m>\x1b[0m ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            // EOF
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" | "/q" => break,
            "/status" => {
                cmd_status()?;
                continue;
            }
            _ => {}
        }

        let context: Vec<HistoryEntry> = history.iter().cloned().collect();
        let reply = handler.handle(input, &context).await;
        println!("\n  \x1b[32m{}\x1b[0m\n", reply);

        history.push_back(HistoryEntry {
            author: "user".into(),
            content: input.to_string(),
        });
        history.push_back(HistoryEntry {
            author: "pulsebot".into(),
            content: reply,
        });
        while history.len() > HISTORY_WINDOW * 2 {
            history.pop_front();
        }
    }

    println!("  Shutting down...");
    cancel.cancel();
    // Let every job observe the token at its next sleep/poll point
    // instead of being killed mid-notification.
    futures::future::join_all(job_tasks).await;
    println!("  Goodbye!");
    Ok(())
}

// ── Onboard Command ─────────────────────────────────────────────────

fn cmd_onboard() -> Result<()> {
    let path = Settings::write_default_template()?;

    // Seed a jobs.json next to it, everything disabled.
    let jobs_path = Settings::default_path().with_file_name("jobs.json");
    if !jobs_path.exists() {
        let template = serde_json::json!({
            "web_watch": {
                "enabled": false,
                "schedule": "0 */30 * * * *",
                "notify_target": "terminal",
                "prompt": null
            }
        });
        std::fs::write(&jobs_path, serde_json::to_string_pretty(&template)?)?;
    }

    println!();
    println!("  Configuration created at:");
    println!("     {}", path.display());
    println!("     {}", jobs_path.display());
    println!();
    println!("  Next steps:");
    println!("  1. Edit config.json and add your provider API key");
    println!("  2. Enable jobs in jobs.json (editable while running)");
    println!("  3. Run `pulsebot run` to start");
    println!();
    Ok(())
}

// ── Status Command ──────────────────────────────────────────────────

fn cmd_status() -> Result<()> {
    let config_path = Settings::default_path();

    println!();
    println!("  pulsebot status");
    println!("  ─────────────────────────────────────");

    if config_path.exists() {
        println!("  Config:    {}", config_path.display());
    } else {
        println!("  Config:    not found (run `pulsebot onboard`)");
        return Ok(());
    }

    let settings = Settings::load()?;
    println!("  Provider:  {}", settings.provider.active);
    println!("  Model:     {}", settings.provider.model);
    println!(
        "  Web search: {}",
        if settings.tools.web_search.api_key.is_empty() {
            "no API key"
        } else {
            "configured"
        }
    );
    println!(
        "  Local files: {} allowed path(s)",
        settings.tools.local_files.allowed_paths.len()
    );

    let jobs_path = settings.jobs_config_path();
    if jobs_path.exists() {
        let store = JobConfigStore::new(&jobs_path);
        let enabled = store
            .document()
            .map(|doc| doc.values().filter(|c| c.enabled).count())
            .unwrap_or(0);
        println!("  Jobs:      {} ({} enabled)", jobs_path.display(), enabled);
    } else {
        println!("  Jobs:      no jobs.json (all jobs idle)");
    }

    println!();
    Ok(())
}

// ── Jobs Commands ───────────────────────────────────────────────────

fn cmd_jobs(action: JobsCommands) -> Result<()> {
    let settings = Settings::load()?;
    let store = JobConfigStore::new(settings.jobs_config_path());

    match action {
        JobsCommands::List => {
            let doc = match store.document() {
                Ok(doc) => doc,
                Err(e) => {
                    println!("  Cannot read {}: {}", store.path().display(), e);
                    println!("  All jobs are idle until the file is fixed.");
                    return Ok(());
                }
            };

            if doc.is_empty() {
                println!("  No jobs configured.");
                return Ok(());
            }

            let mut names: Vec<&String> = doc.keys().collect();
            names.sort();
            println!();
            for name in names {
                let config = &doc[name];
                let status = if config.enabled { "on " } else { "off" };
                println!("  [{}] {}", status, name);
                if let Some(ref schedule) = config.schedule {
                    println!("       schedule: {}", schedule);
                }
                match config.notify_target {
                    Some(ref target) => println!("       notify:   {}", target),
                    None => println!("       notify:   (missing — job will idle)"),
                }
                if let Some(ref prompt) = config.prompt {
                    println!("       prompt:   {}", prompt);
                }
                println!();
            }
        }
    }

    Ok(())
}
