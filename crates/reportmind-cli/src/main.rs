//! ReportMind CLI — entry point.
//!
//! # Commands
//!
//! - `reportmind agent [-m MESSAGE] [-c CONVERSATION] [--attach FILE]` — chat (single-shot or REPL)
//! - `reportmind onboard` — write default config and data directories
//! - `reportmind status` — show configuration, provider and tool script status

mod helpers;
mod onboard;
mod repl;
mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use reportmind_agent::Orchestrator;
use reportmind_core::bus::queue::MessageBus;
use reportmind_core::config::{load_config, Config};
use reportmind_core::utils::expand_home;
use reportmind_providers::create_provider;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// 📊 ReportMind — insurance report assistant
#[derive(Parser)]
#[command(name = "reportmind", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant (single-shot or interactive REPL)
    Agent {
        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation identifier
        #[arg(short, long, default_value = "cli:default")]
        conversation: String,

        /// Excel workbook to ingest with the message (local path or URL)
        #[arg(long)]
        attach: Option<String>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Initialize configuration and data directories
    Onboard,

    /// Show configuration and provider status
    Status,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Agent {
            message,
            conversation,
            attach,
            logs,
        } => {
            init_logging(logs);
            run_agent(message, conversation, attach).await
        }
        Commands::Onboard => onboard::run(),
        Commands::Status => status::run(),
    }
}

// ─────────────────────────────────────────────
// Agent command
// ─────────────────────────────────────────────

async fn run_agent(
    message: Option<String>,
    conversation: String,
    attach: Option<String>,
) -> Result<()> {
    let config = load_config(None);
    let bus = Arc::new(MessageBus::new(100));
    let orchestrator = build_orchestrator(&config, bus.clone())?;
    let raw_dir = expand_home(&config.attachments.raw_dir);

    match message {
        Some(text) => {
            info!(conversation = %conversation, "processing single message");
            let attachment = attach
                .map(|arg| helpers::prepare_attachment(&arg, &raw_dir))
                .transpose()?;
            let inbound = helpers::inbound(&conversation, &text, attachment);
            orchestrator.handle_turn(&inbound).await;
            for outbound in bus.drain_outbound().await {
                helpers::print_outbound(&outbound)?;
            }
        }
        None => repl::run(&orchestrator, &bus, &conversation, &raw_dir).await?,
    }

    Ok(())
}

/// Build the orchestrator from the loaded configuration.
pub fn build_orchestrator(config: &Config, bus: Arc<MessageBus>) -> Result<Orchestrator> {
    let provider = create_provider(&config.provider, &config.agent.model)
        .context("failed to create model provider")?;
    Orchestrator::from_config(config, bus, Arc::new(provider))
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("reportmind=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
