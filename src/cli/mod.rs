//! Command-line interface for lexllm.
//!
//! Provides commands for running a workflow locally, listing the built-in
//! workflows, serving them over HTTP, and inspecting configuration.

use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use uuid::Uuid;

use crate::config;
use crate::domain::{ConversationMessage, RunState, WorkflowRunRequest};
use crate::server;
use crate::workflows::builtin_registry;

/// lexllm - Streaming chat workflows over the Lex knowledge base
#[derive(Parser, Debug)]
#[command(name = "lexllm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a workflow and print its NDJSON records to stdout
    Run {
        /// Workflow id (see `lexllm workflows`)
        workflow_id: String,

        /// The user's message (reads --input or stdin if omitted)
        message: Vec<String>,

        /// Read the message from a file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Read the message from stdin
        #[arg(long)]
        stdin: bool,

        /// JSON file with prior conversation turns
        #[arg(long)]
        history: Option<PathBuf>,

        /// Conversation id (random if not provided)
        #[arg(short, long)]
        conversation_id: Option<String>,
    },

    /// List registered workflows
    Workflows,

    /// Start the HTTP server
    Serve {
        /// Address to bind to (defaults to the configured address)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                workflow_id,
                message,
                input,
                stdin,
                history,
                conversation_id,
            } => run_workflow(&workflow_id, message, input, stdin, history, conversation_id).await,
            Commands::Workflows => list_workflows(),
            Commands::Serve { address } => serve(address).await,
            Commands::Config => show_config(),
        }
    }
}

/// Resolve the user's message from arguments, a file, or stdin
fn read_message(message: Vec<String>, input_file: Option<PathBuf>, use_stdin: bool) -> Result<String> {
    let text = if !message.is_empty() {
        message.join(" ")
    } else if let Some(path) = input_file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else if use_stdin || !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        anyhow::bail!("No message provided. Pass it as an argument, use --input <file>, or pipe to stdin");
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        anyhow::bail!("Message is empty");
    }
    Ok(text)
}

/// Load prior turns from a JSON array of {role, content}
fn load_history(path: &Path) -> Result<Vec<ConversationMessage>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse history file: {}", path.display()))
}

/// Run one workflow turn, writing records to stdout as they arrive
async fn run_workflow(
    workflow_id: &str,
    message: Vec<String>,
    input_file: Option<PathBuf>,
    use_stdin: bool,
    history_file: Option<PathBuf>,
    conversation_id: Option<String>,
) -> Result<()> {
    let user_input = read_message(message, input_file, use_stdin)?;
    let history = match history_file {
        Some(ref path) => load_history(path)?,
        None => Vec::new(),
    };
    let conversation_id = conversation_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    let registry = builtin_registry(config::config()?)?;
    let request = WorkflowRunRequest::new(conversation_id, user_input).with_history(history);
    let mut orchestrator = registry.orchestrator(workflow_id, request)?;

    let stdout = io::stdout();
    {
        let mut records = orchestrator.execute();
        while let Some(record) = records.next().await {
            let mut out = stdout.lock();
            out.write_all(record.as_bytes())
                .and_then(|()| out.flush())
                .context("Failed to write record to stdout")?;
        }
    }

    match orchestrator.state() {
        RunState::Finished => {
            eprintln!("\n[Run {} completed successfully]", orchestrator.run_id());
        }
        RunState::Failed { step, error } => {
            eprintln!("\n[Run {} failed at step '{}': {}]", orchestrator.run_id(), step, error);
            std::process::exit(1);
        }
        other => {
            eprintln!("\n[Run {} in state: {:?}]", orchestrator.run_id(), other);
        }
    }

    Ok(())
}

/// List registered workflows
fn list_workflows() -> Result<()> {
    let registry = builtin_registry(config::config()?)?;

    println!("{:<26} {:<28} {:<8}", "WORKFLOW ID", "NAME", "STEPS");
    println!("{}", "-".repeat(64));

    for metadata in registry.metadata() {
        println!(
            "{:<26} {:<28} {:<8}",
            metadata.workflow_id,
            metadata.name,
            metadata.steps.len()
        );
        println!("    {}", metadata.description);
    }

    println!("\nTotal: {} workflows", registry.len());
    Ok(())
}

/// Start the HTTP server
async fn serve(address: Option<String>) -> Result<()> {
    let cfg = config::config()?;
    let address = address.unwrap_or_else(|| cfg.server_address.clone());
    let registry = builtin_registry(cfg)?;

    server::serve(registry, &address).await
}

/// Print the resolved configuration with secrets masked
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("lexllm configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Lex DB:");
    println!("  Host:     {}", cfg.lex_db_host);
    println!();
    println!("OpenAI:");
    println!("  Base URL: {}", cfg.openai.base_url);
    println!("  API key:  {}", cfg.openai.masked_key());
    println!();
    println!("OpenRouter:");
    println!("  Base URL: {}", cfg.openrouter.base_url);
    println!("  API key:  {}", cfg.openrouter.masked_key());
    println!();
    println!("Server:");
    println!("  Address:  {}", cfg.server_address);

    Ok(())
}
