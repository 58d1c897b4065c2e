//! Atelier CLI
//!
//! Usage:
//!   atelier upload project.zip              Create a session from an archive
//!   atelier files <SESSION>                 List the session's files
//!   atelier prompt <SESSION> "<PROMPT>"     Run one agent turn
//!   atelier download <SESSION> [-o FILE]    Zip the session's workspace
//!   atelier remove <SESSION>                Delete a session
//!   atelier prune --older-than-hours <N>    Delete stale sessions

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use atelier::{
    AnthropicConfig, AnthropicProvider, FileTree, SessionStore, Settings, TurnOrchestrator,
};
use atelier_mcp::McpChannelOpener;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Atelier - let a model edit an uploaded project through file tools
#[derive(Parser, Debug)]
#[command(name = "atelier", version)]
struct Args {
    /// Directory holding one workspace per session
    #[arg(long, global = true, env = "ATELIER_WORKSPACES_DIR", default_value = "workspaces")]
    workspaces_dir: PathBuf,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Create a session from a zip archive
    Upload {
        /// Path to the project archive
        archive: PathBuf,
    },
    /// List the files of a session
    Files {
        /// Session identifier
        session: String,
    },
    /// Run one agent turn against a session
    Prompt {
        /// Session identifier
        session: String,
        /// Instruction for the model
        prompt: String,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
        /// Model identifier
        #[arg(long, default_value = atelier::config::DEFAULT_MODEL)]
        model: String,
        /// Upper bound on completion tokens
        #[arg(long, default_value_t = atelier::config::DEFAULT_MAX_TOKENS)]
        max_tokens: u32,
        /// Spawn this `atelier-mcp` binary per turn instead of serving the
        /// tools in-process
        #[arg(long)]
        tool_server: Option<PathBuf>,
    },
    /// Write a zip of the session's current workspace
    Download {
        /// Session identifier
        session: String,
        /// Output file (defaults to project_<SESSION>.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a session
    Remove {
        /// Session identifier
        session: String,
    },
    /// Delete sessions not modified for the given number of hours
    Prune {
        /// Minimum age in hours
        #[arg(long)]
        older_than_hours: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    let args = Args::parse();
    let store = SessionStore::new(&args.workspaces_dir);

    match args.command {
        Cmd::Upload { archive } => {
            let bytes = std::fs::read(&archive)
                .with_context(|| format!("failed to read {}", archive.display()))?;
            let (session, tree) = store.create_from_archive(&bytes)?;
            println!("{}", session.id());
            print_tree(&tree);
        }
        Cmd::Files { session } => {
            print_tree(&store.file_tree(&session)?);
        }
        Cmd::Prompt {
            session,
            prompt,
            json,
            model,
            max_tokens,
            tool_server,
        } => {
            // Credentials are checked before any session work.
            let provider = AnthropicProvider::new(AnthropicConfig::from_env()?)?;
            let opener = match tool_server {
                Some(binary) => McpChannelOpener::Spawn(binary),
                None => McpChannelOpener::InProcess,
            };
            let settings = Settings {
                workspaces_dir: args.workspaces_dir,
                model,
                max_tokens,
            };

            let orchestrator = TurnOrchestrator::new(provider, opener, &settings);
            let result = orchestrator.prompt(&store, &session, &prompt).await?;

            if json {
                let body = serde_json::json!({
                    "status": "success",
                    "message": result.message,
                    "file_tree": result.file_tree,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("{}", result.message);
            }
        }
        Cmd::Download { session, output } => {
            let id = store.open(&session)?.id();
            let bytes = store.archive(&session)?;
            let output = output.unwrap_or_else(|| PathBuf::from(id.download_file_name()));
            std::fs::write(&output, &bytes)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("{}", output.display());
        }
        Cmd::Remove { session } => {
            store.remove(&session)?;
        }
        Cmd::Prune { older_than_hours } => {
            let max_age = Duration::from_secs(older_than_hours.saturating_mul(3600));
            for id in store.prune(max_age)? {
                println!("{id}");
            }
        }
    }

    Ok(())
}

fn print_tree(tree: &FileTree) {
    for path in tree.paths() {
        println!("{path}");
    }
}
