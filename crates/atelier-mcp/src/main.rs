//! Atelier file server
//!
//! Serves the file tools of one workspace directory over MCP on stdio.
//! The orchestrator launches one of these per turn:
//!
//! ```text
//! atelier-mcp <WORKSPACE>
//! ```

use std::path::PathBuf;

use anyhow::Context;
use atelier::WorkspaceRoot;
use atelier_mcp::WorkspaceServer;
use clap::Parser;
use rmcp::ServiceExt;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// MCP file server confined to a single workspace directory.
#[derive(Parser, Debug)]
#[command(name = "atelier-mcp", version)]
struct Args {
    /// Workspace directory the tools operate on.
    workspace: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON-RPC stream.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();

    let root = WorkspaceRoot::new(&args.workspace)
        .with_context(|| format!("workspace {} is not usable", args.workspace.display()))?;
    tracing::info!(workspace = %root.path().display(), "File server starting");

    let service = WorkspaceServer::new(root)
        .serve(rmcp::transport::stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("Failed to start MCP service: {}", e);
        })?;

    service.waiting().await?;

    tracing::info!("File server shutting down");

    Ok(())
}
