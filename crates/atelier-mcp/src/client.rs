//! MCP-backed tool channel.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use atelier::{ChannelError, ChannelOpener, ToolChannel, ToolDefinition, WorkspaceRoot};
use rmcp::{
    RoleClient, ServiceExt,
    model::{CallToolRequestParam, CallToolResult, ClientInfo, Tool},
    service::RunningService,
    transport::TokioChildProcess,
};
use serde_json::{Map, Value, json};
use tokio::task::JoinHandle;

use crate::server::WorkspaceServer;

/// Reply text when the server answered without any content.
const EMPTY_REPLY: &str = "Tool executed successfully.";
/// Reply text when the first content item is not text, or empty text.
const NON_TEXT_REPLY: &str = "Tool executed successfully with no output.";

const DUPLEX_BUFFER: usize = 64 * 1024;

/// A [`ToolChannel`] speaking MCP to a [`WorkspaceServer`].
pub struct McpToolChannel {
    service: Option<RunningService<RoleClient, ClientInfo>>,
    server_task: Option<JoinHandle<()>>,
}

impl fmt::Debug for McpToolChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpToolChannel")
            .field("open", &self.service.is_some())
            .field("in_process", &self.server_task.is_some())
            .finish_non_exhaustive()
    }
}

impl McpToolChannel {
    /// Serve `root` on a spawned task and connect to it over an in-memory pipe.
    pub async fn in_process(root: WorkspaceRoot) -> Result<Self, ChannelError> {
        let (client_io, server_io) = tokio::io::duplex(DUPLEX_BUFFER);
        let server = WorkspaceServer::new(root);

        let server_task = tokio::spawn(async move {
            match server.serve(tokio::io::split(server_io)).await {
                Ok(running) => {
                    if let Err(e) = running.waiting().await {
                        tracing::warn!(error = %e, "in-process file server stopped abnormally");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "in-process file server failed to start"),
            }
        });

        let service = ClientInfo::default()
            .serve(tokio::io::split(client_io))
            .await
            .map_err(|e| {
                server_task.abort();
                ChannelError::Open(e.to_string())
            })?;

        Ok(Self {
            service: Some(service),
            server_task: Some(server_task),
        })
    }

    /// Launch `binary <root>` and talk MCP over its stdio.
    pub async fn spawn(binary: impl Into<PathBuf>, root: &WorkspaceRoot) -> Result<Self, ChannelError> {
        let binary = binary.into();
        let mut command = tokio::process::Command::new(&binary);
        command.arg(root.path()).kill_on_drop(true);

        let transport = TokioChildProcess::new(command)
            .map_err(|e| ChannelError::Open(format!("failed to spawn {}: {e}", binary.display())))?;
        let service = ClientInfo::default()
            .serve(transport)
            .await
            .map_err(|e| ChannelError::Open(e.to_string()))?;

        tracing::debug!(binary = %binary.display(), workspace = %root.path().display(), "file server spawned");
        Ok(Self {
            service: Some(service),
            server_task: None,
        })
    }

    fn service(&self) -> Result<&RunningService<RoleClient, ClientInfo>, ChannelError> {
        self.service.as_ref().ok_or(ChannelError::Closed)
    }
}

#[async_trait]
impl ToolChannel for McpToolChannel {
    async fn list_tools(&mut self) -> Result<Vec<ToolDefinition>, ChannelError> {
        let tools = self
            .service()?
            .list_all_tools()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        Ok(tools.into_iter().map(to_definition).collect())
    }

    async fn invoke(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<String, ChannelError> {
        let request: CallToolRequestParam =
            serde_json::from_value(json!({ "name": name, "arguments": arguments }))
                .map_err(|e| ChannelError::Transport(format!("invalid tool request: {e}")))?;

        let result = self
            .service()?
            .call_tool(request)
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        Ok(reply_text(&result))
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        let Some(service) = self.service.take() else {
            return Ok(());
        };
        let cancelled = service.cancel().await;
        if let Some(task) = self.server_task.take() {
            task.abort();
        }
        cancelled
            .map(|reason| tracing::debug!(?reason, "tool channel closed"))
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }
}

fn to_definition(tool: Tool) -> ToolDefinition {
    ToolDefinition::new(
        tool.name,
        tool.description.map(String::from).unwrap_or_default(),
        Value::Object((*tool.input_schema).clone()),
    )
}

fn reply_text(result: &CallToolResult) -> String {
    match result.content.first() {
        None => EMPTY_REPLY.to_string(),
        Some(content) => match content.raw.as_text() {
            Some(text) if !text.text.is_empty() => text.text.clone(),
            _ => NON_TEXT_REPLY.to_string(),
        },
    }
}

/// How an orchestrator reaches the file server for each turn.
#[derive(Debug, Clone)]
pub enum McpChannelOpener {
    /// Serve the workspace on a task inside the current process.
    InProcess,
    /// Spawn the given `atelier-mcp` binary per turn.
    Spawn(PathBuf),
}

#[async_trait]
impl ChannelOpener for McpChannelOpener {
    async fn open(&self, root: &WorkspaceRoot) -> Result<Box<dyn ToolChannel>, ChannelError> {
        let channel = match self {
            Self::InProcess => McpToolChannel::in_process(root.clone()).await?,
            Self::Spawn(binary) => McpToolChannel::spawn(binary.clone(), root).await?,
        };
        Ok(Box::new(channel))
    }
}
