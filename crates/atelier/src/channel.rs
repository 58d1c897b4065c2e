//! Request/response channel between the turn orchestrator and the tools.
//!
//! A [`ToolChannel`] is a narrow waist: it lists the available tools and
//! invokes one by name with a JSON argument object, returning the tool's
//! textual result unchanged. It never interprets model output.
//!
//! Channels are opened per turn by a [`ChannelOpener`] and are bound at
//! construction to exactly one [`WorkspaceRoot`]. This crate ships the
//! in-process [`LocalToolChannel`]; the `atelier-mcp` crate provides an MCP
//! implementation that reaches the tools in a separate server.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::guard::WorkspaceRoot;
use crate::tools::{ToolDefinition, WorkspaceTools};

/// Transport-level failures of a tool channel.
///
/// Tool failures (missing file, rejected path) are *not* channel errors;
/// they come back as ordinary result text.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel could not be established.
    #[error("failed to open tool channel: {0}")]
    Open(String),
    /// A request could not be delivered or its response was lost.
    #[error("tool channel transport error: {0}")]
    Transport(String),
    /// The channel has already been shut down.
    #[error("tool channel is closed")]
    Closed,
}

/// A live connection to the tools of one workspace.
#[async_trait]
pub trait ToolChannel: Send {
    /// List the tools offered through this channel, in advertised order.
    async fn list_tools(&mut self) -> Result<Vec<ToolDefinition>, ChannelError>;

    /// Invoke a tool by name and return its textual result.
    async fn invoke(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<String, ChannelError>;

    /// Shut the channel down. Further calls fail with [`ChannelError::Closed`].
    async fn close(&mut self) -> Result<(), ChannelError>;
}

/// Factory for per-turn tool channels.
#[async_trait]
pub trait ChannelOpener: Send + Sync {
    /// Open a fresh channel bound to `root`.
    async fn open(&self, root: &WorkspaceRoot) -> Result<Box<dyn ToolChannel>, ChannelError>;
}

/// A channel that calls [`WorkspaceTools`] directly in the current process.
#[derive(Debug)]
pub struct LocalToolChannel {
    tools: Option<WorkspaceTools>,
}

impl LocalToolChannel {
    /// Create a channel bound to `root`.
    pub fn new(root: WorkspaceRoot) -> Self {
        Self {
            tools: Some(WorkspaceTools::new(root)),
        }
    }

    fn tools(&self) -> Result<&WorkspaceTools, ChannelError> {
        self.tools.as_ref().ok_or(ChannelError::Closed)
    }
}

#[async_trait]
impl ToolChannel for LocalToolChannel {
    async fn list_tools(&mut self) -> Result<Vec<ToolDefinition>, ChannelError> {
        self.tools()?;
        Ok(WorkspaceTools::definitions())
    }

    async fn invoke(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<String, ChannelError> {
        Ok(self.tools()?.dispatch(name, &arguments).into_message())
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.tools = None;
        Ok(())
    }
}

/// Opens a [`LocalToolChannel`] per turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalChannelOpener;

#[async_trait]
impl ChannelOpener for LocalChannelOpener {
    async fn open(&self, root: &WorkspaceRoot) -> Result<Box<dyn ToolChannel>, ChannelError> {
        Ok(Box::new(LocalToolChannel::new(root.clone())))
    }
}
