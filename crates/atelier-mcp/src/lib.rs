//! Atelier MCP
//!
//! Exposes the workspace file tools (`create_file`, `delete_file`,
//! `edit_file`) as an MCP server bound to a single workspace directory, and
//! provides [`McpToolChannel`], the client side the turn orchestrator uses to
//! reach that server either in-process or in a child process.

mod client;
mod server;

pub use client::{McpChannelOpener, McpToolChannel};
pub use server::WorkspaceServer;
