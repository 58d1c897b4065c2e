//! Atelier: sandboxed project workspaces for an LLM file-editing agent.
//!
//! A user uploads a project archive, which becomes a session workspace on
//! disk. Each prompt runs one agent turn: the model sees the workspace file
//! tools, its tool calls are executed against the workspace through a tool
//! channel, and the results are folded back into a single response. Every
//! caller-supplied path goes through the [`guard`] before touching storage.

pub mod archive;
pub mod channel;
pub mod config;
pub mod guard;
pub mod orchestrator;
pub mod provider;
pub mod session;
pub mod tools;


pub use channel::{ChannelError, ChannelOpener, LocalChannelOpener, LocalToolChannel, ToolChannel};
pub use config::{AnthropicConfig, ConfigError, Settings};
pub use guard::{ConfinementError, WorkspaceRoot};
pub use orchestrator::{SYSTEM_PROMPT, TurnError, TurnOrchestrator, TurnResult};
pub use provider::{
    AnthropicProvider, Completion, CompletionProvider, CompletionRequest, ProviderError,
    ScriptedProvider, Segment, ToolCall,
};
pub use session::{FileEntry, FileTree, Session, SessionError, SessionId, SessionStore};
pub use tools::{ToolDefinition, ToolOutcome, WorkspaceTools};
