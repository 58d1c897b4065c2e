//! Turn execution: one prompt, one completion, zero or more tool calls.
//!
//! ```text
//! START ──> LLM_CALL ──(no tool calls)──────────────────────> DONE
//!               │                                              ^
//!               └──> TOOL_DISPATCH (sequential) ──> AGGREGATE ─┘
//! ```
//!
//! A turn opens its own tool channel bound to the session's workspace and
//! closes it before returning, so channels are never shared between turns
//! or sessions. Tool calls run strictly in emission order; an edit sees the
//! effect of a create earlier in the same turn. A failing tool call becomes
//! an error line in the response and never stops the calls after it.

use std::io;

use thiserror::Error;

use crate::channel::{ChannelError, ChannelOpener, ToolChannel};
use crate::config::Settings;
use crate::provider::{CompletionProvider, CompletionRequest, ProviderError, Segment, ToolCall};
use crate::session::{FileTree, Session, SessionError, SessionStore};

/// System instruction sent with every turn.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant with access to a file system. \
You can create, edit, read, and delete files. \
Use the available tools to help the user with their requests.";

/// Message returned when a turn produced neither text nor tool results.
pub const NO_RESPONSE: &str = "No response generated.";

/// Turn-level failures. Per-tool failures are not errors; they are folded
/// into the [`TurnResult`] message.
#[derive(Debug, Error)]
pub enum TurnError {
    /// The session does not exist (reported before any model call).
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The tool channel could not be opened or listed.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// The model call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The workspace could not be scanned after the turn.
    #[error("failed to snapshot workspace: {0}")]
    Io(#[from] io::Error),
}

/// The outcome of a successful turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResult {
    /// Text segments followed by tool result lines, newline-joined.
    pub message: String,
    /// The workspace files after the turn.
    pub file_tree: FileTree,
}

/// Runs turns against session workspaces.
#[derive(Debug)]
pub struct TurnOrchestrator<P, O> {
    provider: P,
    opener: O,
    model: String,
    max_tokens: u32,
}

impl<P: CompletionProvider, O: ChannelOpener> TurnOrchestrator<P, O> {
    /// Create an orchestrator using the model settings from `settings`.
    pub fn new(provider: P, opener: O, settings: &Settings) -> Self {
        Self {
            provider,
            opener,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
        }
    }

    /// The completion provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Look up `session_id` in `store` and run one turn against it.
    pub async fn prompt(
        &self,
        store: &SessionStore,
        session_id: &str,
        prompt: &str,
    ) -> Result<TurnResult, TurnError> {
        let session = store.open(session_id)?;
        self.run(&session, prompt).await
    }

    /// Run one turn against an existing session.
    #[tracing::instrument(skip_all, fields(session = %session.id()))]
    pub async fn run(&self, session: &Session, prompt: &str) -> Result<TurnResult, TurnError> {
        let mut channel = self.opener.open(session.root()).await?;
        let message = self.drive(channel.as_mut(), prompt).await;

        if let Err(e) = channel.close().await {
            tracing::warn!(error = %e, "failed to close tool channel");
        }

        let message = message?;
        let file_tree = session.file_tree()?;
        tracing::info!(files = file_tree.len(), "turn complete");
        Ok(TurnResult { message, file_tree })
    }

    async fn drive(&self, channel: &mut dyn ToolChannel, prompt: &str) -> Result<String, TurnError> {
        let tools = channel.list_tools().await?;
        let request = CompletionRequest {
            model: self.model.clone(),
            system: SYSTEM_PROMPT.to_string(),
            prompt: prompt.to_string(),
            tools,
            max_tokens: self.max_tokens,
        };

        let completion = self.provider.complete(&request).await?;

        let mut texts = Vec::new();
        let mut results = Vec::new();
        for segment in completion.segments {
            match segment {
                Segment::Text { text } => {
                    if !text.is_empty() {
                        texts.push(text);
                    }
                }
                Segment::ToolCall(call) => results.push(invoke(channel, call).await),
            }
        }

        tracing::debug!(texts = texts.len(), tool_calls = results.len(), "aggregating turn");
        Ok(aggregate(texts, results))
    }
}

async fn invoke(channel: &mut dyn ToolChannel, call: ToolCall) -> String {
    tracing::debug!(tool = %call.name, id = %call.id, "invoking tool");
    match channel.invoke(&call.name, call.arguments).await {
        Ok(output) => format!("Executed {}: {}", call.name, output),
        Err(e) => {
            tracing::warn!(tool = %call.name, error = %e, "tool invocation failed");
            format!("Error executing {}: {}", call.name, e)
        }
    }
}

fn aggregate(texts: Vec<String>, results: Vec<String>) -> String {
    let lines: Vec<String> = texts.into_iter().chain(results).collect();
    if lines.is_empty() {
        NO_RESPONSE.to_string()
    } else {
        lines.join("\n")
    }
}
