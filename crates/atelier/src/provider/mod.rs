//! LLM completion providers.
//!
//! The orchestrator treats the model as an opaque function: a prompt, a
//! system instruction and a tool schema go in, an ordered list of
//! [`Segment`]s comes out. Each segment is either plain text or a request to
//! call a tool.
//!
//! - [`AnthropicProvider`] - Anthropic Messages API over HTTP
//! - [`ScriptedProvider`] - replays pre-recorded completions (tests, demos)

mod anthropic;
mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::tools::ToolDefinition;

pub use anthropic::AnthropicProvider;
pub use scripted::ScriptedProvider;

/// Errors from a completion request. All of them are fatal to the turn.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request could not be sent or no response arrived.
    #[error("completion request failed: {0}")]
    Request(String),
    /// The provider answered with a non-success status.
    #[error("provider returned HTTP {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },
    /// The response body could not be understood.
    #[error("failed to decode completion: {0}")]
    Decode(String),
}

/// A single completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier.
    pub model: String,
    /// System instruction.
    pub system: String,
    /// The user's prompt.
    pub prompt: String,
    /// Tools the model may call.
    pub tools: Vec<ToolDefinition>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

/// A tool call emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments, keyed by parameter name.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Create a tool call.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One piece of model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text for the user.
    Text {
        /// The text.
        text: String,
    },
    /// A request to call a tool.
    ToolCall(ToolCall),
}

impl Segment {
    /// A text segment.
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text { text: text.into() }
    }
}

/// The ordered output of one completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Segments in emission order.
    pub segments: Vec<Segment>,
}

impl Completion {
    /// Build a completion from segments.
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Iterate over the tool calls only.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.segments.iter().filter_map(|s| match s {
            Segment::ToolCall(call) => Some(call),
            Segment::Text { .. } => None,
        })
    }
}

/// A model that turns a [`CompletionRequest`] into a [`Completion`].
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Request a single completion. No retries are attempted.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError>;
}

#[async_trait]
impl<P: CompletionProvider + ?Sized> CompletionProvider for std::sync::Arc<P> {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        (**self).complete(request).await
    }
}
