//! Provider that replays canned completions.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Completion, CompletionProvider, CompletionRequest, ProviderError};

/// Returns pre-recorded results in order and records every request.
///
/// Once the script is exhausted every further call fails with
/// [`ProviderError::Request`].
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Completion, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a script of successful completions.
    pub fn with_completions(completions: impl IntoIterator<Item = Completion>) -> Self {
        Self {
            script: Mutex::new(completions.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Append a result to the script.
    pub async fn push(&self, result: Result<Completion, ProviderError>) {
        self.script.lock().await.push_back(result);
    }

    /// The requests received so far.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        self.requests.lock().await.push(request.clone());
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Request("no scripted completion left".into())))
    }
}
