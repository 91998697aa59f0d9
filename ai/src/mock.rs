//! Scripted model for tests and offline runs.
//!
//! Replays a fixed list of turns in order, then either repeats a fallback turn or fails.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::{Message, ModelError, ModelRequest, ModelTurn, ReasoningModel};

/// What the model was shown on one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<ModelTurn, ModelError>>>,
    fallback: Option<ModelTurn>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    pub fn new(script: impl IntoIterator<Item = Result<ModelTurn, ModelError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// A model that answers every request with the same turn. Tool call ids are refreshed
    /// on every call.
    pub fn repeating(turn: ModelTurn) -> Self {
        Self::new([]).with_fallback(turn)
    }

    #[must_use]
    pub fn with_fallback(mut self, turn: ModelTurn) -> Self {
        self.fallback = Some(turn);
        self
    }

    /// Sleeps before every reply, giving concurrent callers a chance to interleave.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn next_turn(&self) -> Result<ModelTurn, ModelError> {
        let scripted = self
            .script
            .lock()
            .map_err(|_| ModelError::Unavailable("script lock poisoned".to_string()))?
            .pop_front();

        match (scripted, &self.fallback) {
            (Some(turn), _) => turn,
            (None, Some(fallback)) => {
                let mut turn = fallback.clone();
                for call in &mut turn.tool_calls {
                    call.id = crate::new_call_id();
                }
                Ok(turn)
            }
            (None, None) => Err(ModelError::Unavailable("script exhausted".to_string())),
        }
    }
}

#[async_trait]
impl ReasoningModel for ScriptedModel {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelTurn, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                system: request.system.to_string(),
                messages: request.messages.to_vec(),
                tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
            });
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.next_turn()
    }
}
