//! The think / act loop that drives one answer.
//!
//! A run starts in [`LoopState::Thinking`]. Each model turn either produces the answer
//! ([`LoopState::Done`]) or requests exactly one tool call ([`LoopState::ToolPending`]), whose
//! result is appended before thinking again. Model failures, cancellation and the iteration
//! bound end the run in [`LoopState::Aborted`]. Either way the final assistant message is
//! appended here, so the transcript is always consistent when `run` returns.

use std::fmt;
use std::sync::Arc;

use ai::{Message, ModelError, ModelRequest, ModelTurn, ReasoningModel, ToolCallInfo};
use tokio_util::sync::CancellationToken;

use crate::catalog::ToolCatalog;
use crate::error::AgentError;
use crate::transcript::Transcript;

const CANCELLED_TOOL_RESULT: &str = "Cancelled before the tool finished.";
const EMPTY_ANSWER: &str = "I don't have an answer to that.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Thinking,
    ToolPending,
    Done,
    Aborted,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoopState::Thinking => "THINKING",
            LoopState::ToolPending => "TOOL_PENDING",
            LoopState::Done => "DONE",
            LoopState::Aborted => "ABORTED",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The model kept calling tools for this many turns.
    IterationLimit(usize),
    Cancelled,
    Model(ModelError),
}

impl AbortReason {
    /// Plain-language text recorded as the assistant's turn.
    pub fn user_message(&self) -> String {
        match self {
            AbortReason::IterationLimit(n) => format!(
                "I couldn't finish answering within {n} steps. Try rephrasing the question or \
                 asking for something more specific."
            ),
            AbortReason::Cancelled => {
                "The request was cancelled before I could answer.".to_string()
            }
            AbortReason::Model(err) => format!(
                "I couldn't reach the language model to answer that ({err}). Please try again."
            ),
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::IterationLimit(n) => write!(f, "iteration limit of {n} reached"),
            AbortReason::Cancelled => f.write_str("cancelled"),
            AbortReason::Model(err) => write!(f, "model error: {err}"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// `Done` or `Aborted`.
    pub state: LoopState,
    /// The assistant message appended at the end of the run.
    pub answer: String,
    /// Model turns taken.
    pub iterations: usize,
    pub abort_reason: Option<AbortReason>,
}

impl RunOutcome {
    pub fn is_done(&self) -> bool {
        self.state == LoopState::Done
    }
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_iterations: usize,
    pub system_prompt: String,
}

impl LoopSettings {
    pub fn new(max_iterations: usize, system_prompt: impl Into<String>) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            system_prompt: system_prompt.into(),
        }
    }
}

enum Step {
    Answer(String),
    Call(ToolCallInfo),
}

#[derive(Debug)]
pub struct AgentLoop {
    model: Arc<dyn ReasoningModel>,
    catalog: Arc<ToolCatalog>,
    settings: LoopSettings,
}

impl AgentLoop {
    pub fn new(
        model: Arc<dyn ReasoningModel>,
        catalog: Arc<ToolCatalog>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            model,
            catalog,
            settings,
        }
    }

    /// Runs until the model answers or the run is aborted, appending every turn to
    /// `transcript`.
    ///
    /// Only transcript corruption is returned as an error. Model failures and cancellation
    /// come back as an aborted [`RunOutcome`].
    #[tracing::instrument(skip_all, fields(max_iterations = self.settings.max_iterations))]
    pub async fn run(
        &self,
        transcript: &mut Transcript,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, AgentError> {
        let max_iterations = self.settings.max_iterations;
        let mut iterations = 0;

        loop {
            tracing::trace!(state = %LoopState::Thinking, iterations);
            if iterations >= max_iterations {
                return abort(
                    transcript,
                    AbortReason::IterationLimit(max_iterations),
                    iterations,
                );
            }

            let turn = match self.think(transcript, cancel).await {
                Ok(turn) => turn,
                Err(reason) => return abort(transcript, reason, iterations),
            };
            iterations += 1;

            match interpret(turn, transcript) {
                Step::Answer(answer) => {
                    transcript.append(Message::assistant(answer.clone()))?;
                    tracing::info!(iterations, "run finished");
                    return Ok(RunOutcome {
                        state: LoopState::Done,
                        answer,
                        iterations,
                        abort_reason: None,
                    });
                }
                Step::Call(call) => {
                    transcript.append(Message::tool_request(call.clone()))?;
                    tracing::trace!(state = %LoopState::ToolPending, tool = %call.name);
                    if !self.act(call, transcript, cancel).await? {
                        return abort(transcript, AbortReason::Cancelled, iterations);
                    }
                }
            }
        }
    }

    async fn think(
        &self,
        transcript: &Transcript,
        cancel: &CancellationToken,
    ) -> Result<ModelTurn, AbortReason> {
        let snapshot = transcript.snapshot();
        let request = ModelRequest {
            system: &self.settings.system_prompt,
            messages: &snapshot,
            tools: self.catalog.list(),
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AbortReason::Cancelled),
            turn = self.model.complete(request) => turn.map_err(|err| {
                tracing::warn!(error = %err, "model call failed");
                AbortReason::Model(err)
            }),
        }
    }

    /// Executes the pending call and appends its result. Returns `false` when cancelled
    /// mid-call; the request is still answered so no call is left open.
    async fn act(
        &self,
        call: ToolCallInfo,
        transcript: &mut Transcript,
        cancel: &CancellationToken,
    ) -> Result<bool, AgentError> {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = self.catalog.execute(&call) => Some(result),
        };

        let (content, finished) = match result {
            Some(Ok(output)) => (output, true),
            Some(Err(err)) => (err.to_string(), true),
            None => (CANCELLED_TOOL_RESULT.to_string(), false),
        };
        transcript.append(Message::tool_result(call.id, content))?;
        Ok(finished)
    }
}

fn abort(
    transcript: &mut Transcript,
    reason: AbortReason,
    iterations: usize,
) -> Result<RunOutcome, AgentError> {
    tracing::warn!(%reason, iterations, "run aborted");
    let answer = reason.user_message();
    transcript.append(Message::assistant(answer.clone()))?;
    Ok(RunOutcome {
        state: LoopState::Aborted,
        answer,
        iterations,
        abort_reason: Some(reason),
    })
}

/// A tool call wins over any text in the same turn. Only the first call is kept, and its id
/// is replaced when it is missing or was already used in this transcript.
fn interpret(turn: ModelTurn, transcript: &Transcript) -> Step {
    let ModelTurn { text, tool_calls } = turn;
    let extra = tool_calls.len().saturating_sub(1);

    let Some(mut call) = tool_calls.into_iter().next() else {
        let answer = text.trim();
        if answer.is_empty() {
            return Step::Answer(EMPTY_ANSWER.to_string());
        }
        return Step::Answer(answer.to_string());
    };

    if extra > 0 {
        tracing::warn!(extra, tool = %call.name, "model requested several tools, running the first");
    }
    if !text.trim().is_empty() {
        tracing::debug!(narration = %text.trim(), "discarding text sent with a tool call");
    }
    if call.id.is_empty() || transcript.has_call_id(&call.id) {
        call.id = ai::new_call_id();
    }
    Step::Call(call)
}
