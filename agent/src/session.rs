//! Conversation sessions keyed by an explicit id.
//!
//! Each session owns its transcript. At most one run is in flight per session; a second
//! `submit` for the same id is rejected with [`AgentError::Busy`] instead of waiting.
//! Different sessions run fully in parallel and share only the agent (model, catalog and
//! database pool).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ai::Message;
use tokio_util::sync::CancellationToken;

use crate::agent_loop::{AgentLoop, RunOutcome};
use crate::error::AgentError;
use crate::transcript::Transcript;

const INTERRUPTED_TOOL_RESULT: &str =
    "The previous request was interrupted before this tool finished.";

/// One conversation.
#[derive(Debug)]
pub struct Session {
    id: String,
    transcript: tokio::sync::Mutex<Transcript>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl Session {
    fn new(id: String, intro: &str) -> Self {
        Self {
            id,
            transcript: tokio::sync::Mutex::new(Transcript::with_intro(intro)),
            cancel: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current messages. Waits for a run in flight to finish.
    pub async fn snapshot(&self) -> Arc<[Message]> {
        self.transcript.lock().await.snapshot()
    }

    /// Whether a run currently holds this session.
    pub fn is_busy(&self) -> bool {
        self.transcript.try_lock().is_err()
    }

    fn cancel_slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub struct SessionController {
    agent: Arc<AgentLoop>,
    intro: String,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionController {
    /// `intro` seeds every new or reset transcript as an assistant message.
    pub fn new(agent: Arc<AgentLoop>, intro: impl Into<String>) -> Self {
        Self {
            agent,
            intro: intro.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a session under a fresh random id.
    pub fn open(&self) -> Arc<Session> {
        let id = uuid::Uuid::new_v4().to_string();
        self.get_or_create(&id)
    }

    /// Returns the session for `id`, creating it on first use. The same id always yields
    /// the same session until it is closed.
    pub fn get_or_create(&self, id: &str) -> Arc<Session> {
        let mut sessions = self.sessions();
        if let Some(session) = sessions.get(id) {
            return Arc::clone(session);
        }
        tracing::debug!(session = id, "creating session");
        let session = Arc::new(Session::new(id.to_string(), &self.intro));
        sessions.insert(id.to_string(), Arc::clone(&session));
        session
    }

    /// Appends the user's message, runs the agent to completion and returns how it ended.
    /// The closing assistant message is already in the transcript when this returns.
    #[tracing::instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn submit(&self, session_id: &str, text: &str) -> Result<RunOutcome, AgentError> {
        let session = self.get_or_create(session_id);
        let Ok(mut transcript) = session.transcript.try_lock() else {
            tracing::info!("rejecting submit while a run is in flight");
            return Err(AgentError::Busy(session_id.to_string()));
        };

        let closed = transcript.close_pending(INTERRUPTED_TOOL_RESULT);
        if closed > 0 {
            tracing::warn!(closed, "answered tool calls left open by an interrupted run");
        }
        transcript.append(Message::user(text))?;

        let cancel = CancellationToken::new();
        *session.cancel_slot() = Some(cancel.clone());

        let outcome = self.agent.run(&mut transcript, &cancel).await;

        session.cancel_slot().take();
        match &outcome {
            Ok(outcome) => tracing::info!(
                state = %outcome.state,
                iterations = outcome.iterations,
                "submit finished"
            ),
            Err(err) => tracing::error!(error = %err, "submit failed"),
        }
        outcome
    }

    /// Cancels the run in flight for `session_id`. Returns whether there was one.
    pub fn cancel(&self, session_id: &str) -> bool {
        let Some(session) = self.sessions().get(session_id).cloned() else {
            return false;
        };
        let mut slot = session.cancel_slot();
        // a token left behind by a dropped submit belongs to no run
        if !session.is_busy() {
            slot.take();
            return false;
        }
        match slot.as_ref() {
            Some(token) => {
                tracing::info!(session = session_id, "cancelling run");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Clears the history back to the intro message.
    pub fn reset(&self, session_id: &str) -> Result<(), AgentError> {
        let session = self.find(session_id)?;
        let Ok(mut transcript) = session.transcript.try_lock() else {
            return Err(AgentError::Busy(session_id.to_string()));
        };
        transcript.reset(Message::assistant(self.intro.clone()))?;
        tracing::info!(session = session_id, "history cleared");
        Ok(())
    }

    /// Snapshot of the session's messages. Waits for a run in flight to finish.
    pub async fn transcript(&self, session_id: &str) -> Result<Arc<[Message]>, AgentError> {
        Ok(self.find(session_id)?.snapshot().await)
    }

    /// Forgets the session, cancelling any run still in flight.
    pub fn close(&self, session_id: &str) -> bool {
        self.cancel(session_id);
        self.sessions().remove(session_id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    fn find(&self, session_id: &str) -> Result<Arc<Session>, AgentError> {
        self.sessions()
            .get(session_id)
            .cloned()
            .ok_or_else(|| AgentError::UnknownSession(session_id.to_string()))
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
