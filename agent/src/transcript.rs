//! Ordered, append-only conversation log for one session.

use std::collections::HashSet;
use std::sync::Arc;

use ai::{Message, Role};

use crate::error::AgentError;

/// Messages in append order.
///
/// Every `tool` message answers exactly one earlier assistant tool request, and at most one
/// request is open at a time. Appends that would break this are refused.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
    open_calls: HashSet<String>,
    call_ids: HashSet<String>,
}

impl Transcript {
    /// Transcript seeded with an assistant greeting.
    pub fn with_intro(intro: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::assistant(intro)],
            open_calls: HashSet::new(),
            call_ids: HashSet::new(),
        }
    }

    pub fn append(&mut self, message: Message) -> Result<(), AgentError> {
        self.check(&message).map_err(|reason| {
            tracing::error!(role = %message.role, %reason, "refusing transcript append");
            AgentError::InvariantViolation(reason)
        })?;

        match (&message.role, &message.tool_call, &message.tool_call_id) {
            (Role::Assistant, Some(call), _) => {
                self.open_calls.insert(call.id.clone());
                self.call_ids.insert(call.id.clone());
            }
            (Role::Tool, _, Some(id)) => {
                self.open_calls.remove(id);
            }
            _ => {}
        }

        self.messages.push(message);
        Ok(())
    }

    /// Immutable copy of the current messages, safe to hand to a model call.
    pub fn snapshot(&self) -> Arc<[Message]> {
        Arc::from(self.messages.as_slice())
    }

    /// Replaces the whole history with `seed`.
    pub fn reset(&mut self, seed: Message) -> Result<(), AgentError> {
        if seed.role == Role::Tool || seed.tool_call.is_some() || seed.tool_call_id.is_some() {
            return Err(AgentError::InvariantViolation(
                "a transcript can only be seeded with a plain user or assistant message"
                    .to_string(),
            ));
        }
        self.messages = vec![seed];
        self.open_calls.clear();
        self.call_ids.clear();
        Ok(())
    }

    /// Answers any tool request left open by an interrupted run so the history is
    /// consistent again. Returns how many were closed.
    pub fn close_pending(&mut self, content: &str) -> usize {
        let mut pending: Vec<String> = self.open_calls.iter().cloned().collect();
        pending.sort();
        for id in &pending {
            self.messages.push(Message::tool_result(id.clone(), content));
        }
        self.open_calls.clear();
        pending.len()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn has_open_call(&self) -> bool {
        !self.open_calls.is_empty()
    }

    /// Whether a tool request with this id was ever recorded.
    pub fn has_call_id(&self, id: &str) -> bool {
        self.call_ids.contains(id)
    }

    fn check(&self, message: &Message) -> Result<(), String> {
        match message.role {
            Role::User | Role::Assistant if message.tool_call_id.is_some() => {
                Err(format!("{} message carries a tool_call_id", message.role))
            }
            Role::User if message.tool_call.is_some() => {
                Err("user message carries a tool call".to_string())
            }
            Role::User | Role::Assistant if self.has_open_call() => Err(format!(
                "{} message appended while a tool call is still unanswered",
                message.role
            )),
            Role::Assistant => match &message.tool_call {
                Some(call) if call.id.is_empty() => Err("tool call without an id".to_string()),
                Some(call) if self.call_ids.contains(&call.id) => {
                    Err(format!("tool call id {} is already used", call.id))
                }
                _ => Ok(()),
            },
            Role::User => Ok(()),
            Role::Tool => match (&message.tool_call, &message.tool_call_id) {
                (Some(_), _) => Err("tool message carries a tool call".to_string()),
                (None, None) => Err("tool message without a tool_call_id".to_string()),
                (None, Some(id)) if !self.open_calls.contains(id) => Err(format!(
                    "tool result {id} does not answer a pending tool call"
                )),
                (None, Some(_)) => Ok(()),
            },
        }
    }
}
