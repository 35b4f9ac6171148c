//! The append-only transcript of one run.
//!
//! `Conversation` tracks which tool calls are still unanswered so that a
//! result can never be appended for a call the model did not make.

use std::collections::HashSet;

use engage_contracts::{
    error::{EngageError, EngageResult},
    message::Message,
    tool::{CallId, ToolResult},
};

/// Ordered, append-only sequence of messages owned by one run.
#[derive(Debug, Default, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    /// Call ids of `AssistantToolCall` messages with no `ToolResult` yet.
    outstanding: HashSet<CallId>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message.
    ///
    /// An `AssistantToolCall` registers its call id as outstanding; reusing an
    /// id that is still outstanding is rejected. A `ToolResult` is handled as
    /// a one-element batch of `append_tool_results`.
    pub fn append(&mut self, message: Message) -> EngageResult<()> {
        match message {
            Message::ToolResult(result) => self.append_tool_results(vec![result]),
            Message::AssistantToolCall(call) => {
                if !self.outstanding.insert(call.call_id.clone()) {
                    return Err(EngageError::DanglingCall {
                        call_id: call.call_id.0,
                    });
                }
                self.messages.push(Message::AssistantToolCall(call));
                Ok(())
            }
            other => {
                self.messages.push(other);
                Ok(())
            }
        }
    }

    /// Append a batch of tool results atomically.
    ///
    /// Every call id must be outstanding and appear at most once in the batch.
    /// On any violation nothing is appended and `DanglingCall` names the first
    /// offending id.
    pub fn append_tool_results(&mut self, results: Vec<ToolResult>) -> EngageResult<()> {
        let mut seen: HashSet<&CallId> = HashSet::with_capacity(results.len());
        for result in &results {
            if !self.outstanding.contains(&result.call_id) || !seen.insert(&result.call_id) {
                return Err(EngageError::DanglingCall {
                    call_id: result.call_id.0.clone(),
                });
            }
        }

        for result in results {
            self.outstanding.remove(&result.call_id);
            self.messages.push(Message::ToolResult(result));
        }
        Ok(())
    }

    /// The full transcript in append order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn outstanding_calls(&self) -> impl Iterator<Item = &CallId> {
        self.outstanding.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
