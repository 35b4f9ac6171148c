//! Deterministic stand-ins for the LLM capability and for tool handlers.
//!
//! These are used by the unit tests across the workspace and by the
//! reference scenarios, which need a model whose behavior is fixed.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use serde_json::Value;

use engage_contracts::{
    error::{EngageError, EngageResult, HandlerError},
    message::{Message, ModelReply},
    tool::{ToolCall, ToolSpec},
};

use crate::traits::{ModelClient, ToolHandler};

/// A model that replays a fixed queue of replies.
///
/// Every submission is recorded so tests can inspect what the loop sent.
/// Once the queue is empty, `submit` fails with `EngageError::Model`.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ModelReply>>,
    submissions: Mutex<Vec<Submission>>,
}

/// What one `submit` call received.
#[derive(Debug, Clone)]
pub struct Submission {
    pub transcript: Vec<Message>,
    pub tool_names: Vec<String>,
}

impl ScriptedModel {
    pub fn new(replies: impl IntoIterator<Item = ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    /// A model that answers once with `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new([ModelReply::Text(text.into())])
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn submit(&self, transcript: &[Message], tools: &[ToolSpec]) -> EngageResult<ModelReply> {
        if let Ok(mut submissions) = self.submissions.lock() {
            submissions.push(Submission {
                transcript: transcript.to_vec(),
                tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            });
        }

        let mut replies = self.replies.lock().map_err(|_| EngageError::Model {
            reason: "scripted model lock poisoned".to_string(),
        })?;
        replies.pop_front().ok_or_else(|| EngageError::Model {
            reason: "scripted model has no replies left".to_string(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A model that never stops calling one tool.
///
/// Call ids are `call-1`, `call-2`, … across the whole run.
pub struct LoopingModel {
    tool_name: String,
    arguments: Value,
    issued: AtomicU32,
}

impl LoopingModel {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            issued: AtomicU32::new(0),
        }
    }

    /// Number of submissions answered so far.
    pub fn submissions(&self) -> u32 {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for LoopingModel {
    async fn submit(&self, _transcript: &[Message], _tools: &[ToolSpec]) -> EngageResult<ModelReply> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ModelReply::ToolCalls(vec![ToolCall::new(
            format!("call-{}", n),
            self.tool_name.clone(),
            self.arguments.clone(),
        )]))
    }

    fn name(&self) -> &str {
        "looping"
    }
}

/// A handler that always returns the same value.
pub struct StaticHandler {
    output: Value,
}

impl StaticHandler {
    pub fn new(output: Value) -> Self {
        Self { output }
    }
}

#[async_trait]
impl ToolHandler for StaticHandler {
    async fn invoke(&self, _arguments: &Value) -> Result<Value, HandlerError> {
        Ok(self.output.clone())
    }
}
