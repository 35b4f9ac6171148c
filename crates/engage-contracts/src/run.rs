//! Run identity and terminal result types.
//!
//! `RunResult` is the only artifact a caller gets back from a run. It always
//! carries the transcript, whatever the terminal status.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::Message;

/// Unique identifier for one agent run.
///
/// Appears in every log line and transcript record the run produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub uuid::Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The model answered with text.
    Completed,
    /// A model-contact fault, cancellation, or internal fault stopped the run.
    Failed,
    /// The dispatch-cycle budget ran out before the model answered with text.
    MaxTurnsExceeded,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::MaxTurnsExceeded => "max_turns_exceeded",
        };
        f.write_str(label)
    }
}

/// The suspension point a cancellation interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    ModelCall,
    ToolDispatch,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStage::ModelCall => f.write_str("model call"),
            RunStage::ToolDispatch => f.write_str("tool dispatch"),
        }
    }
}

/// Why a run ended with `RunStatus::Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunFailure {
    #[error("model contact failed: {reason}")]
    ModelContact { reason: String },

    #[error("model did not respond within {after_ms} ms")]
    ModelTimeout { after_ms: u64 },

    /// The model replied with something the loop cannot act on.
    #[error("model protocol violation: {reason}")]
    ModelProtocol { reason: String },

    #[error("run cancelled during {stage}")]
    Cancelled { stage: RunStage },

    /// Conversation bookkeeping was violated. Indicates a logic fault.
    #[error("internal fault: {reason}")]
    Internal { reason: String },

    #[error("transcript sink failed: {reason}")]
    Transcript { reason: String },
}

/// The terminal artifact of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub status: RunStatus,
    /// The model's closing answer. Present only for `Completed`.
    pub final_text: Option<String>,
    /// Present only for `Failed`.
    pub failure: Option<RunFailure>,
    /// Number of model submissions made.
    pub turns: u32,
    /// Number of completed tool dispatch batches.
    pub dispatch_cycles: u32,
    pub transcript: Vec<Message>,
}

impl RunResult {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
