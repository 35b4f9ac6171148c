//! Error types for the Engage runtime.
//!
//! Two families live here:
//!
//! - `EngageError`: loading-time, configuration, and model-contact faults.
//!   These abort a run (or prevent it from starting).
//! - `ToolFault`: tool-layer faults. These are never fatal; the agent loop
//!   feeds them back to the model as `ToolResult` data.
//!
//! `HandlerError` is what a concrete tool handler returns when its backend
//! call fails. The registry wraps it into `ToolFault::Execution`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The unified error type for the Engage runtime.
#[derive(Debug, Error)]
pub enum EngageError {
    /// The playbook document could not be turned into a `Playbook`.
    #[error("playbook parse error: {reason}")]
    Parse { reason: String },

    /// The requested environment is not declared in the environment config.
    #[error("unknown environment '{name}'")]
    UnknownEnvironment { name: String },

    /// The playbook restricts which environments it may run in, and the
    /// requested one is not among them.
    #[error("playbook does not permit environment '{environment}'")]
    EnvironmentNotPermitted { environment: String },

    /// A tool result referenced a call id with no outstanding tool call.
    ///
    /// This is an internal consistency violation and is fatal to the run.
    #[error("tool result for call '{call_id}' has no outstanding tool call")]
    DanglingCall { call_id: String },

    /// Two tools with the same name were registered into one registry or catalog.
    #[error("tool '{name}' is registered more than once")]
    DuplicateTool { name: String },

    /// The model provider could not be reached or returned an unusable response.
    #[error("model error: {reason}")]
    Model { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The transcript sink could not persist a message.
    #[error("transcript write failed: {reason}")]
    TranscriptWrite { reason: String },

    /// A filesystem read or write failed.
    #[error("io error: {reason}")]
    Io { reason: String },
}

/// Convenience alias used throughout the Engage crates.
pub type EngageResult<T> = Result<T, EngageError>;

/// A tool-layer fault, carried in-band as conversation data.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolFault {
    /// No tool with this name is registered in the current environment.
    #[error("unknown tool '{name}'")]
    UnknownTool { name: String },

    /// The arguments do not satisfy the tool's parameter schema.
    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The handler ran and failed, or did not finish within its timeout.
    #[error("tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },

    /// The playbook does not allow this call.
    #[error("tool '{tool}' blocked by playbook policy: {reason}")]
    PolicyViolation { tool: String, reason: String },
}

/// Error returned by a concrete tool handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
