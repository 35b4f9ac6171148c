//! Core trait definitions for the Engage runtime.
//!
//! These four traits are the seams between the deterministic orchestrator and
//! everything it does not control:
//!
//! - `ModelClient`:       the reasoning engine (untrusted, non-deterministic)
//! - `ToolHandler`:       one concrete integration (side-effecting in live environments)
//! - `ArgumentValidator`: checks model-produced arguments against a tool's schema
//! - `TranscriptSink`:    records every appended message for audit
//!
//! The agent loop only ever talks to these traits, so tests drive it with a
//! scripted model and stub handlers.

use async_trait::async_trait;
use serde_json::Value;

use engage_contracts::{
    error::{EngageResult, HandlerError},
    message::{Message, ModelReply},
    run::RunStatus,
    tool::ToolSpec,
};

/// The LLM capability.
///
/// Implementations may suspend on network I/O. Any `Err` is treated as a
/// model-contact fault and ends the run with `RunStatus::Failed`.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Submit the full transcript and the currently available tools.
    async fn submit(&self, transcript: &[Message], tools: &[ToolSpec]) -> EngageResult<ModelReply>;

    /// Provider label for logs.
    fn name(&self) -> &str {
        "model"
    }
}

/// A concrete tool integration.
///
/// Handlers receive arguments only after they passed schema validation.
/// Failures are returned as `HandlerError` and become conversation data.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, arguments: &Value) -> Result<Value, HandlerError>;
}

/// Validates untrusted tool arguments before any handler runs.
pub trait ArgumentValidator: Send + Sync {
    /// Return every violation found, or `Ok(())` when the arguments conform.
    fn validate(&self, spec: &ToolSpec, arguments: &Value) -> Result<(), Vec<String>>;
}

/// The transcript sink: the append-only audit record of a run.
///
/// Every message the loop appends is forwarded here, in order. A failed
/// write ends the run with `RunFailure::Transcript`.
pub trait TranscriptSink: Send + Sync {
    /// Record one appended message. `turn` is the model submission it belongs to.
    fn record(&self, run_id: &str, turn: u32, message: &Message) -> EngageResult<()>;

    /// Seal the record once the run reaches a terminal status.
    fn finalize(&self, run_id: &str, status: RunStatus) -> EngageResult<()>;
}
