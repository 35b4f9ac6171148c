//! Conversation message and model reply types.

use serde::{Deserialize, Serialize};

use crate::tool::{ToolCall, ToolResult};

/// One entry in a run's transcript.
///
/// Every `ToolResult` must answer an earlier `AssistantToolCall` with the same
/// call id; `Conversation` in engage-core enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System { content: String },
    User { content: String },
    AssistantText { content: String },
    AssistantToolCall(ToolCall),
    ToolResult(ToolResult),
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Message::AssistantText {
            content: content.into(),
        }
    }

    /// Short role label used in logs and transcript records.
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::AssistantText { .. } => "assistant_text",
            Message::AssistantToolCall(_) => "assistant_tool_call",
            Message::ToolResult(_) => "tool_result",
        }
    }
}

/// What the model capability returns for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelReply {
    /// A natural-language answer. Ends the run.
    Text(String),
    /// One or more tool invocations, in the order the model issued them.
    ToolCalls(Vec<ToolCall>),
}
