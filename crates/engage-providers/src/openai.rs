//! OpenAI-compatible chat-completions client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use engage_contracts::{
    error::{EngageError, EngageResult},
    message::{Message, ModelReply},
    tool::{ToolCall, ToolOutcome, ToolSpec},
};
use engage_core::traits::ModelClient;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// A `ModelClient` for any endpoint implementing `POST {base_url}/chat/completions`.
pub struct OpenAiChatClient {
    client: reqwest::Client,
    label: String,
    model: String,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiChatClient {
    /// Client for an arbitrary compatible endpoint. `base_url` includes the
    /// version segment, e.g. `https://api.openai.com/v1`.
    pub fn new(model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            label: "openai".to_string(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Client for the hosted OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(model, OPENAI_BASE_URL).with_api_key(api_key)
    }

    /// Client for a local Ollama server.
    pub fn ollama(model: impl Into<String>) -> Self {
        Self::new(model, OLLAMA_BASE_URL).with_label("ollama")
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Provider label reported by `ModelClient::name`.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &'static str, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    /// Some compatible servers omit the id; one is generated on parse.
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunction,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// JSON-encoded arguments.
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ── Conversion ────────────────────────────────────────────────────────────────

fn model_error(reason: impl Into<String>) -> EngageError {
    EngageError::Model {
        reason: reason.into(),
    }
}

/// Map the transcript onto chat messages.
///
/// Consecutive tool calls from one model reply are folded into a single
/// assistant message, since the protocol expects each batch that way.
pub(crate) fn convert_messages(transcript: &[Message]) -> Vec<ChatMessage> {
    let mut out: Vec<ChatMessage> = Vec::with_capacity(transcript.len());

    for message in transcript {
        match message {
            Message::System { content } => out.push(ChatMessage::text("system", content)),
            Message::User { content } => out.push(ChatMessage::text("user", content)),
            Message::AssistantText { content } => out.push(ChatMessage::text("assistant", content)),
            Message::AssistantToolCall(call) => {
                let wire = WireToolCall {
                    id: call.call_id.0.clone(),
                    kind: function_type(),
                    function: WireFunction {
                        name: call.tool_name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                };
                match out.last_mut() {
                    Some(last) if last.role == "assistant" && !last.tool_calls.is_empty() => {
                        last.tool_calls.push(wire)
                    }
                    _ => out.push(ChatMessage {
                        role: "assistant",
                        content: None,
                        tool_calls: vec![wire],
                        tool_call_id: None,
                    }),
                }
            }
            Message::ToolResult(result) => {
                let content = match &result.outcome {
                    ToolOutcome::Output(Value::String(text)) => text.clone(),
                    ToolOutcome::Output(value) => value.to_string(),
                    ToolOutcome::Error(fault) => serde_json::json!({ "error": fault }).to_string(),
                };
                out.push(ChatMessage {
                    role: "tool",
                    content: Some(content),
                    tool_calls: Vec::new(),
                    tool_call_id: Some(result.call_id.0.clone()),
                });
            }
        }
    }

    out
}

pub(crate) fn build_request(model: &str, transcript: &[Message], tools: &[ToolSpec]) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: convert_messages(transcript),
        tools: tools
            .iter()
            .map(|spec| ChatTool {
                kind: "function",
                function: ChatFunction {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    parameters: spec.parameters.to_json_schema(),
                },
            })
            .collect(),
    }
}

/// A fresh call id for a tool call the server sent without one.
pub(crate) fn generated_call_id() -> String {
    format!("call-{}", uuid::Uuid::new_v4())
}

/// Interpret a chat-completions response body.
///
/// Tool calls win over text. Arguments that are not valid JSON are passed on
/// as a JSON string so that schema validation reports them to the model.
pub(crate) fn parse_response(body: &str) -> EngageResult<ModelReply> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| model_error(format!("failed to parse chat response: {}", e)))?;

    let message = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| model_error("chat response contained no choices"))?;

    if !message.tool_calls.is_empty() {
        let calls = message
            .tool_calls
            .into_iter()
            .map(|wire| {
                let arguments = if wire.function.arguments.trim().is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(&wire.function.arguments)
                        .unwrap_or(Value::String(wire.function.arguments))
                };
                let id = if wire.id.is_empty() {
                    generated_call_id()
                } else {
                    wire.id
                };
                ToolCall::new(id, wire.function.name, arguments)
            })
            .collect();
        return Ok(ModelReply::ToolCalls(calls));
    }

    match message.content {
        Some(text) => Ok(ModelReply::Text(text)),
        None => Err(model_error("chat response had neither content nor tool calls")),
    }
}

// ── ModelClient impl ──────────────────────────────────────────────────────────

#[async_trait]
impl ModelClient for OpenAiChatClient {
    async fn submit(&self, transcript: &[Message], tools: &[ToolSpec]) -> EngageResult<ModelReply> {
        let request = build_request(&self.model, transcript, tools);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            provider = %self.label,
            model = %self.model,
            messages = request.messages.len(),
            tools = tools.len(),
            "submitting chat completion"
        );

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| model_error(format!("failed to reach {}: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| model_error(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!(provider = %self.label, status = %status, "chat completion rejected");
            return Err(model_error(format!("{} returned {}: {}", self.label, status, detail)));
        }

        parse_response(&body)
    }

    fn name(&self) -> &str {
        &self.label
    }
}
