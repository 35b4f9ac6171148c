//! Gemini `generateContent` client.
//!
//! Two ways to reach the same model family:
//!
//! - API key: `POST {GEMINI_BASE_URL}/models/{model}:generateContent` with
//!   the key in the `x-goog-api-key` header.
//! - Vertex AI: `POST https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent`
//!   with an OAuth access token as bearer.
//!
//! Gemini function calls carry no id, so call ids are generated on parse and
//! results are matched back to calls by tool name.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use engage_contracts::{
    error::{EngageError, EngageResult},
    message::{Message, ModelReply},
    tool::{ToolCall, ToolOutcome, ToolSpec},
};
use engage_core::traits::ModelClient;

use crate::openai::generated_call_id;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_VERTEX_LOCATION: &str = "us-central1";

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
];

/// How requests are authenticated, which also decides the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeminiAuth {
    ApiKey(String),
    Vertex {
        project: String,
        location: String,
        access_token: String,
    },
}

/// A `ModelClient` for Gemini, through the public API or Vertex AI.
pub struct GeminiClient {
    client: reqwest::Client,
    model: String,
    auth: GeminiAuth,
    base_url: Option<String>,
}

impl GeminiClient {
    /// Client for the public Gemini API.
    pub fn with_api_key(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            model: model.into(),
            auth: GeminiAuth::ApiKey(api_key.into()),
            base_url: None,
        }
    }

    /// Client for Gemini on Vertex AI.
    pub fn vertex(
        project: impl Into<String>,
        location: impl Into<String>,
        access_token: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            model: model.into(),
            auth: GeminiAuth::Vertex {
                project: project.into(),
                location: location.into(),
                access_token: access_token.into(),
            },
            base_url: None,
        }
    }

    /// Replace the host and version prefix of the endpoint, e.g. for a proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn auth(&self) -> &GeminiAuth {
        &self.auth
    }

    /// The `generateContent` URL for the configured model.
    pub fn endpoint(&self) -> String {
        match &self.auth {
            GeminiAuth::ApiKey(_) => format!(
                "{}/models/{}:generateContent",
                self.base_url.as_deref().unwrap_or(GEMINI_BASE_URL),
                self.model
            ),
            GeminiAuth::Vertex {
                project, location, ..
            } => {
                let base = match &self.base_url {
                    Some(base) => base.clone(),
                    None => format!("https://{}-aiplatform.googleapis.com/v1", location),
                };
                format!(
                    "{}/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
                    base, project, location, self.model
                )
            }
        }
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    generation_config: Value,
    safety_settings: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn new(role: &str, parts: Vec<Part>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
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

/// Append `part` to the last content when it has the same role and kind,
/// otherwise start a new content.
fn push_part(contents: &mut Vec<Content>, role: &str, part: Part, fold: fn(&Part) -> bool) {
    match contents.last_mut() {
        Some(last) if last.role.as_deref() == Some(role) && last.parts.iter().all(fold) => {
            last.parts.push(part)
        }
        _ => contents.push(Content::new(role, vec![part])),
    }
}

/// Map the transcript onto Gemini contents.
///
/// System messages become the system instruction. Tool calls of one reply
/// fold into one `model` content and their results into one `user` content.
fn convert_transcript(transcript: &[Message]) -> (Option<Content>, Vec<Content>) {
    let mut system: Vec<&str> = Vec::new();
    let mut contents: Vec<Content> = Vec::with_capacity(transcript.len());

    for message in transcript {
        match message {
            Message::System { content } => system.push(content),
            Message::User { content } => contents.push(Content::new("user", vec![Part::text(content)])),
            Message::AssistantText { content } => {
                contents.push(Content::new("model", vec![Part::text(content)]))
            }
            Message::AssistantToolCall(call) => {
                let part = Part {
                    function_call: Some(FunctionCall {
                        name: call.tool_name.clone(),
                        args: call.arguments.clone(),
                    }),
                    ..Part::default()
                };
                push_part(&mut contents, "model", part, |p| p.function_call.is_some());
            }
            Message::ToolResult(result) => {
                let response = match &result.outcome {
                    ToolOutcome::Output(value) => json!({ "output": value }),
                    ToolOutcome::Error(fault) => json!({ "error": fault }),
                };
                let part = Part {
                    function_response: Some(FunctionResponse {
                        name: result.tool_name.clone(),
                        response,
                    }),
                    ..Part::default()
                };
                push_part(&mut contents, "user", part, |p| p.function_response.is_some());
            }
        }
    }

    let instruction = (!system.is_empty()).then(|| Content {
        role: None,
        parts: vec![Part::text(&system.join("\n\n"))],
    });
    (instruction, contents)
}

/// The parameter schema in the OpenAPI subset Gemini accepts. Tools without
/// parameters are declared without a schema.
fn declaration_parameters(spec: &ToolSpec) -> Option<Value> {
    if spec.parameters.is_empty() {
        return None;
    }
    let mut schema = spec.parameters.to_json_schema();
    if let Some(object) = schema.as_object_mut() {
        object.remove("additionalProperties");
    }
    Some(schema)
}

pub(crate) fn build_request(transcript: &[Message], tools: &[ToolSpec]) -> GenerateRequest {
    let (system_instruction, contents) = convert_transcript(transcript);

    let declarations: Vec<FunctionDeclaration> = tools
        .iter()
        .map(|spec| FunctionDeclaration {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: declaration_parameters(spec),
        })
        .collect();

    GenerateRequest {
        contents,
        system_instruction,
        tools: if declarations.is_empty() {
            Vec::new()
        } else {
            vec![GeminiTool {
                function_declarations: declarations,
            }]
        },
        generation_config: json!({
            "temperature": 0,
            "topP": 0.1,
            "topK": 1,
            "maxOutputTokens": 4096
        }),
        safety_settings: SAFETY_CATEGORIES
            .iter()
            .map(|category| json!({ "category": category, "threshold": "BLOCK_ONLY_HIGH" }))
            .collect(),
    }
}

/// Interpret a `generateContent` response body.
///
/// Function calls win over text. A response with neither is a model error
/// naming the block or finish reason when Gemini gave one.
pub(crate) fn parse_response(body: &str) -> EngageResult<ModelReply> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| model_error(format!("failed to parse gemini response: {}", e)))?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(model_error(format!("gemini returned no candidate: {}", reason)));
    };

    let parts = candidate.content.map(|content| content.parts).unwrap_or_default();

    let calls: Vec<ToolCall> = parts
        .iter()
        .filter_map(|part| part.function_call.as_ref())
        .map(|call| {
            let arguments = match &call.args {
                Value::Null => Value::Object(Default::default()),
                args => args.clone(),
            };
            ToolCall::new(generated_call_id(), call.name.clone(), arguments)
        })
        .collect();
    if !calls.is_empty() {
        return Ok(ModelReply::ToolCalls(calls));
    }

    let text: String = parts.iter().filter_map(|part| part.text.as_deref()).collect();
    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "empty content".to_string());
        return Err(model_error(format!("gemini reply had no text or function call: {}", reason)));
    }
    Ok(ModelReply::Text(text))
}

// ── ModelClient impl ──────────────────────────────────────────────────────────

#[async_trait]
impl ModelClient for GeminiClient {
    async fn submit(&self, transcript: &[Message], tools: &[ToolSpec]) -> EngageResult<ModelReply> {
        let request = build_request(transcript, tools);
        let url = self.endpoint();

        debug!(
            model = %self.model,
            contents = request.contents.len(),
            tools = tools.len(),
            "submitting gemini generateContent"
        );

        let builder = self.client.post(&url).json(&request);
        let builder = match &self.auth {
            GeminiAuth::ApiKey(key) => builder.header("x-goog-api-key", key),
            GeminiAuth::Vertex { access_token, .. } => builder.bearer_auth(access_token),
        };

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
            warn!(model = %self.model, status = %status, "gemini request rejected");
            return Err(model_error(format!("gemini returned {}: {}", status, detail)));
        }

        parse_response(&body)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use engage_contracts::{
        error::{EngageError, ToolFault},
        message::{Message, ModelReply},
        tool::{ParamType, ParameterSchema, ToolCall, ToolOutcome, ToolResult, ToolSpec},
    };
    use engage_core::traits::ModelClient;

    use super::{build_request, parse_response, GeminiClient};

    fn transcript() -> Vec<Message> {
        let first = ToolCall::new("call-1", "edr_get_host", json!({ "hostname": "ws-042" }));
        let second = ToolCall::new("call-2", "directory_lookup_user", json!({ "username": "jdoe" }));
        vec![
            Message::system("You are a SOC analyst."),
            Message::user("Triage."),
            Message::AssistantToolCall(first.clone()),
            Message::AssistantToolCall(second.clone()),
            Message::ToolResult(ToolResult::for_call(&first, ToolOutcome::Output(json!({ "os": "linux" })))),
            Message::ToolResult(ToolResult::for_call(
                &second,
                ToolOutcome::Error(ToolFault::Execution {
                    tool: "directory_lookup_user".to_string(),
                    message: "directory unavailable".to_string(),
                }),
            )),
        ]
    }

    #[test]
    fn system_prompt_becomes_the_system_instruction() {
        let body = serde_json::to_value(build_request(&transcript(), &[])).unwrap();

        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are a SOC analyst."
        );
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Triage.");
        assert!(body.get("tools").is_none());
        assert_eq!(body["generationConfig"]["temperature"], 0);
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn batched_calls_and_results_fold_into_one_content_each() {
        let body = serde_json::to_value(build_request(&transcript(), &[])).unwrap();
        let contents = body["contents"].as_array().unwrap();

        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        let calls = contents[1]["parts"].as_array().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0]["functionCall"]["name"], "edr_get_host");
        assert_eq!(calls[0]["functionCall"]["args"], json!({ "hostname": "ws-042" }));

        assert_eq!(contents[2]["role"], "user");
        let results = contents[2]["parts"].as_array().unwrap();
        assert_eq!(results[0]["functionResponse"]["name"], "edr_get_host");
        assert_eq!(results[0]["functionResponse"]["response"]["output"], json!({ "os": "linux" }));
        assert!(results[1]["functionResponse"]["response"]["error"]
            .to_string()
            .contains("directory unavailable"));
    }

    #[test]
    fn tools_are_declared_without_additional_properties() {
        let search = ToolSpec::new("siem_search_detections", "SIEM", "Search detections")
            .parameters(ParameterSchema::new().required("query", ParamType::String, "Search query"));
        let clock = ToolSpec::new("day_of_week", "Utility", "Get the current day of the week.");
        let body = serde_json::to_value(build_request(&[Message::user("go")], &[search, clock])).unwrap();

        let declarations = body["tools"][0]["functionDeclarations"].as_array().unwrap();
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[0]["name"], "siem_search_detections");
        assert_eq!(declarations[0]["parameters"]["required"], json!(["query"]));
        assert!(declarations[0]["parameters"].get("additionalProperties").is_none());
        assert!(declarations[1].get("parameters").is_none());
    }

    #[test]
    fn text_reply_is_parsed() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"All "},{"text":"clear."}]},"finishReason":"STOP"}]}"#;
        assert_eq!(parse_response(body).unwrap(), ModelReply::Text("All clear.".to_string()));
    }

    #[test]
    fn function_calls_get_generated_ids() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[
            {"functionCall":{"name":"edr_get_host","args":{"hostname":"ws-042"}}},
            {"functionCall":{"name":"day_of_week"}}
        ]}}]}"#;

        match parse_response(body).unwrap() {
            ModelReply::ToolCalls(calls) => {
                assert_eq!(calls.len(), 2);
                assert_eq!(calls[0].tool_name, "edr_get_host");
                assert_eq!(calls[0].arguments, json!({ "hostname": "ws-042" }));
                assert_eq!(calls[1].arguments, json!({}));
                assert!(calls[0].call_id.0.starts_with("call-"));
                assert_ne!(calls[0].call_id, calls[1].call_id);
            }
            other => panic!("expected ToolCalls, got {:?}", other),
        }
    }

    #[test]
    fn blocked_and_empty_responses_are_model_errors() {
        match parse_response(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#) {
            Err(EngageError::Model { reason }) => assert!(reason.contains("SAFETY")),
            other => panic!("expected Model error, got {:?}", other),
        }
        match parse_response(r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#) {
            Err(EngageError::Model { reason }) => assert!(reason.contains("MAX_TOKENS")),
            other => panic!("expected Model error, got {:?}", other),
        }
        assert!(matches!(parse_response("not json"), Err(EngageError::Model { .. })));
    }

    #[test]
    fn endpoints_follow_the_auth_mode() {
        let keyed = GeminiClient::with_api_key("k", "gemini-2.0-flash");
        assert_eq!(
            keyed.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(keyed.name(), "gemini");

        let vertex = GeminiClient::vertex("soc-project", "europe-west1", "token", "gemini-1.5-pro");
        assert_eq!(
            vertex.endpoint(),
            "https://europe-west1-aiplatform.googleapis.com/v1/projects/soc-project/locations/europe-west1/publishers/google/models/gemini-1.5-pro:generateContent"
        );

        let proxied = GeminiClient::with_api_key("k", "m").with_base_url("http://proxy.internal/v1beta/");
        assert_eq!(proxied.endpoint(), "http://proxy.internal/v1beta/models/m:generateContent");
    }
}
