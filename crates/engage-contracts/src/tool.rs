//! Tool description, call, and result types.
//!
//! A `ToolSpec` is everything the model is told about a tool. It is the data
//! half of a registry descriptor; the handler half lives in `engage-core`
//! because it is behavior, not data.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ToolFault;

/// The JSON type a single tool parameter must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    /// A list of strings.
    Array,
    Object,
}

impl ParamType {
    /// The JSON Schema `type` keyword for this parameter type.
    pub fn as_json_type(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_json_type())
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub description: String,
}

/// The ordered parameter list of a tool.
///
/// Order is preserved so the inventory and the rendered JSON Schema list
/// parameters the way the tool author declared them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    params: Vec<ParameterSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a required parameter.
    pub fn required(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.params.push(ParameterSpec {
            name: name.into(),
            param_type,
            required: true,
            description: description.into(),
        });
        self
    }

    /// Append an optional parameter.
    pub fn optional(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.params.push(ParameterSpec {
            name: name.into(),
            param_type,
            required: false,
            description: description.into(),
        });
        self
    }

    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Render as a JSON Schema object document.
    ///
    /// Undeclared properties are rejected (`additionalProperties: false`).
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.params {
            let mut property = json!({
                "type": param.param_type.as_json_type(),
                "description": param.description,
            });
            if param.param_type == ParamType::Array {
                property["items"] = json!({ "type": "string" });
            }
            properties.insert(param.name.clone(), property);
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

/// The model-visible description of one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique within one registry (e.g. "siem_search_detections").
    pub name: String,
    /// Natural-language description shown to the model.
    pub description: String,
    /// Integration family used to group the inventory (e.g. "SIEM", "EDR").
    pub category: String,
    /// Short capability summaries, one per line in the inventory.
    pub capabilities: Vec<String>,
    pub parameters: ParameterSchema,
    /// True for side-effecting containment actions (quarantine, revocation).
    #[serde(default)]
    pub destructive: bool,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category: category.into(),
            capabilities: Vec::new(),
            parameters: ParameterSchema::new(),
            destructive: false,
        }
    }

    pub fn capability(mut self, summary: impl Into<String>) -> Self {
        self.capabilities.push(summary.into());
        self
    }

    pub fn parameters(mut self, parameters: ParameterSchema) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn destructive(mut self) -> Self {
        self.destructive = true;
        self
    }
}

/// Identifier correlating a tool call with its result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: CallId,
    pub tool_name: String,
    /// Untrusted, model-produced arguments. Validated at the registry boundary.
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(call_id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            call_id: CallId::new(call_id),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Either the handler's output or the fault that replaced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Output(Value),
    Error(ToolFault),
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutcome::Error(_))
    }
}

impl From<Result<Value, ToolFault>> for ToolOutcome {
    fn from(result: Result<Value, ToolFault>) -> Self {
        match result {
            Ok(value) => ToolOutcome::Output(value),
            Err(fault) => ToolOutcome::Error(fault),
        }
    }
}

/// The answer to one `ToolCall`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: CallId,
    pub tool_name: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn for_call(call: &ToolCall, outcome: ToolOutcome) -> Self {
        Self {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            outcome,
        }
    }
}
