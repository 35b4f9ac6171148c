//! # engage-contracts
//!
//! Shared types, schemas, and error taxonomy for the Engage agent runtime.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate: only data definitions and error types.

pub mod error;
pub mod message;
pub mod playbook;
pub mod run;
pub mod tool;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use error::{EngageError, ToolFault};
    use message::{Message, ModelReply};
    use playbook::Playbook;
    use run::{RunFailure, RunId, RunStage, RunStatus};
    use tool::{ParamType, ParameterSchema, ToolCall, ToolOutcome, ToolResult, ToolSpec};

    // ── ParameterSchema ──────────────────────────────────────────────────────

    #[test]
    fn parameter_schema_renders_required_and_properties() {
        let schema = ParameterSchema::new()
            .required("host", ParamType::String, "Hostname to inspect")
            .optional("hours_back", ParamType::Integer, "Lookback window");

        let doc = schema.to_json_schema();

        assert_eq!(doc["type"], "object");
        assert_eq!(doc["properties"]["host"]["type"], "string");
        assert_eq!(doc["properties"]["hours_back"]["type"], "integer");
        assert_eq!(doc["required"], json!(["host"]));
        assert_eq!(doc["additionalProperties"], false);
    }

    #[test]
    fn parameter_schema_preserves_declaration_order() {
        let schema = ParameterSchema::new()
            .optional("zeta", ParamType::String, "")
            .optional("alpha", ParamType::String, "");

        let names: Vec<&str> = schema.params().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn array_parameters_are_string_lists() {
        let doc = ParameterSchema::new()
            .optional("labels", ParamType::Array, "Labels to add")
            .to_json_schema();
        assert_eq!(doc["properties"]["labels"]["type"], "array");
        assert_eq!(doc["properties"]["labels"]["items"], json!({ "type": "string" }));
    }

    #[test]
    fn empty_parameter_schema_requires_nothing() {
        let doc = ParameterSchema::new().to_json_schema();
        assert_eq!(doc["required"], json!([]));
    }

    // ── ToolSpec builder ─────────────────────────────────────────────────────

    #[test]
    fn tool_spec_builder_sets_flags() {
        let spec = ToolSpec::new("edr_quarantine_host", "EDR", "Isolate a host")
            .capability("Network-isolate an endpoint")
            .destructive();

        assert!(spec.destructive);
        assert_eq!(spec.capabilities, vec!["Network-isolate an endpoint"]);
        assert!(spec.parameters.is_empty());
    }

    // ── Playbook permissions ─────────────────────────────────────────────────

    #[test]
    fn playbook_without_allow_list_permits_everything() {
        let playbook = Playbook::from_mission("do things");
        assert!(playbook.permits_tool("anything"));
        assert!(playbook.permits_environment("production"));
    }

    #[test]
    fn playbook_allow_list_restricts_tools() {
        let mut playbook = Playbook::from_mission("do things");
        playbook.allowed_tools = Some(["siem_search_detections".to_string()].into());

        assert!(playbook.permits_tool("siem_search_detections"));
        assert!(!playbook.permits_tool("edr_quarantine_host"));
    }

    // ── Serde shapes ─────────────────────────────────────────────────────────

    #[test]
    fn message_serializes_with_role_tag() {
        let msg = Message::user("hello");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"], "hello");
    }

    #[test]
    fn tool_result_error_round_trips() {
        let call = ToolCall::new("call-1", "siem_search_detections", json!({}));
        let original = Message::ToolResult(ToolResult::for_call(
            &call,
            ToolOutcome::Error(ToolFault::UnknownTool {
                name: "siem_search_detections".to_string(),
            }),
        ));
        let json = serde_json::to_string(&original).unwrap();
        let decoded: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn model_reply_tool_calls_round_trips() {
        let original = ModelReply::ToolCalls(vec![ToolCall::new(
            "c1",
            "ticketing_create_ticket",
            json!({ "title": "x" }),
        )]);
        let json = serde_json::to_string(&original).unwrap();
        let decoded: ModelReply = serde_json::from_str(&json).unwrap();
        assert_eq!(original, decoded);
    }

    // ── RunId ────────────────────────────────────────────────────────────────

    #[test]
    fn run_id_new_produces_unique_values() {
        let unique: std::collections::HashSet<String> =
            (0..100).map(|_| RunId::new().to_string()).collect();
        assert_eq!(unique.len(), 100);
    }

    #[test]
    fn run_status_display_is_snake_case() {
        assert_eq!(RunStatus::MaxTurnsExceeded.to_string(), "max_turns_exceeded");
    }

    // ── Display messages ─────────────────────────────────────────────────────

    #[test]
    fn error_unknown_environment_display() {
        let err = EngageError::UnknownEnvironment {
            name: "staging".to_string(),
        };
        assert!(err.to_string().contains("staging"));
    }

    #[test]
    fn error_dangling_call_display() {
        let err = EngageError::DanglingCall {
            call_id: "call-9".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("call-9"));
        assert!(msg.contains("no outstanding tool call"));
    }

    #[test]
    fn tool_fault_invalid_arguments_display() {
        let fault = ToolFault::InvalidArguments {
            tool: "edr_get_host".to_string(),
            reason: "missing 'hostname'".to_string(),
        };
        let msg = fault.to_string();
        assert!(msg.contains("edr_get_host"));
        assert!(msg.contains("hostname"));
    }

    #[test]
    fn run_failure_cancelled_display_names_stage() {
        let failure = RunFailure::Cancelled {
            stage: RunStage::ToolDispatch,
        };
        assert_eq!(failure.to_string(), "run cancelled during tool dispatch");
    }
}
