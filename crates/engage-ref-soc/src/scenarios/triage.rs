//! Scenario: multi-turn triage of a high-severity detection.
//!
//! Walk-through with the scripted model:
//!   1. SIEM search for HIGH detections in the last 24 hours
//!   2. Host context, directory entry and SSO sessions, dispatched as one batch
//!   3. Ticket creation with the gathered evidence
//!   4. Closing summary, which completes the run

use std::sync::Arc;

use serde_json::json;

use engage_contracts::{
    error::EngageResult,
    message::{Message, ModelReply},
    run::RunResult,
    tool::{ToolCall, ToolOutcome},
};
use engage_core::testing::ScriptedModel;
use engage_environment::Runner;
use engage_playbook::PlaybookLoader;
use engage_transcript::InMemoryTranscriptSink;

use crate::TRIAGE_PLAYBOOK;

use super::soc_resolver;

pub const SUMMARY: &str = "Triage complete. det-1001 is a true positive: encoded PowerShell \
spawned by winword.exe on ws-042 (user jdoe, Finance) with an outbound connection to \
203.0.113.77. Opened one High priority ticket. No containment was taken.";

/// The replies of an analyst working the triage playbook.
pub fn triage_script() -> Vec<ModelReply> {
    vec![
        ModelReply::ToolCalls(vec![ToolCall::new(
            "call-1",
            "siem_search_detections",
            json!({ "hours_back": 24, "severity": "HIGH" }),
        )]),
        ModelReply::ToolCalls(vec![
            ToolCall::new("call-2", "edr_get_host", json!({ "hostname": "ws-042" })),
            ToolCall::new("call-3", "directory_lookup_user", json!({ "username": "jdoe" })),
            ToolCall::new("call-4", "sso_list_sessions", json!({ "username": "jdoe" })),
        ]),
        ModelReply::ToolCalls(vec![ToolCall::new(
            "call-5",
            "ticket_create",
            json!({
                "summary": "Encoded PowerShell on ws-042 (det-1001)",
                "description": "winword.exe spawned powershell.exe -enc; outbound HTTPS to 203.0.113.77. User jdoe (Finance).",
                "priority": "High"
            }),
        )]),
        ModelReply::Text(SUMMARY.to_string()),
    ]
}

/// Run the triage playbook in `environment` with `model`, recording into
/// `sink`.
pub async fn run(
    environment: &str,
    model: Arc<ScriptedModel>,
    sink: Arc<InMemoryTranscriptSink>,
) -> EngageResult<RunResult> {
    let playbook = PlaybookLoader::parse(TRIAGE_PLAYBOOK)?;
    Runner::new(soc_resolver()?, model)
        .with_parallel_tools(true)
        .with_transcript_sink(sink)
        .run(&playbook, environment, 8)
        .await
}

/// Run the scenario and print each tool exchange.
pub async fn run_scenario(environment: &str) -> EngageResult<RunResult> {
    println!("=== Scenario: detection triage ({}) ===", environment);
    println!();

    let sink = Arc::new(InMemoryTranscriptSink::new());
    let model = Arc::new(ScriptedModel::new(triage_script()));
    let result = run(environment, model, sink.clone()).await?;

    for message in &result.transcript {
        match message {
            Message::AssistantToolCall(call) => {
                println!("  -> {} {}", call.tool_name, call.arguments);
            }
            Message::ToolResult(tool_result) => match &tool_result.outcome {
                ToolOutcome::Output(_) => println!("  <- {} ok", tool_result.tool_name),
                ToolOutcome::Error(fault) => println!("  <- {} error: {}", tool_result.tool_name, fault),
            },
            _ => {}
        }
    }

    println!();
    println!(
        "  Status: {}  (turns: {}, dispatch cycles: {})",
        result.status, result.turns, result.dispatch_cycles
    );
    if let Some(text) = &result.final_text {
        println!("  Summary: {}", text);
    }
    let run_id = result.run_id.to_string();
    println!(
        "  Transcript integrity:  {}",
        if sink.verify_integrity(&run_id) { "VERIFIED" } else { "FAILED" }
    );
    println!();

    Ok(result)
}
