//! Scenario: ask the agent what day it is.
//!
//! `WeekdayModel` calls `day_of_week` on its first turn and answers from the
//! tool result on the next, so the answer always reflects the local clock.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use engage_contracts::{
    error::{EngageError, EngageResult},
    message::{Message, ModelReply},
    run::RunResult,
    tool::{ToolCall, ToolOutcome, ToolSpec},
};
use engage_core::traits::ModelClient;
use engage_environment::Runner;
use engage_playbook::PlaybookLoader;
use engage_transcript::InMemoryTranscriptSink;

use crate::WEEKDAY_PLAYBOOK;

use super::soc_resolver;

pub const ANSWER_PREFIX: &str = "The current day of the week is ";

/// A model that looks the weekday up and reports it.
pub struct WeekdayModel;

#[async_trait]
impl ModelClient for WeekdayModel {
    async fn submit(&self, transcript: &[Message], _tools: &[ToolSpec]) -> EngageResult<ModelReply> {
        let last_result = transcript.iter().rev().find_map(|message| match message {
            Message::ToolResult(result) if result.tool_name == "day_of_week" => Some(&result.outcome),
            _ => None,
        });

        match last_result {
            None => Ok(ModelReply::ToolCalls(vec![ToolCall::new(
                "call-1",
                "day_of_week",
                json!({}),
            )])),
            Some(ToolOutcome::Output(output)) => {
                let day = output["day_of_week"].as_str().unwrap_or("unknown");
                Ok(ModelReply::Text(format!("{}{}.", ANSWER_PREFIX, day)))
            }
            Some(ToolOutcome::Error(fault)) => Err(EngageError::Model {
                reason: format!("day_of_week failed: {}", fault),
            }),
        }
    }

    fn name(&self) -> &str {
        "weekday"
    }
}

/// Run the weekday playbook in `environment`, recording into `sink`.
pub async fn run(environment: &str, sink: Arc<InMemoryTranscriptSink>) -> EngageResult<RunResult> {
    let playbook = PlaybookLoader::parse(WEEKDAY_PLAYBOOK)?;
    Runner::new(soc_resolver()?, Arc::new(WeekdayModel))
        .with_transcript_sink(sink)
        .run(&playbook, environment, 3)
        .await
}

/// Run the scenario and print the answer.
pub async fn run_scenario(environment: &str) -> EngageResult<RunResult> {
    println!("=== Scenario: day of the week ({}) ===", environment);
    println!();

    let sink = Arc::new(InMemoryTranscriptSink::new());
    let result = run(environment, sink.clone()).await?;

    println!("  Status: {}  (turns: {})", result.status, result.turns);
    if let Some(text) = &result.final_text {
        println!("  Answer: {}", text);
    }
    let run_id = result.run_id.to_string();
    println!(
        "  Transcript integrity:  {}",
        if sink.verify_integrity(&run_id) { "VERIFIED" } else { "FAILED" }
    );
    println!();

    Ok(result)
}
