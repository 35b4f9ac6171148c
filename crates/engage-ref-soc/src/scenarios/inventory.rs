//! Scenario: environment inventory.
//!
//! The playbook asks the agent to list the environment and the tools available
//! to it. `InventoryModel` answers on its first turn by rendering the tool
//! specs it was handed, so the final text is exactly what the environment
//! exposes.

use std::sync::Arc;

use async_trait::async_trait;

use engage_contracts::{
    error::EngageResult,
    message::{Message, ModelReply},
    run::RunResult,
    tool::ToolSpec,
};
use engage_core::{render_inventory, traits::ModelClient};
use engage_environment::Runner;
use engage_playbook::PlaybookLoader;
use engage_transcript::InMemoryTranscriptSink;

use crate::INVENTORY_PLAYBOOK;

use super::soc_resolver;

/// A model that answers every submission with the inventory of the tools it
/// received.
pub struct InventoryModel;

/// The environment named in the system message, if any.
fn environment_of(transcript: &[Message]) -> Option<&str> {
    transcript.iter().find_map(|message| match message {
        Message::System { content } => content
            .lines()
            .find_map(|line| line.strip_prefix("Environment: ")),
        _ => None,
    })
}

#[async_trait]
impl ModelClient for InventoryModel {
    async fn submit(&self, transcript: &[Message], tools: &[ToolSpec]) -> EngageResult<ModelReply> {
        let environment = environment_of(transcript).unwrap_or("unknown");
        Ok(ModelReply::Text(render_inventory(environment, tools)))
    }

    fn name(&self) -> &str {
        "inventory"
    }
}

/// Run the inventory playbook in `environment`, recording into `sink`.
pub async fn run(environment: &str, sink: Arc<InMemoryTranscriptSink>) -> EngageResult<RunResult> {
    let playbook = PlaybookLoader::parse(INVENTORY_PLAYBOOK)?;
    Runner::new(soc_resolver()?, Arc::new(InventoryModel))
        .with_transcript_sink(sink)
        .run(&playbook, environment, 3)
        .await
}

/// Run the scenario and print the inventory.
pub async fn run_scenario(environment: &str) -> EngageResult<RunResult> {
    println!("=== Scenario: environment inventory ({}) ===", environment);
    println!();

    let sink = Arc::new(InMemoryTranscriptSink::new());
    let result = run(environment, sink.clone()).await?;

    println!("  Status: {}  (turns: {})", result.status, result.turns);
    if let Some(text) = &result.final_text {
        println!();
        for line in text.lines() {
            println!("  {}", line);
        }
    }

    let run_id = result.run_id.to_string();
    println!();
    println!(
        "  Transcript integrity:  {}",
        if sink.verify_integrity(&run_id) { "VERIFIED" } else { "FAILED" }
    );
    println!();

    Ok(result)
}
