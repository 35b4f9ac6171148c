//! The run invocation surface: `run(playbook, environment, max_turns)`.
//!
//! `Runner` ties the resolver to a model and builds a fresh `AgentLoop` per
//! run. Load-time faults are returned as `Err` before any model call; once the
//! loop starts, every outcome is a `RunResult`.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use engage_contracts::{
    error::{EngageError, EngageResult},
    playbook::Playbook,
    run::RunResult,
};
use engage_core::{
    executor::{AgentLoop, RunConfig},
    traits::{ModelClient, TranscriptSink},
};

use crate::resolver::EnvironmentResolver;

pub struct Runner {
    resolver: Arc<EnvironmentResolver>,
    model: Arc<dyn ModelClient>,
    model_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,
    parallel_tools: bool,
    system_prompt: Option<String>,
    sink: Option<Arc<dyn TranscriptSink>>,
    cancel: CancellationToken,
}

impl Runner {
    pub fn new(resolver: Arc<EnvironmentResolver>, model: Arc<dyn ModelClient>) -> Self {
        Self {
            resolver,
            model,
            model_timeout: None,
            tool_timeout: None,
            parallel_tools: false,
            system_prompt: None,
            sink: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = Some(timeout);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn with_parallel_tools(mut self, parallel: bool) -> Self {
        self.parallel_tools = parallel;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_transcript_sink(mut self, sink: Arc<dyn TranscriptSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn resolver(&self) -> &EnvironmentResolver {
        &self.resolver
    }

    /// Run `playbook` in `environment` with a budget of `max_turns` dispatch cycles.
    ///
    /// # Errors
    ///
    /// - `Config` if `max_turns` is zero
    /// - `UnknownEnvironment` if the environment is not declared
    /// - `EnvironmentNotPermitted` if the playbook restricts its environments
    ///   and `environment` is not among them
    pub async fn run(
        &self,
        playbook: &Playbook,
        environment: &str,
        max_turns: u32,
    ) -> EngageResult<RunResult> {
        let mut config = RunConfig::new(max_turns)?.with_parallel_tools(self.parallel_tools);
        if let Some(timeout) = self.model_timeout {
            config = config.with_model_timeout(timeout);
        }
        if let Some(timeout) = self.tool_timeout {
            config = config.with_tool_timeout(timeout);
        }

        let registry = self.resolver.resolve(environment)?;

        if !playbook.permits_environment(environment) {
            warn!(
                environment = %environment,
                title = playbook.title().unwrap_or(""),
                "playbook does not permit this environment"
            );
            return Err(EngageError::EnvironmentNotPermitted {
                environment: environment.to_string(),
            });
        }

        let mut agent = AgentLoop::new(self.model.clone(), registry, config)
            .with_cancellation(self.cancel.clone());
        if let Some(prompt) = &self.system_prompt {
            agent = agent.with_system_prompt(prompt.clone());
        }
        if let Some(description) = self.resolver.description(environment) {
            agent = agent.with_environment_description(description);
        }
        if let Some(sink) = &self.sink {
            agent = agent.with_transcript_sink(sink.clone());
        }

        info!(
            environment = %environment,
            title = playbook.title().unwrap_or(""),
            max_turns,
            "dispatching playbook"
        );
        Ok(agent.run(playbook).await)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use engage_contracts::{
        error::EngageError,
        message::{Message, ModelReply},
        playbook::Playbook,
        run::RunStatus,
        tool::{ToolCall, ToolSpec},
    };
    use engage_core::testing::{ScriptedModel, StaticHandler};

    use crate::{
        catalog::{Integration, IntegrationCatalog},
        config::EnvironmentConfig,
        resolver::EnvironmentResolver,
    };

    use super::Runner;

    fn resolver() -> Arc<EnvironmentResolver> {
        let catalog = IntegrationCatalog::builder()
            .add(
                Integration::new(ToolSpec::new("siem_search_detections", "SIEM", "Search detections"))
                    .bind("test", Arc::new(StaticHandler::new(json!({ "detections": [] })))),
            )
            .build()
            .unwrap();
        let config = EnvironmentConfig::from_toml_str(
            r#"
            [[environments]]
            name = "test"
            description = "Stub integrations."

            [[environments]]
            name = "production"
            "#,
        )
        .unwrap();
        Arc::new(EnvironmentResolver::new(Arc::new(catalog), config))
    }

    #[tokio::test]
    async fn runs_playbook_in_environment() {
        let model = Arc::new(ScriptedModel::new([
            ModelReply::ToolCalls(vec![ToolCall::new("c1", "siem_search_detections", json!({}))]),
            ModelReply::Text("no new detections".to_string()),
        ]));
        let runner = Runner::new(resolver(), model.clone());

        let result = runner
            .run(&Playbook::from_mission("check detections"), "test", 4)
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.dispatch_cycles, 1);
        match &result.transcript[0] {
            Message::System { content } => assert!(content.contains("Stub integrations.")),
            other => panic!("expected System, got {:?}", other),
        }
        assert_eq!(model.submissions()[0].tool_names, vec!["siem_search_detections"]);
    }

    #[tokio::test]
    async fn load_time_faults_are_errors() {
        let runner = Runner::new(resolver(), Arc::new(ScriptedModel::text("unused")));
        let playbook = Playbook::from_mission("x");

        assert!(matches!(
            runner.run(&playbook, "staging", 3).await,
            Err(EngageError::UnknownEnvironment { .. })
        ));
        assert!(matches!(
            runner.run(&playbook, "test", 0).await,
            Err(EngageError::Config { .. })
        ));

        let mut restricted = Playbook::from_mission("x");
        restricted.environments = Some(["test".to_string()].into());
        assert!(matches!(
            runner.run(&restricted, "production", 3).await,
            Err(EngageError::EnvironmentNotPermitted { .. })
        ));
    }
}
