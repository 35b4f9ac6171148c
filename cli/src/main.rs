//! Engage: run markdown playbooks against an environment's tools.
//!
//! Usage:
//!   engage run --environment test --playbook crates/engage-ref-soc/playbooks/triage.md
//!   engage tools --environment production
//!   engage check crates/engage-ref-soc/playbooks/triage.md
//!   engage demo weekday
//!
//! `--environment` defaults to `development`. With the bundled declarations
//! the accepted names are `development`, `test` and `production`.
//!
//! Exit codes: 0 completed, 1 failed or error, 2 turn budget exhausted.

mod config;

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engage_contracts::{
    error::{EngageError, EngageResult},
    playbook::Playbook,
    run::{RunResult, RunStatus},
};
use engage_core::{render_inventory, traits::TranscriptSink};
use engage_environment::{EnvironmentConfig, EnvironmentResolver, Runner};
use engage_playbook::PlaybookLoader;
use engage_ref_soc::{
    integrations::{catalog_with_live, default_validator},
    scenarios::{inventory, triage, weekday},
    DEFAULT_ENVIRONMENTS,
};
use engage_transcript::{InMemoryTranscriptSink, JsonlTranscriptSink};

use crate::config::{build_model, CliConfig};

const DEFAULT_ENVIRONMENT: &str = "development";

// ── CLI definition ────────────────────────────────────────────────────────────

/// Engage: playbook-driven SOC agent runtime.
#[derive(Parser)]
#[command(name = "engage", version, about = "Run SOC playbooks with an LLM agent")]
struct Cli {
    /// Path to engage.toml. Defaults are used when the file does not exist.
    #[arg(long, global = true, default_value = "engage.toml")]
    config: PathBuf,

    /// Environment declarations. The bundled development/test/production set
    /// is used when omitted.
    #[arg(long, global = true)]
    environments: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a playbook in an environment.
    Run {
        #[arg(long, short = 'e', default_value = DEFAULT_ENVIRONMENT)]
        environment: String,

        #[arg(long, short = 'p')]
        playbook: PathBuf,

        /// Dispatch-cycle budget. Overrides `[run] max_turns`.
        #[arg(long)]
        max_turns: Option<u32>,

        /// Append the hash-chained transcript to this JSONL file.
        #[arg(long)]
        transcript_out: Option<PathBuf>,
    },
    /// List the tools available in an environment.
    Tools {
        #[arg(long, short = 'e', default_value = DEFAULT_ENVIRONMENT)]
        environment: String,
    },
    /// Parse a playbook and print its directives.
    Check { playbook: PathBuf },
    /// Run a bundled scenario with a deterministic model.
    Demo {
        scenario: Scenario,

        #[arg(long, short = 'e', default_value = DEFAULT_ENVIRONMENT)]
        environment: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Scenario {
    Inventory,
    Triage,
    Weekday,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("engage: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> EngageResult<ExitCode> {
    match cli.command {
        Command::Run {
            environment,
            playbook,
            max_turns,
            transcript_out,
        } => {
            let config = CliConfig::load_for(&cli.config, &environment)?;
            let playbook = load_playbook(&playbook)?;
            let resolver = build_resolver(cli.environments.as_deref(), &config)?;
            let result = run_playbook(
                &config,
                resolver,
                &playbook,
                &environment,
                max_turns.unwrap_or(config.run.max_turns),
                transcript_out.as_deref(),
            )
            .await?;
            Ok(report(&result))
        }
        Command::Tools { environment } => {
            let config = CliConfig::load_for(&cli.config, &environment)?;
            let resolver = build_resolver(cli.environments.as_deref(), &config)?;
            let registry = resolver.resolve(&environment)?;
            print!("{}", render_inventory(&environment, registry.describe()));
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { playbook } => {
            print_directives(&load_playbook(&playbook)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Demo {
            scenario,
            environment,
        } => {
            let result = match scenario {
                Scenario::Inventory => inventory::run_scenario(&environment).await?,
                Scenario::Triage => triage::run_scenario(&environment).await?,
                Scenario::Weekday => weekday::run_scenario(&environment).await?,
            };
            Ok(exit_code(result.status))
        }
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

fn load_playbook(path: &Path) -> EngageResult<Playbook> {
    if !path.is_file() {
        return Err(EngageError::Io {
            reason: format!("playbook not found: {}", path.display()),
        });
    }
    PlaybookLoader::from_file(path)
}

fn build_resolver(
    environments: Option<&Path>,
    config: &CliConfig,
) -> EngageResult<Arc<EnvironmentResolver>> {
    let declarations = match environments {
        Some(path) => EnvironmentConfig::from_file(path)?,
        None => EnvironmentConfig::from_toml_str(DEFAULT_ENVIRONMENTS)?,
    };
    let catalog = catalog_with_live(&config.live)?;
    Ok(Arc::new(
        EnvironmentResolver::new(Arc::new(catalog), declarations)
            .with_validator(Arc::new(default_validator())),
    ))
}

async fn run_playbook(
    config: &CliConfig,
    resolver: Arc<EnvironmentResolver>,
    playbook: &Playbook,
    environment: &str,
    max_turns: u32,
    transcript_out: Option<&Path>,
) -> EngageResult<RunResult> {
    let model = build_model(&config.model)?;
    let sink: Arc<dyn TranscriptSink> = match transcript_out {
        Some(path) => Arc::new(JsonlTranscriptSink::open(path)?),
        None => Arc::new(InMemoryTranscriptSink::new()),
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let mut runner = Runner::new(resolver, model)
        .with_parallel_tools(config.run.parallel_tools)
        .with_transcript_sink(sink)
        .with_cancellation(cancel);
    if let Some(timeout) = config.run.model_timeout() {
        runner = runner.with_model_timeout(timeout);
    }
    if let Some(timeout) = config.run.tool_timeout() {
        runner = runner.with_tool_timeout(timeout);
    }

    info!(
        environment = %environment,
        provider = ?config.model.provider,
        max_turns,
        "starting run"
    );
    runner.run(playbook, environment, max_turns).await
}

// ── Output ────────────────────────────────────────────────────────────────────

fn exit_code(status: RunStatus) -> ExitCode {
    match status {
        RunStatus::Completed => ExitCode::SUCCESS,
        RunStatus::Failed => ExitCode::FAILURE,
        RunStatus::MaxTurnsExceeded => ExitCode::from(2),
    }
}

fn report(result: &RunResult) -> ExitCode {
    if let Some(text) = &result.final_text {
        println!("{}", text.trim_end());
        println!();
    }
    if let Some(failure) = &result.failure {
        eprintln!("run failed: {}", failure);
    }
    eprintln!(
        "run {} {} after {} turn(s), {} dispatch cycle(s)",
        result.run_id, result.status, result.turns, result.dispatch_cycles
    );
    exit_code(result.status)
}

fn print_directives(playbook: &Playbook) {
    let list = |names: &Option<std::collections::BTreeSet<String>>| match names {
        Some(names) => names.iter().cloned().collect::<Vec<_>>().join(", "),
        None => "(any)".to_string(),
    };

    println!("title:             {}", playbook.title().unwrap_or("(none)"));
    println!("allowed_tools:     {}", list(&playbook.allowed_tools));
    println!("environments:      {}", list(&playbook.environments));
    println!("allow_destructive: {}", playbook.allow_destructive);
    for (key, value) in &playbook.metadata {
        if key != "title" {
            println!("{:<18} {}", format!("{}:", key), value);
        }
    }
    println!("mission:           {} line(s)", playbook.mission.lines().count());
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::Parser;

    use engage_contracts::error::EngageError;

    use super::{build_resolver, Cli, Command};
    use crate::config::CliConfig;

    #[test]
    fn environment_defaults_to_development() {
        let cli = Cli::try_parse_from(["engage", "tools"]).unwrap();
        match cli.command {
            Command::Tools { environment } => assert_eq!(environment, "development"),
            _ => panic!("expected tools"),
        }

        let cli = Cli::try_parse_from(["engage", "run", "-p", "triage.md"]).unwrap();
        match cli.command {
            Command::Run { environment, .. } => assert_eq!(environment, "development"),
            _ => panic!("expected run"),
        }

        let cli = Cli::try_parse_from(["engage", "demo", "weekday", "-e", "test"]).unwrap();
        match cli.command {
            Command::Demo { environment, .. } => assert_eq!(environment, "test"),
            _ => panic!("expected demo"),
        }
    }

    #[test]
    fn bundled_declarations_accept_only_the_three_environments() {
        let resolver = build_resolver(None, &CliConfig::default()).unwrap();
        for name in ["development", "test", "production"] {
            assert!(resolver.resolve(name).is_ok(), "{} rejected", name);
        }
        match resolver.resolve("staging") {
            Err(EngageError::UnknownEnvironment { name }) => assert_eq!(name, "staging"),
            other => panic!("expected UnknownEnvironment, got {:?}", other),
        }
        let missing = Path::new("/nonexistent/environments.toml");
        assert!(build_resolver(Some(missing), &CliConfig::default()).is_err());
    }
}
