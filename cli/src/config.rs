//! `engage.toml`: model provider, run limits and live bindings.
//!
//! ```toml
//! [model]
//! provider = "gemini"          # "scripted" | "openai" | "ollama" | "gemini"
//! model_name = "gemini-2.0-flash"
//! api_key_env = "GEMINI_API_KEY"
//! # Gemini through Vertex AI instead of an API key:
//! # vertex_project = "soc-prod"
//! # vertex_location = "us-central1"
//! # access_token_env = "GOOGLE_OAUTH_ACCESS_TOKEN"
//!
//! [run]
//! max_turns = 10
//! model_timeout_secs = 60
//! tool_timeout_secs = 30
//! parallel_tools = true
//!
//! [[live]]
//! tool = "ticket_create"
//! url = "https://tickets.example.com/api/engage/ticket"
//! token_env = "ENGAGE_TICKETS_TOKEN"
//! ```
//!
//! Every section is optional. A missing file means all defaults.
//!
//! A sibling `engage.<environment>.toml` is merged over the base file when
//! the run targets that environment. Tables merge key by key; any other
//! value, including the `[[live]]` array, replaces the base value.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Deserialize;
use tracing::debug;

use engage_contracts::error::{EngageError, EngageResult};
use engage_core::traits::ModelClient;
use engage_providers::{gemini::DEFAULT_VERTEX_LOCATION, GeminiClient, OpenAiChatClient};
use engage_ref_soc::{live::LiveBinding, scenarios::inventory::InventoryModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Offline responder that answers with the tool inventory.
    #[default]
    Scripted,
    Openai,
    Ollama,
    Gemini,
}

impl Provider {
    fn default_model(self) -> &'static str {
        match self {
            Provider::Scripted => "inventory",
            Provider::Openai => "gpt-4o-mini",
            Provider::Ollama => "llama3.1",
            Provider::Gemini => "gemini-2.0-flash",
        }
    }

    fn default_api_key_env(self) -> Option<&'static str> {
        match self {
            Provider::Openai => Some("OPENAI_API_KEY"),
            Provider::Gemini => Some("GEMINI_API_KEY"),
            Provider::Scripted | Provider::Ollama => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub provider: Provider,
    /// Defaults per provider when omitted.
    pub model_name: Option<String>,
    /// Overrides the provider's default endpoint.
    pub base_url: Option<String>,
    /// Variable holding the API key. Defaults to `OPENAI_API_KEY` or
    /// `GEMINI_API_KEY`.
    pub api_key_env: Option<String>,
    /// Routes `gemini` through Vertex AI in this project.
    pub vertex_project: Option<String>,
    pub vertex_location: Option<String>,
    /// Variable holding the Vertex AI OAuth access token.
    pub access_token_env: Option<String>,
}

impl ModelSection {
    pub fn model_name(&self) -> &str {
        self.model_name
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    fn api_key_env(&self) -> Option<&str> {
        self.api_key_env
            .as_deref()
            .or_else(|| self.provider.default_api_key_env())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub max_turns: u32,
    pub model_timeout_secs: Option<u64>,
    pub tool_timeout_secs: Option<u64>,
    pub parallel_tools: bool,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            max_turns: 10,
            model_timeout_secs: None,
            tool_timeout_secs: None,
            parallel_tools: false,
        }
    }
}

impl RunSection {
    pub fn model_timeout(&self) -> Option<Duration> {
        self.model_timeout_secs.map(Duration::from_secs)
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub model: ModelSection,
    pub run: RunSection,
    pub live: Vec<LiveBinding>,
}

fn parse_error(e: impl std::fmt::Display) -> EngageError {
    EngageError::Config {
        reason: format!("failed to parse engage config: {}", e),
    }
}

/// Read `path` as a TOML table, or `None` when it does not exist.
fn read_table(path: &Path) -> EngageResult<Option<toml::Table>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| EngageError::Io {
        reason: format!("failed to read '{}': {}", path.display(), e),
    })?;
    text.parse::<toml::Table>().map(Some).map_err(parse_error)
}

/// Merge `overlay` into `base`. Nested tables merge; everything else replaces.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_tables(existing, incoming),
                _ => {
                    base.insert(key, toml::Value::Table(incoming));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// `engage.toml` with `environment` becomes `engage.<environment>.toml`.
pub fn overlay_path(path: &Path, environment: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "engage".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{}.{}.{}", stem, environment, ext.to_string_lossy()),
        None => format!("{}.{}", stem, environment),
    };
    path.with_file_name(name)
}

impl CliConfig {
    pub fn from_toml_str(s: &str) -> EngageResult<Self> {
        toml::from_str(s).map_err(parse_error)
    }

    fn from_table(table: toml::Table) -> EngageResult<Self> {
        toml::Value::Table(table).try_into().map_err(parse_error)
    }

    /// Load `path`, or the defaults when it does not exist.
    pub fn load(path: &Path) -> EngageResult<Self> {
        match read_table(path)? {
            Some(table) => Self::from_table(table),
            None => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load `path` with the `environment` overlay merged over it. Either file
    /// may be missing.
    pub fn load_for(path: &Path, environment: &str) -> EngageResult<Self> {
        let overlay = overlay_path(path, environment);
        let mut table = read_table(path)?.unwrap_or_default();
        if let Some(extra) = read_table(&overlay)? {
            debug!(path = %overlay.display(), environment = %environment, "merging environment overlay");
            merge_tables(&mut table, extra);
        }
        Self::from_table(table)
    }
}

fn required_var(var: &str, provider: &str) -> EngageResult<String> {
    std::env::var(var).map_err(|_| EngageError::Config {
        reason: format!("provider '{}' needs environment variable {}", provider, var),
    })
}

/// Construct the configured model client.
///
/// # Errors
///
/// `EngageError::Config` when `openai` or `gemini` is selected and the
/// credential variable it needs is unset.
pub fn build_model(section: &ModelSection) -> EngageResult<Arc<dyn ModelClient>> {
    let model_name = section.model_name();
    match section.provider {
        Provider::Scripted => Ok(Arc::new(InventoryModel)),
        Provider::Openai => {
            let key = required_var(section.api_key_env().unwrap_or("OPENAI_API_KEY"), "openai")?;
            let client = match &section.base_url {
                Some(base_url) => OpenAiChatClient::new(model_name, base_url).with_api_key(key),
                None => OpenAiChatClient::openai(key, model_name),
            };
            Ok(Arc::new(client))
        }
        Provider::Ollama => {
            let client = match &section.base_url {
                Some(base_url) => OpenAiChatClient::new(model_name, base_url).with_label("ollama"),
                None => OpenAiChatClient::ollama(model_name),
            };
            Ok(Arc::new(client))
        }
        Provider::Gemini => {
            let client = match &section.vertex_project {
                Some(project) => {
                    let token_env = section
                        .access_token_env
                        .as_deref()
                        .unwrap_or("GOOGLE_OAUTH_ACCESS_TOKEN");
                    let token = required_var(token_env, "gemini")?;
                    let location = section
                        .vertex_location
                        .as_deref()
                        .unwrap_or(DEFAULT_VERTEX_LOCATION);
                    GeminiClient::vertex(project, location, token, model_name)
                }
                None => {
                    let key = required_var(section.api_key_env().unwrap_or("GEMINI_API_KEY"), "gemini")?;
                    GeminiClient::with_api_key(key, model_name)
                }
            };
            let client = match &section.base_url {
                Some(base_url) => client.with_base_url(base_url),
                None => client,
            };
            Ok(Arc::new(client))
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use engage_contracts::error::EngageError;

    use super::{build_model, overlay_path, CliConfig, ModelSection, Provider};

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CliConfig::load(&dir.path().join("engage.toml")).unwrap();

        assert_eq!(config, CliConfig::default());
        assert_eq!(config.model.provider, Provider::Scripted);
        assert_eq!(config.run.max_turns, 10);
        assert!(config.live.is_empty());
    }

    #[test]
    fn full_file_is_parsed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engage.toml");
        std::fs::write(
            &path,
            r#"
                [model]
                provider = "ollama"
                model_name = "llama3.1"

                [run]
                max_turns = 4
                tool_timeout_secs = 5
                parallel_tools = true

                [[live]]
                tool = "chat_notify"
                url = "https://chat.example.test/hook"
                token_env = "ENGAGE_CHAT_TOKEN"
            "#,
        )
        .unwrap();

        let config = CliConfig::load(&path).unwrap();
        assert_eq!(config.model.provider, Provider::Ollama);
        assert_eq!(config.model.model_name(), "llama3.1");
        assert_eq!(config.run.max_turns, 4);
        assert_eq!(config.run.tool_timeout().unwrap().as_secs(), 5);
        assert!(config.run.model_timeout().is_none());
        assert!(config.run.parallel_tools);
        assert_eq!(config.live.len(), 1);
        assert_eq!(config.live[0].token_env.as_deref(), Some("ENGAGE_CHAT_TOKEN"));
    }

    #[test]
    fn unknown_provider_is_config_error() {
        let result = CliConfig::from_toml_str("[model]\nprovider = \"carrier-pigeon\"\n");
        assert!(matches!(result, Err(EngageError::Config { .. })));
    }

    #[test]
    fn model_name_defaults_per_provider() {
        let gemini = CliConfig::from_toml_str("[model]\nprovider = \"gemini\"\n").unwrap();
        assert_eq!(gemini.model.model_name(), "gemini-2.0-flash");

        let openai = CliConfig::from_toml_str("[model]\nprovider = \"openai\"\n").unwrap();
        assert_eq!(openai.model.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn overlay_path_sits_next_to_the_base_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            overlay_path(&dir.path().join("engage.toml"), "production"),
            dir.path().join("engage.production.toml")
        );
        assert_eq!(
            overlay_path(&dir.path().join("engage"), "test"),
            dir.path().join("engage.test")
        );
    }

    #[test]
    fn environment_overlay_merges_over_the_base_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engage.toml");
        std::fs::write(
            &path,
            "[model]\nprovider = \"ollama\"\nmodel_name = \"llama3.1\"\n\n[run]\nmax_turns = 4\nparallel_tools = true\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("engage.production.toml"),
            "[model]\nprovider = \"gemini\"\nvertex_project = \"soc-prod\"\n\n[run]\nmax_turns = 12\n\n[[live]]\ntool = \"ticket_create\"\nurl = \"https://tickets.example.test/api\"\n",
        )
        .unwrap();

        let production = CliConfig::load_for(&path, "production").unwrap();
        assert_eq!(production.model.provider, Provider::Gemini);
        assert_eq!(production.model.vertex_project.as_deref(), Some("soc-prod"));
        // Keys the overlay leaves out keep their base values.
        assert_eq!(production.model.model_name(), "llama3.1");
        assert!(production.run.parallel_tools);
        assert_eq!(production.run.max_turns, 12);
        assert_eq!(production.live.len(), 1);

        let test = CliConfig::load_for(&path, "test").unwrap();
        assert_eq!(test, CliConfig::load(&path).unwrap());
    }

    #[test]
    fn overlay_without_base_file_is_used_alone() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("engage.development.toml"), "[run]\nmax_turns = 3\n").unwrap();

        let config = CliConfig::load_for(&dir.path().join("engage.toml"), "development").unwrap();
        assert_eq!(config.run.max_turns, 3);
        assert_eq!(config.model.provider, Provider::Scripted);
    }

    #[test]
    fn scripted_and_ollama_need_no_credentials() {
        let scripted = build_model(&ModelSection::default()).unwrap();
        assert_eq!(scripted.name(), "inventory");

        let ollama = build_model(&ModelSection {
            provider: Provider::Ollama,
            model_name: Some("llama3.1".to_string()),
            ..ModelSection::default()
        })
        .unwrap();
        assert_eq!(ollama.name(), "ollama");
    }

    #[test]
    fn openai_without_key_is_config_error() {
        let section = ModelSection {
            provider: Provider::Openai,
            api_key_env: Some("ENGAGE_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            ..ModelSection::default()
        };
        match build_model(&section) {
            Err(EngageError::Config { reason }) => {
                assert!(reason.contains("ENGAGE_TEST_KEY_THAT_IS_NEVER_SET"))
            }
            Ok(_) => panic!("expected Config error"),
            Err(other) => panic!("expected Config, got {:?}", other),
        }
    }

    #[test]
    fn gemini_needs_a_key_or_a_vertex_token() {
        let keyed = ModelSection {
            provider: Provider::Gemini,
            api_key_env: Some("ENGAGE_TEST_GEMINI_KEY_THAT_IS_NEVER_SET".to_string()),
            ..ModelSection::default()
        };
        match build_model(&keyed) {
            Err(EngageError::Config { reason }) => {
                assert!(reason.contains("ENGAGE_TEST_GEMINI_KEY_THAT_IS_NEVER_SET"))
            }
            Ok(_) => panic!("expected Config error"),
            Err(other) => panic!("expected Config, got {:?}", other),
        }

        let vertex = ModelSection {
            provider: Provider::Gemini,
            vertex_project: Some("soc-prod".to_string()),
            access_token_env: Some("ENGAGE_TEST_VERTEX_TOKEN_THAT_IS_NEVER_SET".to_string()),
            ..ModelSection::default()
        };
        match build_model(&vertex) {
            Err(EngageError::Config { reason }) => {
                assert!(reason.contains("ENGAGE_TEST_VERTEX_TOKEN_THAT_IS_NEVER_SET"))
            }
            Ok(_) => panic!("expected Config error"),
            Err(other) => panic!("expected Config, got {:?}", other),
        }
    }

    #[test]
    fn gemini_reads_the_configured_credential() {
        // PATH is set in every test environment.
        let section = ModelSection {
            provider: Provider::Gemini,
            api_key_env: Some("PATH".to_string()),
            ..ModelSection::default()
        };
        let client = build_model(&section).unwrap();
        assert_eq!(client.name(), "gemini");
    }
}
