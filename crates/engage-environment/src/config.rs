//! Environment declarations and their TOML schema.
//!
//! An `EnvironmentConfig` lists every environment a run may name. Each
//! environment can exclude catalog tools by pattern on top of the bindings
//! the catalog already declares.

use std::{collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};

use engage_contracts::error::{EngageError, EngageResult};

/// A tool-name pattern.
///
/// - `"*"` matches every tool.
/// - A trailing `*` matches by prefix (`"edr_*"`).
/// - Anything else must match exactly (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolPattern(pub String);

impl ToolPattern {
    pub fn matches(&self, tool: &str) -> bool {
        match self.0.strip_suffix('*') {
            Some(prefix) => tool.starts_with(prefix),
            None => self.0 == tool,
        }
    }
}

/// One named environment.
///
/// Example in TOML:
/// ```toml
/// [[environments]]
/// name = "production"
/// description = "Live integrations. Containment actions have real effects."
/// exclude_tools = ["edr_quarantine_*"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDecl {
    pub name: String,

    /// Context handed to the model in the system message.
    #[serde(default)]
    pub description: String,

    /// Tools withheld from this environment even when the catalog binds them.
    #[serde(default)]
    pub exclude_tools: Vec<ToolPattern>,
}

impl EnvironmentDecl {
    pub fn excludes(&self, tool: &str) -> bool {
        self.exclude_tools.iter().any(|pattern| pattern.matches(tool))
    }
}

/// The top-level structure deserialized from an environments TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub environments: Vec<EnvironmentDecl>,
}

impl EnvironmentConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `EngageError::Config` if the TOML is malformed, does not match
    /// the schema, or declares a blank or repeated environment name.
    pub fn from_toml_str(s: &str) -> EngageResult<Self> {
        let config: EnvironmentConfig = toml::from_str(s).map_err(|e| EngageError::Config {
            reason: format!("failed to parse environments TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as environment configuration.
    pub fn from_file(path: &Path) -> EngageResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| EngageError::Config {
            reason: format!("failed to read environments file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn get(&self, name: &str) -> Option<&EnvironmentDecl> {
        self.environments.iter().find(|env| env.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.environments.iter().map(|env| env.name.as_str())
    }

    fn validate(&self) -> EngageResult<()> {
        let mut seen = HashSet::new();
        for env in &self.environments {
            if env.name.trim().is_empty() {
                return Err(EngageError::Config {
                    reason: "environment name must not be blank".to_string(),
                });
            }
            if !seen.insert(env.name.as_str()) {
                return Err(EngageError::Config {
                    reason: format!("environment '{}' is declared more than once", env.name),
                });
            }
        }
        Ok(())
    }
}
