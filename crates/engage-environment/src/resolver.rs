//! Environment resolution: catalog + declarations → one `ToolRegistry`.
//!
//! Resolution algorithm for an environment name:
//!
//! 1. Look the name up in the `EnvironmentConfig`. Unknown → `UnknownEnvironment`.
//! 2. Walk the catalog in order. For each integration:
//!    a. No handler bound for this environment → omit (unavailable, not an error).
//!    b. Excluded by one of the environment's patterns → omit.
//!    c. Otherwise register the `ToolSpec` and the bound handler.
//! 3. Freeze the registry.
//!
//! Resolution is pure configuration lookup. No handler is called.

use std::sync::Arc;

use tracing::{debug, info, warn};

use engage_contracts::error::{EngageError, EngageResult};
use engage_core::{
    registry::{ToolDescriptor, ToolRegistry},
    traits::ArgumentValidator,
};
use engage_verify::SchemaValidator;

use crate::{catalog::IntegrationCatalog, config::EnvironmentConfig};

/// Maps environment names to tool registries.
///
/// The catalog is shared read-only; any number of runs may resolve from the
/// same resolver concurrently.
pub struct EnvironmentResolver {
    catalog: Arc<IntegrationCatalog>,
    config: EnvironmentConfig,
    validator: Arc<dyn ArgumentValidator>,
}

impl EnvironmentResolver {
    /// Build a resolver that validates arguments with a rule-free `SchemaValidator`.
    pub fn new(catalog: Arc<IntegrationCatalog>, config: EnvironmentConfig) -> Self {
        Self {
            catalog,
            config,
            validator: Arc::new(SchemaValidator::new()),
        }
    }

    /// Replace the argument validator handed to every resolved registry.
    pub fn with_validator(mut self, validator: Arc<dyn ArgumentValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn catalog(&self) -> &IntegrationCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// The declared description of `environment`, if it is known and non-empty.
    pub fn description(&self, environment: &str) -> Option<&str> {
        self.config
            .get(environment)
            .map(|env| env.description.trim())
            .filter(|description| !description.is_empty())
    }

    /// Build the registry for `environment`.
    pub fn resolve(&self, environment: &str) -> EngageResult<ToolRegistry> {
        let Some(decl) = self.config.get(environment) else {
            warn!(environment = %environment, "unknown environment requested");
            return Err(EngageError::UnknownEnvironment {
                name: environment.to_string(),
            });
        };

        let mut builder = ToolRegistry::builder(environment, self.validator.clone());
        let mut omitted = 0usize;

        for integration in self.catalog.integrations() {
            let name = integration.spec.name.as_str();

            let Some(handler) = integration.handler_for(environment) else {
                debug!(environment = %environment, tool = %name, "no binding, tool omitted");
                omitted += 1;
                continue;
            };

            if decl.excludes(name) {
                debug!(environment = %environment, tool = %name, "excluded by environment pattern");
                omitted += 1;
                continue;
            }

            builder.register(ToolDescriptor::new(integration.spec.clone(), handler.clone()))?;
        }

        let registry = builder.build();
        info!(
            environment = %environment,
            tools = registry.len(),
            omitted,
            "environment resolved"
        );
        Ok(registry)
    }
}
