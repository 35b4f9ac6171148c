//! The integration catalog: every tool the process knows about.
//!
//! The catalog is built once at startup and never mutated. Each integration
//! carries one handler per environment it is bound in; an integration with no
//! binding for an environment simply does not exist there.

use std::{collections::BTreeMap, fmt, sync::Arc};

use engage_contracts::{
    error::{EngageError, EngageResult},
    tool::ToolSpec,
};
use engage_core::traits::ToolHandler;

/// One tool and its per-environment handlers.
#[derive(Clone)]
pub struct Integration {
    pub spec: ToolSpec,
    bindings: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl Integration {
    pub fn new(spec: ToolSpec) -> Self {
        Self {
            spec,
            bindings: BTreeMap::new(),
        }
    }

    /// Bind `handler` for `environment`. A later binding for the same
    /// environment replaces the earlier one.
    pub fn bind(mut self, environment: impl Into<String>, handler: Arc<dyn ToolHandler>) -> Self {
        self.bindings.insert(environment.into(), handler);
        self
    }

    pub fn handler_for(&self, environment: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.bindings.get(environment)
    }

    pub fn environments(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

impl fmt::Debug for Integration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Integration")
            .field("tool", &self.spec.name)
            .field("environments", &self.environments().collect::<Vec<_>>())
            .finish()
    }
}

/// Immutable, ordered set of integrations.
#[derive(Debug, Clone, Default)]
pub struct IntegrationCatalog {
    integrations: Vec<Integration>,
}

impl IntegrationCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn integrations(&self) -> &[Integration] {
        &self.integrations
    }

    pub fn get(&self, tool: &str) -> Option<&Integration> {
        self.integrations.iter().find(|i| i.spec.name == tool)
    }

    pub fn len(&self) -> usize {
        self.integrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.integrations.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct CatalogBuilder {
    integrations: Vec<Integration>,
}

impl CatalogBuilder {
    pub fn add(mut self, integration: Integration) -> Self {
        self.integrations.push(integration);
        self
    }

    /// Freeze the catalog.
    ///
    /// # Errors
    ///
    /// `EngageError::DuplicateTool` if two integrations share a tool name.
    pub fn build(self) -> EngageResult<IntegrationCatalog> {
        for (index, integration) in self.integrations.iter().enumerate() {
            if self.integrations[..index]
                .iter()
                .any(|earlier| earlier.spec.name == integration.spec.name)
            {
                return Err(EngageError::DuplicateTool {
                    name: integration.spec.name.clone(),
                });
            }
        }
        Ok(IntegrationCatalog {
            integrations: self.integrations,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use engage_contracts::{error::EngageError, tool::ToolSpec};
    use engage_core::testing::StaticHandler;

    use super::{Integration, IntegrationCatalog};

    fn integration(name: &str, envs: &[&str]) -> Integration {
        envs.iter().fold(
            Integration::new(ToolSpec::new(name, "SIEM", "stub")),
            |integration, env| integration.bind(*env, Arc::new(StaticHandler::new(json!({})))),
        )
    }

    #[test]
    fn bindings_are_per_environment() {
        let integration = integration("siem_search_detections", &["test", "production"]);
        assert!(integration.handler_for("test").is_some());
        assert!(integration.handler_for("development").is_none());
        assert_eq!(integration.environments().collect::<Vec<_>>(), vec!["production", "test"]);
    }

    #[test]
    fn catalog_preserves_order_and_lookup() {
        let catalog = IntegrationCatalog::builder()
            .add(integration("b_tool", &["test"]))
            .add(integration("a_tool", &["test"]))
            .build()
            .unwrap();

        let names: Vec<&str> = catalog.integrations().iter().map(|i| i.spec.name.as_str()).collect();
        assert_eq!(names, vec!["b_tool", "a_tool"]);
        assert!(catalog.get("a_tool").is_some());
        assert!(catalog.get("c_tool").is_none());
    }

    #[test]
    fn duplicate_tool_names_are_rejected() {
        let result = IntegrationCatalog::builder()
            .add(integration("chat_notify", &["test"]))
            .add(integration("chat_notify", &["production"]))
            .build();

        match result {
            Err(EngageError::DuplicateTool { name }) => assert_eq!(name, "chat_notify"),
            other => panic!("expected DuplicateTool, got {:?}", other),
        }
    }
}
