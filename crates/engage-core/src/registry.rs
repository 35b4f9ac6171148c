//! The tool descriptor registry.
//!
//! A `ToolRegistry` is scoped to exactly one environment. It is assembled once
//! through `RegistryBuilder` and is immutable afterwards: the set of tools the
//! model can see never changes during a run.
//!
//! `invoke()` is the trust boundary for model-produced arguments:
//!
//!   lookup → validate → handler
//!
//! A handler is only reachable after the name resolved and the arguments
//! passed the `ArgumentValidator`.

use std::{collections::HashMap, fmt, sync::Arc};

use serde_json::Value;
use tracing::{debug, warn};

use engage_contracts::{
    error::{EngageError, EngageResult, ToolFault},
    tool::ToolSpec,
};

use crate::traits::{ArgumentValidator, ToolHandler};

/// A tool's model-visible spec plus the handler bound to it.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub spec: ToolSpec,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    pub fn new(spec: ToolSpec, handler: Arc<dyn ToolHandler>) -> Self {
        Self { spec, handler }
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Ordered name → descriptor map for one environment.
pub struct ToolRegistry {
    environment: String,
    /// Specs in registration order; this is the order `describe()` reports.
    specs: Vec<ToolSpec>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    validator: Arc<dyn ArgumentValidator>,
}

impl ToolRegistry {
    pub fn builder(
        environment: impl Into<String>,
        validator: Arc<dyn ArgumentValidator>,
    ) -> RegistryBuilder {
        RegistryBuilder {
            environment: environment.into(),
            descriptors: Vec::new(),
            validator,
        }
    }

    /// The environment this registry was resolved for.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Every registered tool, in registration order.
    pub fn describe(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Invoke the tool named `name` with untrusted `arguments`.
    ///
    /// # Errors
    ///
    /// - `UnknownTool` if nothing is registered under `name`. No handler runs.
    /// - `InvalidArguments` if the validator rejects the arguments. No handler runs.
    /// - `Execution` if the handler itself fails.
    pub async fn invoke(&self, name: &str, arguments: &Value) -> Result<Value, ToolFault> {
        let (spec, handler) = match (self.spec(name), self.handlers.get(name)) {
            (Some(spec), Some(handler)) => (spec, handler),
            _ => {
                warn!(environment = %self.environment, tool = %name, "unknown tool requested");
                return Err(ToolFault::UnknownTool {
                    name: name.to_string(),
                });
            }
        };

        if let Err(violations) = self.validator.validate(spec, arguments) {
            let reason = violations.join("; ");
            warn!(tool = %name, reason = %reason, "tool arguments rejected");
            return Err(ToolFault::InvalidArguments {
                tool: name.to_string(),
                reason,
            });
        }

        debug!(environment = %self.environment, tool = %name, "invoking tool handler");
        handler
            .invoke(arguments)
            .await
            .map_err(|err| ToolFault::Execution {
                tool: name.to_string(),
                message: err.message,
            })
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("environment", &self.environment)
            .field(
                "tools",
                &self.specs.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Collects descriptors for one environment, then freezes them.
pub struct RegistryBuilder {
    environment: String,
    descriptors: Vec<ToolDescriptor>,
    validator: Arc<dyn ArgumentValidator>,
}

impl RegistryBuilder {
    /// Add a descriptor. Names must be unique within the registry.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> EngageResult<&mut Self> {
        if self
            .descriptors
            .iter()
            .any(|existing| existing.spec.name == descriptor.spec.name)
        {
            return Err(EngageError::DuplicateTool {
                name: descriptor.spec.name,
            });
        }
        self.descriptors.push(descriptor);
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        let mut specs = Vec::with_capacity(self.descriptors.len());
        let mut handlers = HashMap::with_capacity(self.descriptors.len());
        for descriptor in self.descriptors {
            handlers.insert(descriptor.spec.name.clone(), descriptor.handler);
            specs.push(descriptor.spec);
        }

        debug!(
            environment = %self.environment,
            tools = specs.len(),
            "tool registry built"
        );

        ToolRegistry {
            environment: self.environment,
            specs,
            handlers,
            validator: self.validator,
        }
    }
}
