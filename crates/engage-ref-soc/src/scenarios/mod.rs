//! SOC reference scenarios.
//!
//! Each scenario wires the real runtime (catalog, resolver, validator, agent
//! loop, transcript sink) to a deterministic model so the run is repeatable.

use std::sync::Arc;

use engage_contracts::error::EngageResult;
use engage_environment::{EnvironmentConfig, EnvironmentResolver};

use crate::{
    integrations::{default_catalog, default_validator},
    DEFAULT_ENVIRONMENTS,
};

pub mod inventory;
pub mod triage;
pub mod weekday;

/// Resolver over the stub catalog and the bundled environments.
pub fn soc_resolver() -> EngageResult<Arc<EnvironmentResolver>> {
    let resolver = EnvironmentResolver::new(
        Arc::new(default_catalog()?),
        EnvironmentConfig::from_toml_str(DEFAULT_ENVIRONMENTS)?,
    )
    .with_validator(Arc::new(default_validator()));
    Ok(Arc::new(resolver))
}
