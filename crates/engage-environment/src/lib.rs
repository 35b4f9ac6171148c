//! # engage-environment
//!
//! Environment-scoped tool resolution and the run invocation surface.
//!
//! ## Overview
//!
//! - [`IntegrationCatalog`]: the immutable universe of known tools, each with
//!   per-environment handler bindings. Built once, shared read-only.
//! - [`EnvironmentConfig`]: the TOML declaration of which environments exist,
//!   their descriptions, and per-environment tool exclusions.
//! - [`EnvironmentResolver`]: turns an environment name into a `ToolRegistry`.
//! - [`Runner`]: `run(playbook, environment, max_turns) -> RunResult`.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::{path::Path, sync::Arc};
//! use engage_environment::{EnvironmentConfig, EnvironmentResolver, Runner};
//!
//! let config = EnvironmentConfig::from_file(Path::new("config/environments.toml"))?;
//! let resolver = Arc::new(EnvironmentResolver::new(Arc::new(catalog), config));
//! let result = Runner::new(resolver, model).run(&playbook, "test", 10).await?;
//! ```
//!
//! ## Exclusion patterns
//!
//! `exclude_tools` entries match a tool name exactly, by prefix with a
//! trailing `*` (`"edr_*"`), or match everything with `"*"`.

pub mod catalog;
pub mod config;
pub mod resolver;
pub mod runner;

pub use catalog::{CatalogBuilder, Integration, IntegrationCatalog};
pub use config::{EnvironmentConfig, EnvironmentDecl, ToolPattern};
pub use resolver::EnvironmentResolver;
pub use runner::Runner;
