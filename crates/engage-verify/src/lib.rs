//! # engage-verify
//!
//! Tool argument validation for the Engage runtime.
//!
//! This crate provides [`engine::SchemaValidator`], which implements the
//! [`engage_core::traits::ArgumentValidator`] trait. It validates the
//! arguments of a model-produced tool call in two phases:
//!
//! 1. **Structural**: JSON Schema validation via the `jsonschema` crate,
//!    against the schema rendered from the tool's `ParameterSchema`.
//! 2. **Semantic**: per-tool rules (`NonBlank`, `AllowedValues`,
//!    `ForbiddenPattern`, `Range`, and named custom functions).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use engage_verify::engine::{ArgumentRule, SchemaValidator};
//!
//! let mut validator = SchemaValidator::new();
//! validator.add_rule("edr_quarantine_host", ArgumentRule::ForbiddenPattern {
//!     field: "hostname".to_string(),
//!     pattern: "*".to_string(),
//! });
//! ```

pub mod engine;

pub use engine::{ArgumentRule, SchemaValidator};
