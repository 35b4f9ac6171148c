//! Schema-based argument validator for tool calls.
//!
//! `SchemaValidator` implements the `ArgumentValidator` trait from
//! `engage-core`. Validation of one call runs in two phases:
//!
//! 1. **Structural**: the arguments are validated against the JSON Schema
//!    rendered from the tool's `ParameterSchema` using the `jsonschema` crate.
//! 2. **Semantic**: every `ArgumentRule` registered for the tool is evaluated
//!    in order. All violations are collected before returning so the model
//!    sees the full set in one `InvalidArguments` fault.
//!
//! Integration-specific checks are registered by the hosting application via
//! `add_rule` and `register_rule`.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use engage_contracts::tool::ToolSpec;
use engage_core::traits::ArgumentValidator;

/// A caller-supplied check on a tool's arguments.
///
/// Returns `Some(message)` when the arguments are rejected, `None` otherwise.
pub type CustomRuleFn = Box<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// A declarative semantic check on one argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentRule {
    /// The field, when present, must be a non-blank string.
    NonBlank { field: String },
    /// The field, when present, must equal one of `allowed`.
    AllowedValues { field: String, allowed: Vec<Value> },
    /// The field, when it is a string, must not contain `pattern`.
    ForbiddenPattern { field: String, pattern: String },
    /// The field, when it is a number, must lie within `min..=max`.
    Range { field: String, min: f64, max: f64 },
}

impl ArgumentRule {
    fn check(&self, arguments: &Value) -> Option<String> {
        match self {
            ArgumentRule::NonBlank { field } => match arguments.get(field) {
                Some(Value::String(s)) if s.trim().is_empty() => {
                    Some(format!("'{field}' must not be blank"))
                }
                _ => None,
            },

            ArgumentRule::AllowedValues { field, allowed } => match arguments.get(field) {
                Some(actual) if !allowed.contains(actual) => Some(format!(
                    "'{field}' has value {actual} which is not in the allowed set"
                )),
                _ => None,
            },

            // Non-string values pass; the rule only applies to strings.
            ArgumentRule::ForbiddenPattern { field, pattern } => {
                match arguments.get(field).and_then(Value::as_str) {
                    Some(s) if s.contains(pattern.as_str()) => {
                        Some(format!("'{field}' contains forbidden pattern '{pattern}'"))
                    }
                    _ => None,
                }
            }

            ArgumentRule::Range { field, min, max } => {
                match arguments.get(field).and_then(Value::as_f64) {
                    Some(n) if n < *min || n > *max => {
                        Some(format!("'{field}' must be between {min} and {max}, got {n}"))
                    }
                    _ => None,
                }
            }
        }
    }
}

/// The tool argument validator.
///
/// Combines JSON Schema structural validation with per-tool semantic rules.
pub struct SchemaValidator {
    rules: HashMap<String, Vec<ArgumentRule>>,
    custom_rules: HashMap<String, Vec<(String, CustomRuleFn)>>,
}

impl SchemaValidator {
    /// Create a validator with no semantic rules.
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
            custom_rules: HashMap::new(),
        }
    }

    /// Attach a declarative rule to `tool`.
    pub fn add_rule(&mut self, tool: impl Into<String>, rule: ArgumentRule) -> &mut Self {
        self.rules.entry(tool.into()).or_default().push(rule);
        self
    }

    /// Attach a custom check named `rule_id` to `tool`.
    ///
    /// The id prefixes the violation message so operators can tell which
    /// check rejected the call.
    pub fn register_rule(
        &mut self,
        tool: impl Into<String>,
        rule_id: impl Into<String>,
        f: CustomRuleFn,
    ) -> &mut Self {
        self.custom_rules
            .entry(tool.into())
            .or_default()
            .push((rule_id.into(), f));
        self
    }

    pub fn rule_count(&self, tool: &str) -> usize {
        self.rules.get(tool).map_or(0, Vec::len) + self.custom_rules.get(tool).map_or(0, Vec::len)
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ArgumentValidator for SchemaValidator {
    fn validate(&self, spec: &ToolSpec, arguments: &Value) -> Result<(), Vec<String>> {
        let mut violations: Vec<String> = Vec::new();

        // ── Phase 1: JSON Schema structural validation ────────────────────────
        let schema = spec.parameters.to_json_schema();
        match jsonschema::validator_for(&schema) {
            Ok(validator) => {
                for error in validator.iter_errors(arguments) {
                    let path = error.instance_path.to_string();
                    let message = if path.is_empty() {
                        error.to_string()
                    } else {
                        format!("at {}: {}", path, error)
                    };
                    violations.push(message);
                }
            }
            Err(e) => {
                // A tool whose own schema does not compile can never be called.
                warn!(tool = %spec.name, error = %e, "parameter schema failed to compile");
                violations.push(format!("invalid parameter schema: {e}"));
            }
        }

        // Semantic rules assume the structural shape holds.
        if violations.is_empty() {
            // ── Phase 2: Semantic rule evaluation ─────────────────────────────
            for rule in self.rules.get(&spec.name).into_iter().flatten() {
                if let Some(message) = rule.check(arguments) {
                    violations.push(message);
                }
            }
            for (rule_id, f) in self.custom_rules.get(&spec.name).into_iter().flatten() {
                if let Some(message) = f(arguments) {
                    violations.push(format!("[{rule_id}] {message}"));
                }
            }
        }

        debug!(
            tool = %spec.name,
            violation_count = violations.len(),
            "argument validation complete"
        );

        if violations.is_empty() {
            Ok(())
        } else {
            warn!(tool = %spec.name, violations = %violations.join("; "), "arguments rejected");
            Err(violations)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
