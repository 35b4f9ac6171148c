//! Human-readable tool inventory.
//!
//! Renders the tools of one environment as a plain-text report grouped by
//! integration category. Used by the CLI `tools` command and by the offline
//! responder that answers "what tools do you have" missions.

use engage_contracts::tool::ToolSpec;

/// Render `specs` for `environment`.
///
/// Categories appear in the order their first tool appears in `specs`, so a
/// registry's `describe()` output renders deterministically.
pub fn render_inventory(environment: &str, specs: &[ToolSpec]) -> String {
    let mut groups: Vec<(&str, Vec<&ToolSpec>)> = Vec::new();
    for spec in specs {
        match groups.iter().position(|(category, _)| *category == spec.category) {
            Some(index) => groups[index].1.push(spec),
            None => groups.push((spec.category.as_str(), vec![spec])),
        }
    }

    let mut out = format!(
        "Environment: {}\nTools available: {}\n",
        environment,
        specs.len()
    );

    if specs.is_empty() {
        out.push_str("\nNo tools are bound in this environment.\n");
        return out;
    }

    for (category, members) in groups {
        out.push_str(&format!("\n## {}\n", category));
        for spec in members {
            let marker = if spec.destructive { " [destructive]" } else { "" };
            out.push_str(&format!("- {}{}: {}\n", spec.name, marker, spec.description));

            if !spec.capabilities.is_empty() {
                out.push_str("  capabilities:\n");
                for capability in &spec.capabilities {
                    out.push_str(&format!("    * {}\n", capability));
                }
            }

            if !spec.parameters.is_empty() {
                out.push_str("  parameters:\n");
                for param in spec.parameters.params() {
                    let presence = if param.required { "required" } else { "optional" };
                    out.push_str(&format!(
                        "    * {} ({}, {}): {}\n",
                        param.name, param.param_type, presence, param.description
                    ));
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use engage_contracts::tool::{ParamType, ParameterSchema, ToolSpec};

    use super::render_inventory;

    fn specs() -> Vec<ToolSpec> {
        vec![
            ToolSpec::new("siem_search_detections", "SIEM", "Search recent detections")
                .capability("Query alerts by severity")
                .parameters(ParameterSchema::new().optional(
                    "hours_back",
                    ParamType::Integer,
                    "Lookback window in hours",
                )),
            ToolSpec::new("edr_get_host", "EDR", "Look up an endpoint"),
            ToolSpec::new("siem_search_iocs", "SIEM", "Search indicators of compromise"),
            ToolSpec::new("edr_quarantine_host", "EDR", "Isolate a host").destructive(),
        ]
    }

    #[test]
    fn groups_by_category_in_first_seen_order() {
        let text = render_inventory("test", &specs());

        let siem = text.find("## SIEM").unwrap();
        let edr = text.find("## EDR").unwrap();
        assert!(siem < edr);
        assert_eq!(text.matches("## SIEM").count(), 1);

        // Both SIEM tools render under the SIEM heading.
        let iocs = text.find("siem_search_iocs").unwrap();
        assert!(iocs > siem && iocs < edr);
    }

    #[test]
    fn lists_capabilities_parameters_and_destructive_marker() {
        let text = render_inventory("production", &specs());

        assert!(text.starts_with("Environment: production\nTools available: 4\n"));
        assert!(text.contains("    * Query alerts by severity"));
        assert!(text.contains("    * hours_back (integer, optional): Lookback window in hours"));
        assert!(text.contains("- edr_quarantine_host [destructive]: Isolate a host"));
        assert!(text.contains("- edr_get_host: Look up an endpoint"));
    }

    #[test]
    fn every_line_is_newline_terminated() {
        let text = render_inventory("test", &specs());
        assert!(text.ends_with("- edr_quarantine_host [destructive]: Isolate a host\n"));
        assert!(!text.contains("\n\n\n"));
        assert_eq!(text.matches("\n## ").count(), 2);
    }

    #[test]
    fn empty_environment_says_so() {
        let text = render_inventory("development", &[]);
        assert!(text.contains("Tools available: 0"));
        assert!(text.contains("No tools are bound"));
    }
}
