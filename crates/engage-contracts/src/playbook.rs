//! The structured form of a markdown playbook.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A loaded playbook. Immutable once the loader returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playbook {
    /// The document body, handed to the model verbatim as the user turn.
    pub mission: String,
    /// When set, only these tools may be called.
    pub allowed_tools: Option<BTreeSet<String>>,
    /// When set, the playbook may only run in these environments.
    pub environments: Option<BTreeSet<String>>,
    /// Destructive tools are blocked unless this is true.
    pub allow_destructive: bool,
    /// Free-form directives the runtime does not interpret.
    pub metadata: BTreeMap<String, String>,
}

impl Playbook {
    /// A playbook with no directives.
    pub fn from_mission(mission: impl Into<String>) -> Self {
        Self {
            mission: mission.into(),
            allowed_tools: None,
            environments: None,
            allow_destructive: false,
            metadata: BTreeMap::new(),
        }
    }

    /// True if the allow-list is absent or names `tool`.
    pub fn permits_tool(&self, tool: &str) -> bool {
        self.allowed_tools
            .as_ref()
            .map_or(true, |allowed| allowed.contains(tool))
    }

    /// True if the environment restriction is absent or names `environment`.
    pub fn permits_environment(&self, environment: &str) -> bool {
        self.environments
            .as_ref()
            .map_or(true, |allowed| allowed.contains(environment))
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").map(String::as_str)
    }
}
