//! # engage-ref-soc
//!
//! SOC reference deployment for the Engage runtime.
//!
//! - [`integrations`]: the integration catalog. Seven stub tools (SIEM, EDR,
//!   Directory, SSO, Cloud Provider, Cloud Security, Ticketing) in
//!   `development` and `test`; containment, chat, knowledge base and the
//!   extra SIEM and ticketing stubs in `development`; live HTTP bindings in
//!   `production`; and the `day_of_week` utility everywhere.
//! - [`live`]: the authenticated HTTP handler behind live bindings.
//! - [`scenarios`]: end-to-end runs driven by deterministic models.
//!
//! All stub data is hardcoded and fictional.

pub mod integrations;
pub mod live;
pub mod mock_data;
pub mod scenarios;

/// The bundled `development`, `test` and `production` declarations.
pub const DEFAULT_ENVIRONMENTS: &str = include_str!("../config/environments.toml");

pub const INVENTORY_PLAYBOOK: &str = include_str!("../playbooks/inventory.md");
pub const TRIAGE_PLAYBOOK: &str = include_str!("../playbooks/triage.md");
pub const WEEKDAY_PLAYBOOK: &str = include_str!("../playbooks/weekday.md");
