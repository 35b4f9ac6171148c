//! The SOC integration catalog.
//!
//! Bindings per environment:
//!
//! - `test`: the seven read-mostly integrations (SIEM, EDR, Directory, SSO,
//!   Cloud Provider, Cloud Security, Ticketing) as stubs, plus `day_of_week`.
//! - `development`: everything in `test`, plus stub containment actions,
//!   chat, knowledge base, the extra SIEM and ticketing operations and the
//!   connectivity check.
//! - `production`: `day_of_week` plus whatever live HTTP bindings the caller
//!   supplies.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};
use serde_json::{json, Value};

use engage_contracts::{
    error::{EngageError, EngageResult, HandlerError},
    tool::{ParamType, ParameterSchema, ToolSpec},
};
use engage_core::traits::ToolHandler;
use engage_environment::{Integration, IntegrationCatalog};
use engage_verify::{ArgumentRule, SchemaValidator};

use crate::{
    live::{HttpToolHandler, LiveBinding},
    mock_data,
};

/// Environments where the read-mostly stubs are bound.
pub const STUB_ENVIRONMENTS: [&str; 2] = ["development", "test"];

/// The environment where every stub, including side-effecting ones, is bound.
pub const SANDBOX_ENVIRONMENT: &str = "development";

/// The environment that receives live bindings.
pub const LIVE_ENVIRONMENT: &str = "production";

/// Every bundled environment.
pub const ALL_ENVIRONMENTS: [&str; 3] = ["development", "test", LIVE_ENVIRONMENT];

const SEVERITIES: [&str; 4] = ["LOW", "MEDIUM", "HIGH", "CRITICAL"];
const PRIORITIES: [&str; 4] = ["Low", "Medium", "High", "Critical"];
const URGENCIES: [&str; 4] = ["low", "normal", "high", "critical"];
const ALERT_SEVERITIES: [&str; 4] = ["low", "medium", "high", "critical"];
const IOC_TYPES: [&str; 4] = ["auto", "ip", "domain", "hash"];

// ── Stub handler ──────────────────────────────────────────────────────────────

type StubFn = fn(&Value) -> Result<Value, HandlerError>;

/// A handler backed by a plain function over the canned data.
pub struct StubHandler {
    respond: StubFn,
}

impl StubHandler {
    pub fn new(respond: StubFn) -> Self {
        Self { respond }
    }
}

#[async_trait]
impl ToolHandler for StubHandler {
    async fn invoke(&self, arguments: &Value) -> Result<Value, HandlerError> {
        (self.respond)(arguments)
    }
}

fn str_arg<'a>(arguments: &'a Value, field: &str) -> Option<&'a str> {
    arguments.get(field).and_then(Value::as_str)
}

fn required_str<'a>(arguments: &'a Value, field: &str) -> Result<&'a str, HandlerError> {
    str_arg(arguments, field).ok_or_else(|| HandlerError::new(format!("missing '{}'", field)))
}

fn u64_arg(arguments: &Value, field: &str, default: u64) -> u64 {
    arguments.get(field).and_then(Value::as_u64).unwrap_or(default)
}

fn string_list(arguments: &Value, field: &str) -> Vec<String> {
    arguments
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ── Tool specs: SIEM ──────────────────────────────────────────────────────────

pub fn siem_search_detections() -> ToolSpec {
    ToolSpec::new(
        "siem_search_detections",
        "SIEM",
        "Search the SIEM for detections raised in a recent time window.",
    )
    .capability("List new detections with severity, rule and affected assets")
    .capability("Filter by severity")
    .parameters(
        ParameterSchema::new()
            .optional("hours_back", ParamType::Integer, "Look-back window in hours (1-168, default 24)")
            .optional("severity", ParamType::String, "One of LOW, MEDIUM, HIGH, CRITICAL"),
    )
}

pub fn siem_search_iocs() -> ToolSpec {
    ToolSpec::new(
        "siem_search_iocs",
        "SIEM",
        "Search the SIEM for an indicator of compromise.",
    )
    .capability("Prevalence and first/last sighting of an IP, domain or hash")
    .capability("Assets that contacted the indicator")
    .capability("Threat intelligence verdict")
    .parameters(
        ParameterSchema::new()
            .required("ioc_value", ParamType::String, "The indicator value")
            .optional("ioc_type", ParamType::String, "One of auto, ip, domain, hash (default auto)"),
    )
}

pub fn siem_get_asset_context() -> ToolSpec {
    ToolSpec::new(
        "siem_get_asset_context",
        "SIEM",
        "Fetch the SIEM timeline of an asset: processes, connections and user activity.",
    )
    .capability("Event timeline for one asset")
    .capability("Network connections and user logins")
    .parameters(
        ParameterSchema::new()
            .required("asset_name", ParamType::String, "Asset hostname or identifier")
            .optional("hours_back", ParamType::Integer, "History window in hours (1-168, default 24)"),
    )
}

// ── Tool specs: EDR, Directory, SSO, Cloud ────────────────────────────────────

pub fn edr_get_host() -> ToolSpec {
    ToolSpec::new(
        "edr_get_host",
        "EDR",
        "Fetch endpoint context from the EDR: OS, users, processes and connections.",
    )
    .capability("Recent process executions with command lines")
    .capability("Outbound network connections")
    .capability("Current isolation status")
    .parameters(ParameterSchema::new().required("hostname", ParamType::String, "Endpoint hostname"))
}

pub fn edr_quarantine_host() -> ToolSpec {
    ToolSpec::new(
        "edr_quarantine_host",
        "EDR",
        "Isolate an endpoint from the network.",
    )
    .capability("Network isolation of a single host")
    .parameters(
        ParameterSchema::new()
            .required("hostname", ParamType::String, "Endpoint hostname")
            .required("reason", ParamType::String, "Justification recorded with the action"),
    )
    .destructive()
}

pub fn directory_lookup_user() -> ToolSpec {
    ToolSpec::new(
        "directory_lookup_user",
        "Directory",
        "Look up a user in the corporate directory.",
    )
    .capability("Department, title and manager")
    .capability("Privileged-account flag and account state")
    .parameters(ParameterSchema::new().required("username", ParamType::String, "Directory username"))
}

pub fn sso_list_sessions() -> ToolSpec {
    ToolSpec::new(
        "sso_list_sessions",
        "SSO",
        "List the active single sign-on sessions of a user.",
    )
    .capability("Session source IP, country and application")
    .parameters(ParameterSchema::new().required("username", ParamType::String, "Directory username"))
}

pub fn sso_revoke_sessions() -> ToolSpec {
    ToolSpec::new(
        "sso_revoke_sessions",
        "SSO",
        "Revoke every active session of a user, forcing re-authentication.",
    )
    .capability("Global sign-out of one user")
    .parameters(ParameterSchema::new().required("username", ParamType::String, "Directory username"))
    .destructive()
}

pub fn cloud_list_instances() -> ToolSpec {
    ToolSpec::new(
        "cloud_list_instances",
        "Cloud Provider",
        "List compute instances in the cloud account.",
    )
    .capability("Instance state and public exposure")
    .parameters(ParameterSchema::new().optional("region", ParamType::String, "Restrict to one region"))
}

pub fn cloud_security_findings() -> ToolSpec {
    ToolSpec::new(
        "cloud_security_findings",
        "Cloud Security",
        "List open cloud security posture findings.",
    )
    .capability("Misconfigured storage, network and identity resources")
    .parameters(
        ParameterSchema::new()
            .optional("severity", ParamType::String, "One of LOW, MEDIUM, HIGH, CRITICAL"),
    )
}

// ── Tool specs: Ticketing ─────────────────────────────────────────────────────

pub fn ticket_create() -> ToolSpec {
    ToolSpec::new(
        "ticket_create",
        "Ticketing",
        "Open a security incident ticket.",
    )
    .capability("Create a ticket with summary, description and priority")
    .parameters(
        ParameterSchema::new()
            .required("summary", ParamType::String, "One-line summary")
            .required("description", ParamType::String, "Findings and evidence")
            .optional("priority", ParamType::String, "One of Low, Medium, High, Critical"),
    )
}

pub fn ticket_update_findings() -> ToolSpec {
    ToolSpec::new(
        "ticket_update_findings",
        "Ticketing",
        "Append investigation findings to an existing ticket.",
    )
    .capability("Add findings, change status and add labels")
    .parameters(
        ParameterSchema::new()
            .required("ticket_id", ParamType::String, "Ticket key, e.g. SEC-311")
            .required("findings", ParamType::String, "Findings to append")
            .optional("status", ParamType::String, "New ticket status")
            .optional("add_labels", ParamType::Array, "Labels to add"),
    )
}

pub fn ticket_list_stale() -> ToolSpec {
    ToolSpec::new(
        "ticket_list_stale",
        "Ticketing",
        "List security tickets that have not been updated recently.",
    )
    .capability("Find tickets idle for longer than a threshold")
    .parameters(
        ParameterSchema::new()
            .optional("hours_old", ParamType::Integer, "Idle threshold in hours (1-720, default 24)")
            .optional("status_filter", ParamType::String, "Only tickets with this status"),
    )
}

// ── Tool specs: Chat ──────────────────────────────────────────────────────────

pub fn chat_notify() -> ToolSpec {
    ToolSpec::new(
        "chat_notify",
        "Chat",
        "Post a message to a team chat channel.",
    )
    .capability("Notify the on-call channel")
    .parameters(
        ParameterSchema::new()
            .required("channel", ParamType::String, "Channel name, starting with '#'")
            .required("message", ParamType::String, "Message text"),
    )
}

pub fn chat_create_incident_channel() -> ToolSpec {
    ToolSpec::new(
        "chat_create_incident_channel",
        "Chat",
        "Create a dedicated incident response channel and post the opening message.",
    )
    .capability("Channel named after the incident")
    .capability("Invite responders")
    .parameters(
        ParameterSchema::new()
            .required("incident_id", ParamType::String, "Incident identifier")
            .required("initial_message", ParamType::String, "First message in the channel")
            .optional("team_members", ParamType::Array, "Usernames to invite")
            .optional("is_private", ParamType::Boolean, "Create a private channel (default false)"),
    )
}

pub fn chat_request_human_input() -> ToolSpec {
    ToolSpec::new(
        "chat_request_human_input",
        "Chat",
        "Ask an analyst for a decision and wait for the answer out of band.",
    )
    .capability("Question with context and urgency")
    .capability("Automatic escalation for high and critical urgency")
    .parameters(
        ParameterSchema::new()
            .required("question", ParamType::String, "The decision needed")
            .required("context", ParamType::String, "Evidence the analyst needs")
            .optional("urgency", ParamType::String, "One of low, normal, high, critical (default normal)")
            .optional("timeout_hours", ParamType::Integer, "Hours to wait for an answer (1-72, default 4)")
            .optional("channel", ParamType::String, "Channel, starting with '#' (default #security)"),
    )
}

pub fn chat_send_security_alert() -> ToolSpec {
    ToolSpec::new(
        "chat_send_security_alert",
        "Chat",
        "Post a formatted security alert.",
    )
    .capability("Severity-tagged alert with source and alert id")
    .capability("Automatic escalation for high and critical severity")
    .parameters(
        ParameterSchema::new()
            .required("alert_title", ParamType::String, "Alert title")
            .required("alert_details", ParamType::String, "Alert details")
            .optional("severity", ParamType::String, "One of low, medium, high, critical (default medium)")
            .optional("source_system", ParamType::String, "System that raised the alert")
            .optional("alert_id", ParamType::String, "Alert identifier")
            .optional("channel", ParamType::String, "Channel, starting with '#' (default #security)"),
    )
}

pub fn chat_send_investigation_update() -> ToolSpec {
    ToolSpec::new(
        "chat_send_investigation_update",
        "Chat",
        "Post a progress update for an incident.",
    )
    .capability("Findings and next steps for responders")
    .parameters(
        ParameterSchema::new()
            .required("incident_id", ParamType::String, "Incident identifier")
            .required("update_message", ParamType::String, "Update text")
            .optional("findings", ParamType::String, "Findings so far")
            .optional("next_steps", ParamType::String, "Planned next steps")
            .optional("channel", ParamType::String, "Channel, starting with '#' (default the incident channel)"),
    )
}

// ── Tool specs: Knowledge base ────────────────────────────────────────────────

pub fn kb_search() -> ToolSpec {
    ToolSpec::new(
        "kb_search",
        "Knowledge Base",
        "Search the security knowledge base for procedures and past analyses.",
    )
    .capability("Ranked articles with excerpts and labels")
    .parameters(
        ParameterSchema::new()
            .required("query", ParamType::String, "Search terms")
            .optional("space_key", ParamType::String, "Space to search (default SEC)")
            .optional("limit", ParamType::Integer, "Maximum results (1-50, default 10)"),
    )
}

pub fn kb_get_playbook() -> ToolSpec {
    ToolSpec::new(
        "kb_get_playbook",
        "Knowledge Base",
        "Fetch the content of a response playbook page.",
    )
    .capability("Playbook body, labels and page link")
    .parameters(
        ParameterSchema::new()
            .required("playbook_name", ParamType::String, "Playbook title or part of it")
            .optional("space_key", ParamType::String, "Space to search (default PLAYBOOKS)"),
    )
}

pub fn kb_create_incident_doc() -> ToolSpec {
    ToolSpec::new(
        "kb_create_incident_doc",
        "Knowledge Base",
        "Create an incident documentation page.",
    )
    .capability("Page titled with the incident id")
    .parameters(
        ParameterSchema::new()
            .required("incident_id", ParamType::String, "Incident identifier")
            .required("title", ParamType::String, "Page title")
            .required("content", ParamType::String, "Page body")
            .optional("space_key", ParamType::String, "Target space (default SEC)")
            .optional("parent_page_id", ParamType::String, "Parent page"),
    )
}

pub fn kb_update_incident_doc() -> ToolSpec {
    ToolSpec::new(
        "kb_update_incident_doc",
        "Knowledge Base",
        "Append findings to an incident documentation page.",
    )
    .capability("Timestamped update section and status change")
    .parameters(
        ParameterSchema::new()
            .required("page_id", ParamType::String, "Page to update")
            .required("additional_content", ParamType::String, "Content to append")
            .optional("status_update", ParamType::String, "New incident status"),
    )
}

// ── Tool specs: Utility ───────────────────────────────────────────────────────

pub fn integration_test_connection() -> ToolSpec {
    ToolSpec::new(
        "integration_test_connection",
        "Utility",
        "Check that an integration is reachable.",
    )
    .capability("Connectivity status of one integration")
    .parameters(ParameterSchema::new().required(
        "integration",
        ParamType::String,
        "One of siem, edr, directory, sso, cloud, ticketing, chat, knowledge_base",
    ))
}

pub fn day_of_week() -> ToolSpec {
    ToolSpec::new("day_of_week", "Utility", "Get the current day of the week.")
        .capability("Local weekday name and date")
}

// ── Stub responders ───────────────────────────────────────────────────────────

fn search_detections(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::siem_detections(
        u64_arg(arguments, "hours_back", 24),
        str_arg(arguments, "severity"),
    ))
}

fn search_iocs(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::siem_ioc(
        required_str(arguments, "ioc_value")?,
        str_arg(arguments, "ioc_type").unwrap_or("auto"),
    ))
}

fn asset_context(arguments: &Value) -> Result<Value, HandlerError> {
    let asset = required_str(arguments, "asset_name")?;
    mock_data::siem_asset_context(asset, u64_arg(arguments, "hours_back", 24))
        .ok_or_else(|| HandlerError::new(format!("asset '{}' has no SIEM events", asset)))
}

fn get_host(arguments: &Value) -> Result<Value, HandlerError> {
    let hostname = required_str(arguments, "hostname")?;
    mock_data::edr_host(hostname)
        .ok_or_else(|| HandlerError::new(format!("host '{}' is not enrolled in EDR", hostname)))
}

fn quarantine_host(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::edr_quarantine(
        required_str(arguments, "hostname")?,
        required_str(arguments, "reason")?,
    ))
}

fn lookup_user(arguments: &Value) -> Result<Value, HandlerError> {
    let username = required_str(arguments, "username")?;
    mock_data::directory_user(username)
        .ok_or_else(|| HandlerError::new(format!("user '{}' not found", username)))
}

fn list_sessions(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::sso_sessions(required_str(arguments, "username")?))
}

fn revoke_sessions(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::sso_revoke(required_str(arguments, "username")?))
}

fn list_instances(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::cloud_instances(str_arg(arguments, "region")))
}

fn security_findings(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::cloud_findings(str_arg(arguments, "severity")))
}

fn create_ticket(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::ticket(
        required_str(arguments, "summary")?,
        required_str(arguments, "description")?,
        str_arg(arguments, "priority").unwrap_or("Medium"),
    ))
}

fn update_ticket(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::ticket_update(
        required_str(arguments, "ticket_id")?,
        required_str(arguments, "findings")?,
        str_arg(arguments, "status"),
        &string_list(arguments, "add_labels"),
    ))
}

fn list_stale(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::stale_tickets(
        u64_arg(arguments, "hours_old", 24),
        str_arg(arguments, "status_filter"),
    ))
}

fn notify(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::chat_message(
        required_str(arguments, "channel")?,
        required_str(arguments, "message")?,
    ))
}

fn create_channel(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::chat_incident_channel(
        required_str(arguments, "incident_id")?,
        required_str(arguments, "initial_message")?,
        &string_list(arguments, "team_members"),
        arguments.get("is_private").and_then(Value::as_bool).unwrap_or(false),
    ))
}

fn request_input(arguments: &Value) -> Result<Value, HandlerError> {
    required_str(arguments, "context")?;
    Ok(mock_data::chat_human_input(
        required_str(arguments, "question")?,
        str_arg(arguments, "urgency").unwrap_or("normal"),
        u64_arg(arguments, "timeout_hours", 4),
        str_arg(arguments, "channel").unwrap_or("#security"),
    ))
}

fn security_alert(arguments: &Value) -> Result<Value, HandlerError> {
    required_str(arguments, "alert_details")?;
    Ok(mock_data::chat_security_alert(
        required_str(arguments, "alert_title")?,
        str_arg(arguments, "severity").unwrap_or("medium"),
        str_arg(arguments, "alert_id"),
        str_arg(arguments, "channel").unwrap_or("#security"),
    ))
}

fn investigation_update(arguments: &Value) -> Result<Value, HandlerError> {
    let incident_id = required_str(arguments, "incident_id")?;
    required_str(arguments, "update_message")?;
    let channel = match str_arg(arguments, "channel") {
        Some(channel) => channel.to_string(),
        None => mock_data::incident_channel(incident_id),
    };
    Ok(mock_data::chat_investigation_update(
        incident_id,
        &channel,
        arguments.get("findings").is_some(),
        arguments.get("next_steps").is_some(),
    ))
}

fn search_kb(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::kb_search(
        required_str(arguments, "query")?,
        str_arg(arguments, "space_key").unwrap_or(mock_data::SECURITY_SPACE),
        u64_arg(arguments, "limit", 10) as usize,
    ))
}

fn get_playbook(arguments: &Value) -> Result<Value, HandlerError> {
    let name = required_str(arguments, "playbook_name")?;
    let space = str_arg(arguments, "space_key").unwrap_or(mock_data::PLAYBOOK_SPACE);
    mock_data::kb_playbook(name, space).ok_or_else(|| {
        HandlerError::new(format!(
            "playbook '{}' not found in space {}; available: {}",
            name,
            space,
            mock_data::kb_titles(space).join(", ")
        ))
    })
}

fn create_doc(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::kb_create_page(
        required_str(arguments, "incident_id")?,
        required_str(arguments, "title")?,
        required_str(arguments, "content")?,
        str_arg(arguments, "space_key").unwrap_or(mock_data::SECURITY_SPACE),
        str_arg(arguments, "parent_page_id"),
    ))
}

fn update_doc(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::kb_update_page(
        required_str(arguments, "page_id")?,
        required_str(arguments, "additional_content")?,
        str_arg(arguments, "status_update"),
    ))
}

fn test_connection(arguments: &Value) -> Result<Value, HandlerError> {
    Ok(mock_data::connection_status(required_str(arguments, "integration")?))
}

/// The weekday report for `date`.
pub fn weekday_report(date: NaiveDate) -> Value {
    json!({
        "day_of_week": date.format("%A").to_string(),
        "date": date.format("%Y-%m-%d").to_string(),
        "iso_weekday": date.weekday().number_from_monday()
    })
}

fn current_weekday(_arguments: &Value) -> Result<Value, HandlerError> {
    Ok(weekday_report(Local::now().date_naive()))
}

// ── Catalog ───────────────────────────────────────────────────────────────────

fn stubbed(spec: ToolSpec, respond: StubFn, environments: &[&str]) -> Integration {
    let handler: Arc<dyn ToolHandler> = Arc::new(StubHandler::new(respond));
    environments
        .iter()
        .fold(Integration::new(spec), |integration, env| {
            integration.bind(*env, handler.clone())
        })
}

/// Every SOC integration with its stub bindings, in inventory order.
pub fn integrations() -> Vec<Integration> {
    let sandbox = [SANDBOX_ENVIRONMENT];
    vec![
        stubbed(siem_search_detections(), search_detections, &STUB_ENVIRONMENTS),
        stubbed(siem_search_iocs(), search_iocs, &sandbox),
        stubbed(siem_get_asset_context(), asset_context, &sandbox),
        stubbed(edr_get_host(), get_host, &STUB_ENVIRONMENTS),
        stubbed(edr_quarantine_host(), quarantine_host, &sandbox),
        stubbed(directory_lookup_user(), lookup_user, &STUB_ENVIRONMENTS),
        stubbed(sso_list_sessions(), list_sessions, &STUB_ENVIRONMENTS),
        stubbed(sso_revoke_sessions(), revoke_sessions, &sandbox),
        stubbed(cloud_list_instances(), list_instances, &STUB_ENVIRONMENTS),
        stubbed(cloud_security_findings(), security_findings, &STUB_ENVIRONMENTS),
        stubbed(ticket_create(), create_ticket, &STUB_ENVIRONMENTS),
        stubbed(ticket_update_findings(), update_ticket, &sandbox),
        stubbed(ticket_list_stale(), list_stale, &sandbox),
        stubbed(chat_notify(), notify, &sandbox),
        stubbed(chat_create_incident_channel(), create_channel, &sandbox),
        stubbed(chat_request_human_input(), request_input, &sandbox),
        stubbed(chat_send_security_alert(), security_alert, &sandbox),
        stubbed(chat_send_investigation_update(), investigation_update, &sandbox),
        stubbed(kb_search(), search_kb, &sandbox),
        stubbed(kb_get_playbook(), get_playbook, &sandbox),
        stubbed(kb_create_incident_doc(), create_doc, &sandbox),
        stubbed(kb_update_incident_doc(), update_doc, &sandbox),
        stubbed(integration_test_connection(), test_connection, &sandbox),
        stubbed(day_of_week(), current_weekday, &ALL_ENVIRONMENTS),
    ]
}

/// The catalog with stub bindings only.
pub fn default_catalog() -> EngageResult<IntegrationCatalog> {
    catalog_with_live(&[])
}

/// The catalog with stub bindings plus one `production` binding per live
/// binding.
///
/// # Errors
///
/// `EngageError::Config` when a binding names a tool the catalog does not
/// know, or its token variable is unset.
pub fn catalog_with_live(live: &[LiveBinding]) -> EngageResult<IntegrationCatalog> {
    let mut integrations = integrations();

    for binding in live {
        let Some(index) = integrations
            .iter()
            .position(|integration| integration.spec.name == binding.tool)
        else {
            return Err(EngageError::Config {
                reason: format!("live binding for unknown tool '{}'", binding.tool),
            });
        };
        let handler: Arc<dyn ToolHandler> = Arc::new(HttpToolHandler::from_binding(binding)?);
        let integration = integrations.remove(index);
        integrations.insert(index, integration.bind(LIVE_ENVIRONMENT, handler));
    }

    integrations
        .into_iter()
        .fold(IntegrationCatalog::builder(), |builder, integration| {
            builder.add(integration)
        })
        .build()
}

fn allowed(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| json!(v)).collect()
}

/// Argument checks that go beyond the JSON schema of each tool.
pub fn default_validator() -> SchemaValidator {
    let mut validator = SchemaValidator::new();

    for (tool, field, values) in [
        ("siem_search_detections", "severity", &SEVERITIES[..]),
        ("cloud_security_findings", "severity", &SEVERITIES[..]),
        ("siem_search_iocs", "ioc_type", &IOC_TYPES[..]),
        ("ticket_create", "priority", &PRIORITIES[..]),
        ("chat_request_human_input", "urgency", &URGENCIES[..]),
        ("chat_send_security_alert", "severity", &ALERT_SEVERITIES[..]),
        ("integration_test_connection", "integration", &mock_data::INTEGRATION_NAMES[..]),
    ] {
        validator.add_rule(
            tool,
            ArgumentRule::AllowedValues {
                field: field.to_string(),
                allowed: allowed(values),
            },
        );
    }

    for (tool, field, min, max) in [
        ("siem_search_detections", "hours_back", 1.0, 168.0),
        ("siem_get_asset_context", "hours_back", 1.0, 168.0),
        ("ticket_list_stale", "hours_old", 1.0, 720.0),
        ("chat_request_human_input", "timeout_hours", 1.0, 72.0),
        ("kb_search", "limit", 1.0, 50.0),
    ] {
        validator.add_rule(
            tool,
            ArgumentRule::Range {
                field: field.to_string(),
                min,
                max,
            },
        );
    }

    for (tool, field) in [
        ("siem_search_iocs", "ioc_value"),
        ("siem_get_asset_context", "asset_name"),
        ("edr_get_host", "hostname"),
        ("edr_quarantine_host", "hostname"),
        ("edr_quarantine_host", "reason"),
        ("directory_lookup_user", "username"),
        ("sso_list_sessions", "username"),
        ("sso_revoke_sessions", "username"),
        ("ticket_create", "summary"),
        ("ticket_update_findings", "ticket_id"),
        ("ticket_update_findings", "findings"),
        ("chat_notify", "message"),
        ("chat_create_incident_channel", "incident_id"),
        ("chat_request_human_input", "question"),
        ("chat_send_security_alert", "alert_title"),
        ("chat_send_investigation_update", "incident_id"),
        ("chat_send_investigation_update", "update_message"),
        ("kb_search", "query"),
        ("kb_get_playbook", "playbook_name"),
        ("kb_create_incident_doc", "incident_id"),
        ("kb_create_incident_doc", "title"),
        ("kb_update_incident_doc", "page_id"),
        ("kb_update_incident_doc", "additional_content"),
    ] {
        validator.add_rule(
            tool,
            ArgumentRule::NonBlank {
                field: field.to_string(),
            },
        );
    }

    for tool in [
        "chat_notify",
        "chat_request_human_input",
        "chat_send_security_alert",
        "chat_send_investigation_update",
    ] {
        validator.register_rule(
            tool,
            "channel-prefix",
            Box::new(|arguments: &Value| match arguments.get("channel").and_then(Value::as_str) {
                Some(channel) if !channel.starts_with('#') => {
                    Some(format!("channel '{}' must start with '#'", channel))
                }
                _ => None,
            }),
        );
    }

    validator
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use serde_json::json;

    use engage_contracts::error::{EngageError, ToolFault};
    use engage_environment::{EnvironmentConfig, EnvironmentResolver};

    use super::{catalog_with_live, default_catalog, default_validator, weekday_report};
    use crate::{live::LiveBinding, DEFAULT_ENVIRONMENTS};

    const WEEKDAYS: [&str; 7] = [
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
        "Sunday",
    ];

    fn resolver() -> EnvironmentResolver {
        EnvironmentResolver::new(
            Arc::new(default_catalog().unwrap()),
            EnvironmentConfig::from_toml_str(DEFAULT_ENVIRONMENTS).unwrap(),
        )
        .with_validator(Arc::new(default_validator()))
    }

    fn names(environment: &str) -> Vec<String> {
        resolver()
            .resolve(environment)
            .unwrap()
            .describe()
            .iter()
            .map(|spec| spec.name.clone())
            .collect()
    }

    #[test]
    fn test_environment_has_seven_stub_integrations_and_the_clock() {
        assert_eq!(
            names("test"),
            vec![
                "siem_search_detections",
                "edr_get_host",
                "directory_lookup_user",
                "sso_list_sessions",
                "cloud_list_instances",
                "cloud_security_findings",
                "ticket_create",
                "day_of_week",
            ]
        );
    }

    #[test]
    fn development_binds_every_stub() {
        let dev = names("development");
        assert_eq!(dev.len(), 24);
        for tool in [
            "edr_quarantine_host",
            "sso_revoke_sessions",
            "siem_search_iocs",
            "siem_get_asset_context",
            "ticket_update_findings",
            "ticket_list_stale",
            "chat_notify",
            "chat_create_incident_channel",
            "chat_request_human_input",
            "chat_send_security_alert",
            "chat_send_investigation_update",
            "kb_search",
            "kb_get_playbook",
            "kb_create_incident_doc",
            "kb_update_incident_doc",
            "integration_test_connection",
            "day_of_week",
        ] {
            assert!(dev.contains(&tool.to_string()), "missing {}", tool);
        }
    }

    #[test]
    fn production_without_live_bindings_has_only_the_clock() {
        assert_eq!(names("production"), vec!["day_of_week"]);
    }

    #[test]
    fn weekday_report_names_the_day() {
        let report = weekday_report(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(report["day_of_week"], "Monday");
        assert_eq!(report["date"], "2026-03-02");
        assert_eq!(report["iso_weekday"], 1);
    }

    #[tokio::test]
    async fn day_of_week_answers_in_every_environment() {
        for environment in ["development", "test", "production"] {
            let registry = resolver().resolve(environment).unwrap();
            let output = registry.invoke("day_of_week", &json!({})).await.unwrap();
            let day = output["day_of_week"].as_str().unwrap();
            assert!(WEEKDAYS.contains(&day), "unexpected weekday {}", day);
        }
    }

    #[tokio::test]
    async fn chat_is_unknown_in_test() {
        let registry = resolver().resolve("test").unwrap();
        match registry.invoke("chat_notify", &json!({ "channel": "#soc", "message": "hi" })).await {
            Err(ToolFault::UnknownTool { name }) => assert_eq!(name, "chat_notify"),
            other => panic!("expected UnknownTool, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn stub_handlers_answer_from_canned_data() {
        let registry = resolver().resolve("test").unwrap();

        let host = registry.invoke("edr_get_host", &json!({ "hostname": "ws-042" })).await.unwrap();
        assert_eq!(host["logged_in_users"][0], "jdoe");

        match registry.invoke("edr_get_host", &json!({ "hostname": "ghost" })).await {
            Err(ToolFault::Execution { message, .. }) => assert!(message.contains("not enrolled")),
            other => panic!("expected Execution, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn development_stubs_cover_chat_knowledge_base_and_tickets() {
        let registry = resolver().resolve("development").unwrap();

        let channel = registry
            .invoke(
                "chat_create_incident_channel",
                &json!({ "incident_id": "INC-7", "initial_message": "Triage started", "team_members": ["kwong"] }),
            )
            .await
            .unwrap();
        assert_eq!(channel["channel"], "#inc-inc-7");
        assert_eq!(channel["team_members"][0], "kwong");

        let update = registry
            .invoke(
                "chat_send_investigation_update",
                &json!({ "incident_id": "INC-7", "update_message": "Host isolated", "findings": "C2 confirmed" }),
            )
            .await
            .unwrap();
        assert_eq!(update["channel"], "#inc-inc-7");
        assert_eq!(update["has_findings"], true);
        assert_eq!(update["has_next_steps"], false);

        let articles = registry
            .invoke("kb_search", &json!({ "query": "powershell" }))
            .await
            .unwrap();
        assert_eq!(articles["results"][0]["title"], "PowerShell Attack Investigation Procedures");

        match registry
            .invoke("kb_get_playbook", &json!({ "playbook_name": "ransomware" }))
            .await
        {
            Err(ToolFault::Execution { message, .. }) => {
                assert!(message.contains("Phishing Response"))
            }
            other => panic!("expected Execution, got {:?}", other),
        }

        let updated = registry
            .invoke(
                "ticket_update_findings",
                &json!({ "ticket_id": "SEC-311", "findings": "benign scanner", "add_labels": ["fp"] }),
            )
            .await
            .unwrap();
        assert_eq!(updated["labels_added"], json!(["fp"]));
        assert_eq!(updated["status_updated"], false);

        let stale = registry
            .invoke("ticket_list_stale", &json!({ "hours_old": 48 }))
            .await
            .unwrap();
        assert_eq!(stale["count"], 1);

        let ioc = registry
            .invoke("siem_search_iocs", &json!({ "ioc_value": "203.0.113.77" }))
            .await
            .unwrap();
        assert_eq!(ioc["type"], "ip");
        assert_eq!(ioc["associated_assets"][0], "ws-042");

        let status = registry
            .invoke("integration_test_connection", &json!({ "integration": "knowledge_base" }))
            .await
            .unwrap();
        assert_eq!(status["connected"], true);
    }

    #[tokio::test]
    async fn semantic_rules_reject_bad_arguments() {
        let registry = resolver().resolve("development").unwrap();

        let result = registry
            .invoke("siem_search_detections", &json!({ "hours_back": 1000 }))
            .await;
        match result {
            Err(ToolFault::InvalidArguments { reason, .. }) => assert!(reason.contains("hours_back")),
            other => panic!("expected InvalidArguments, got {:?}", other),
        }

        for (tool, arguments) in [
            ("ticket_create", json!({ "summary": " ", "description": "x" })),
            ("chat_request_human_input", json!({ "question": "Isolate?", "context": "c", "urgency": "asap" })),
            ("chat_send_security_alert", json!({ "alert_title": "t", "alert_details": "d", "channel": "security" })),
            ("siem_search_iocs", json!({ "ioc_value": "x", "ioc_type": "url" })),
            ("kb_search", json!({ "query": "powershell", "limit": 0 })),
            ("integration_test_connection", json!({ "integration": "pager" })),
            ("ticket_update_findings", json!({ "ticket_id": "SEC-1", "findings": "f", "add_labels": [1] })),
        ] {
            let result = registry.invoke(tool, &arguments).await;
            assert!(
                matches!(result, Err(ToolFault::InvalidArguments { .. })),
                "{} accepted {}: {:?}",
                tool,
                arguments,
                result
            );
        }
    }

    #[test]
    fn live_binding_for_unknown_tool_is_rejected() {
        let binding = LiveBinding {
            tool: "pager_page".to_string(),
            url: "https://pager.example.test/page".to_string(),
            token_env: None,
        };
        match catalog_with_live(&[binding]) {
            Err(EngageError::Config { reason }) => assert!(reason.contains("pager_page")),
            other => panic!("expected Config, got {:?}", other),
        }
    }

    #[test]
    fn live_binding_appears_in_production() {
        let binding = LiveBinding {
            tool: "chat_notify".to_string(),
            url: "https://chat.example.test/hooks/soc".to_string(),
            token_env: None,
        };
        let catalog = catalog_with_live(&[binding]).unwrap();
        let resolver = EnvironmentResolver::new(
            Arc::new(catalog),
            EnvironmentConfig::from_toml_str(DEFAULT_ENVIRONMENTS).unwrap(),
        );

        let production = resolver.resolve("production").unwrap();
        assert_eq!(production.len(), 2);
        assert!(production.contains("chat_notify"));
        assert!(!resolver.resolve("test").unwrap().contains("chat_notify"));
    }
}
