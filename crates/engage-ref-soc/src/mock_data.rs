//! Canned SOC data for the stub integrations.
//!
//! All data in this module is hardcoded and fictional. No external systems are
//! contacted. Timestamps are fixed so transcripts are stable between runs.

use serde_json::{json, Value};

// ── SIEM detections (mock) ────────────────────────────────────────────────────

/// Detections raised in the last `hours_back` hours, optionally filtered by
/// severity (case-insensitive).
///
/// Known detections:
/// - det-1001 HIGH     encoded PowerShell on ws-042 (user jdoe), 2 hours old
/// - det-1002 MEDIUM   impossible travel sign-in for asmith, 9 hours old
/// - det-1003 LOW      port scan from a build agent, 30 hours old
pub fn siem_detections(hours_back: u64, severity: Option<&str>) -> Value {
    let all = [
        (
            2,
            json!({
                "id": "det-1001",
                "title": "Suspicious PowerShell Activity",
                "severity": "HIGH",
                "rule_name": "Encoded PowerShell Execution",
                "detected_at": "2026-03-02T07:41:09Z",
                "affected_assets": ["ws-042"],
                "user": "jdoe",
                "confidence": 0.85
            }),
        ),
        (
            9,
            json!({
                "id": "det-1002",
                "title": "Impossible Travel Sign-in",
                "severity": "MEDIUM",
                "rule_name": "Geo-velocity Anomaly",
                "detected_at": "2026-03-02T00:12:44Z",
                "affected_assets": [],
                "user": "asmith",
                "confidence": 0.62
            }),
        ),
        (
            30,
            json!({
                "id": "det-1003",
                "title": "Internal Port Scan",
                "severity": "LOW",
                "rule_name": "Horizontal Scan",
                "detected_at": "2026-03-01T03:05:51Z",
                "affected_assets": ["build-07"],
                "user": null,
                "confidence": 0.40
            }),
        ),
    ];

    let detections: Vec<Value> = all
        .into_iter()
        .filter(|(age, _)| *age <= hours_back)
        .map(|(_, detection)| detection)
        .filter(|detection| match severity {
            Some(wanted) => detection["severity"]
                .as_str()
                .is_some_and(|s| s.eq_ignore_ascii_case(wanted)),
            None => true,
        })
        .collect();

    json!({
        "hours_back": hours_back,
        "count": detections.len(),
        "detections": detections
    })
}

/// Prevalence and reputation of an indicator. `ioc_type` "auto" is resolved
/// from the shape of the value.
pub fn siem_ioc(ioc_value: &str, ioc_type: &str) -> Value {
    let resolved = if ioc_type == "auto" {
        infer_ioc_type(ioc_value)
    } else {
        ioc_type
    };
    match ioc_value.to_lowercase().as_str() {
        "203.0.113.77" => json!({
            "ioc": ioc_value,
            "type": resolved,
            "first_seen": "2026-03-02T07:41:30Z",
            "last_seen": "2026-03-02T07:58:02Z",
            "prevalence": "rare",
            "associated_assets": ["ws-042"],
            "threat_intelligence": { "malicious": true, "suspicious": true, "sources": ["internal_analysis", "partner_feed"] }
        }),
        "update-check.example.net" => json!({
            "ioc": ioc_value,
            "type": resolved,
            "first_seen": "2026-02-11T10:00:00Z",
            "last_seen": "2026-03-02T06:00:00Z",
            "prevalence": "common",
            "associated_assets": ["ws-042", "build-07"],
            "threat_intelligence": { "malicious": false, "suspicious": false, "sources": [] }
        }),
        _ => json!({
            "ioc": ioc_value,
            "type": resolved,
            "first_seen": null,
            "last_seen": null,
            "prevalence": "unseen",
            "associated_assets": [],
            "threat_intelligence": { "malicious": false, "suspicious": false, "sources": [] }
        }),
    }
}

fn infer_ioc_type(value: &str) -> &'static str {
    if value.parse::<std::net::IpAddr>().is_ok() {
        "ip"
    } else if matches!(value.len(), 32 | 40 | 64) && value.chars().all(|c| c.is_ascii_hexdigit()) {
        "hash"
    } else if value.contains('.') {
        "domain"
    } else {
        "unknown"
    }
}

/// SIEM timeline, connections and user activity for an asset, or `None` for
/// an asset the SIEM has never seen.
pub fn siem_asset_context(asset_name: &str, hours_back: u64) -> Option<Value> {
    match asset_name.to_lowercase().as_str() {
        "ws-042" => Some(json!({
            "asset_name": "ws-042",
            "hours_back": hours_back,
            "last_seen": "2026-03-02T09:38:00Z",
            "timeline": [
                { "timestamp": "2026-03-02T07:40:55Z", "event_type": "process_creation", "process": "winword.exe", "parent_process": "explorer.exe" },
                { "timestamp": "2026-03-02T07:41:09Z", "event_type": "process_creation", "process": "powershell.exe", "command_line": "powershell.exe -nop -w hidden -enc SQBFAFgA...", "parent_process": "winword.exe" }
            ],
            "network_connections": [
                { "timestamp": "2026-03-02T07:41:30Z", "destination_ip": "203.0.113.77", "port": 443, "protocol": "HTTPS" }
            ],
            "user_activity": [
                { "timestamp": "2026-03-02T06:58:00Z", "user": "jdoe", "action": "login" }
            ]
        })),
        "build-07" => Some(json!({
            "asset_name": "build-07",
            "hours_back": hours_back,
            "last_seen": "2026-03-02T09:40:12Z",
            "timeline": [],
            "network_connections": [],
            "user_activity": [
                { "timestamp": "2026-03-01T03:00:00Z", "user": "svc-ci", "action": "login" }
            ]
        })),
        _ => None,
    }
}

// ── EDR (mock) ────────────────────────────────────────────────────────────────

/// Host context for a known endpoint, or `None` for an unknown hostname.
pub fn edr_host(hostname: &str) -> Option<Value> {
    match hostname.to_lowercase().as_str() {
        "ws-042" => Some(json!({
            "hostname": "ws-042",
            "os": "Windows 11 23H2",
            "last_seen": "2026-03-02T09:38:00Z",
            "logged_in_users": ["jdoe"],
            "isolation_status": "not_isolated",
            "recent_processes": [
                {
                    "process": "powershell.exe",
                    "command_line": "powershell.exe -nop -w hidden -enc SQBFAFgA...",
                    "parent_process": "winword.exe"
                }
            ],
            "network_connections": [
                { "destination_ip": "203.0.113.77", "port": 443, "protocol": "HTTPS" }
            ]
        })),
        "build-07" => Some(json!({
            "hostname": "build-07",
            "os": "Ubuntu 22.04",
            "last_seen": "2026-03-02T09:40:12Z",
            "logged_in_users": ["svc-ci"],
            "isolation_status": "not_isolated",
            "recent_processes": [],
            "network_connections": []
        })),
        _ => None,
    }
}

/// Acknowledgement for a simulated host isolation.
pub fn edr_quarantine(hostname: &str, reason: &str) -> Value {
    json!({
        "hostname": hostname,
        "isolation_status": "isolation_pending",
        "reason": reason,
        "simulated": true
    })
}

// ── Directory (mock) ──────────────────────────────────────────────────────────

/// Directory entry for a known user, or `None`.
pub fn directory_user(username: &str) -> Option<Value> {
    match username.to_lowercase().as_str() {
        "jdoe" => Some(json!({
            "username": "jdoe",
            "display_name": "Jamie Doe",
            "department": "Finance",
            "title": "Accounts Payable Specialist",
            "manager": "kwong",
            "privileged": false,
            "account_enabled": true
        })),
        "asmith" => Some(json!({
            "username": "asmith",
            "display_name": "Alex Smith",
            "department": "Engineering",
            "title": "Site Reliability Engineer",
            "manager": "mlopez",
            "privileged": true,
            "account_enabled": true
        })),
        _ => None,
    }
}

// ── SSO (mock) ────────────────────────────────────────────────────────────────

/// Active SSO sessions of `username`.
pub fn sso_sessions(username: &str) -> Value {
    let sessions = match username.to_lowercase().as_str() {
        "jdoe" => json!([
            { "session_id": "sess-77a1", "ip": "198.51.100.23", "country": "US", "app": "Outlook", "started_at": "2026-03-02T06:58:00Z" }
        ]),
        "asmith" => json!([
            { "session_id": "sess-90c4", "ip": "198.51.100.40", "country": "US", "app": "Console", "started_at": "2026-03-01T23:40:00Z" },
            { "session_id": "sess-90c9", "ip": "192.0.2.201", "country": "BR", "app": "Console", "started_at": "2026-03-02T00:11:00Z" }
        ]),
        _ => json!([]),
    };
    json!({ "username": username, "sessions": sessions })
}

/// Acknowledgement for a simulated session revocation.
pub fn sso_revoke(username: &str) -> Value {
    json!({
        "username": username,
        "revoked_sessions": sso_sessions(username)["sessions"].as_array().map_or(0, Vec::len),
        "simulated": true
    })
}

// ── Cloud (mock) ──────────────────────────────────────────────────────────────

/// Compute instances, optionally restricted to one region.
pub fn cloud_instances(region: Option<&str>) -> Value {
    let all = json!([
        { "instance_id": "i-0a12", "name": "payments-api-1", "region": "us-east-1", "state": "running", "public_ip": null },
        { "instance_id": "i-0b34", "name": "bastion", "region": "us-east-1", "state": "running", "public_ip": "203.0.113.10" },
        { "instance_id": "i-0c56", "name": "analytics-etl", "region": "eu-west-1", "state": "stopped", "public_ip": null }
    ]);
    let instances: Vec<Value> = all
        .as_array()
        .into_iter()
        .flatten()
        .filter(|i| region.map_or(true, |r| i["region"] == r))
        .cloned()
        .collect();
    json!({ "count": instances.len(), "instances": instances })
}

/// Open cloud security posture findings, optionally filtered by severity.
pub fn cloud_findings(severity: Option<&str>) -> Value {
    let all = json!([
        { "finding_id": "csf-201", "severity": "HIGH", "resource": "s3://finance-exports", "title": "Bucket allows public read" },
        { "finding_id": "csf-202", "severity": "MEDIUM", "resource": "i-0b34", "title": "SSH open to 0.0.0.0/0" },
        { "finding_id": "csf-203", "severity": "LOW", "resource": "iam-user/legacy-ci", "title": "Access key older than 90 days" }
    ]);
    let findings: Vec<Value> = all
        .as_array()
        .into_iter()
        .flatten()
        .filter(|f| {
            severity.map_or(true, |s| {
                f["severity"].as_str().is_some_and(|v| v.eq_ignore_ascii_case(s))
            })
        })
        .cloned()
        .collect();
    json!({ "count": findings.len(), "findings": findings })
}

// ── Ticketing (mock) ──────────────────────────────────────────────────────────

/// A created ticket. The key is derived from the summary so repeated runs
/// produce the same key.
pub fn ticket(summary: &str, description: &str, priority: &str) -> Value {
    let key = format!("SEC-{}", 100 + summary.len() % 900);
    json!({
        "ticket_id": key,
        "summary": summary,
        "description": description,
        "priority": priority,
        "status": "Open",
        "url": format!("https://tickets.example.test/browse/{}", key)
    })
}

/// Acknowledgement for findings appended to a ticket.
pub fn ticket_update(ticket_id: &str, findings: &str, status: Option<&str>, labels: &[String]) -> Value {
    json!({
        "ticket_id": ticket_id,
        "findings_added": true,
        "findings_length": findings.len(),
        "status_updated": status.is_some(),
        "new_status": status,
        "labels_added": labels
    })
}

/// Tickets not updated for at least `hours_old` hours, optionally filtered by
/// status (case-insensitive).
pub fn stale_tickets(hours_old: u64, status: Option<&str>) -> Value {
    let all = [
        json!({ "ticket_id": "SEC-311", "summary": "Suspicious network activity on build-07", "status": "In Progress", "assignee": "kwong", "priority": "High", "age_hours": 25 }),
        json!({ "ticket_id": "SEC-298", "summary": "Phishing report from Finance", "status": "Open", "assignee": null, "priority": "Medium", "age_hours": 52 }),
        json!({ "ticket_id": "SEC-305", "summary": "Expired access key on legacy-ci", "status": "Open", "assignee": "mlopez", "priority": "Low", "age_hours": 12 }),
    ];
    let tickets: Vec<Value> = all
        .into_iter()
        .filter(|t| t["age_hours"].as_u64().is_some_and(|age| age >= hours_old))
        .filter(|t| {
            status.map_or(true, |wanted| {
                t["status"].as_str().is_some_and(|s| s.eq_ignore_ascii_case(wanted))
            })
        })
        .collect();
    json!({ "hours_old": hours_old, "count": tickets.len(), "tickets": tickets })
}

// ── Chat (mock) ───────────────────────────────────────────────────────────────

pub fn chat_message(channel: &str, message: &str) -> Value {
    json!({ "channel": channel, "delivered": true, "length": message.len() })
}

/// Users paged automatically for high and critical requests.
pub const ESCALATION_USERS: [&str; 2] = ["soc-lead", "ir-oncall"];

fn escalation_for(urgency: &str) -> Vec<&'static str> {
    if matches!(urgency, "high" | "critical") {
        ESCALATION_USERS.to_vec()
    } else {
        Vec::new()
    }
}

/// The channel an incident's traffic goes to.
pub fn incident_channel(incident_id: &str) -> String {
    format!("#inc-{}", incident_id.to_lowercase())
}

pub fn chat_incident_channel(
    incident_id: &str,
    initial_message: &str,
    team_members: &[String],
    is_private: bool,
) -> Value {
    json!({
        "ok": true,
        "channel": incident_channel(incident_id),
        "incident_id": incident_id,
        "is_private": is_private,
        "initial_message": initial_message,
        "team_members": team_members,
        "channel_type": "incident_response"
    })
}

/// A posted request for an analyst decision. The request id is derived from
/// the question so repeated runs produce the same id.
pub fn chat_human_input(question: &str, urgency: &str, timeout_hours: u64, channel: &str) -> Value {
    json!({
        "ok": true,
        "request_id": format!("req-{}", 1000 + question.len() % 9000),
        "channel": channel,
        "question": question,
        "urgency": urgency,
        "timeout_hours": timeout_hours,
        "escalated_to": escalation_for(urgency),
        "message_type": "human_input_request"
    })
}

pub fn chat_security_alert(title: &str, severity: &str, alert_id: Option<&str>, channel: &str) -> Value {
    let escalated_to = escalation_for(severity);
    json!({
        "ok": true,
        "channel": channel,
        "alert_title": title,
        "alert_id": alert_id,
        "severity": severity,
        "escalated": !escalated_to.is_empty(),
        "escalated_to": escalated_to,
        "message_type": "security_alert"
    })
}

pub fn chat_investigation_update(
    incident_id: &str,
    channel: &str,
    has_findings: bool,
    has_next_steps: bool,
) -> Value {
    json!({
        "ok": true,
        "channel": channel,
        "incident_id": incident_id,
        "update_type": "investigation_update",
        "has_findings": has_findings,
        "has_next_steps": has_next_steps
    })
}

// ── Knowledge base (mock) ─────────────────────────────────────────────────────

pub const SECURITY_SPACE: &str = "SEC";
pub const PLAYBOOK_SPACE: &str = "PLAYBOOKS";

const KB_URL: &str = "https://wiki.example.test/display";

/// Knowledge base articles: (page id, space, title, labels, excerpt).
const ARTICLES: [(&str, &str, &str, &[&str], &str); 4] = [
    (
        "40121",
        SECURITY_SPACE,
        "PowerShell Attack Investigation Procedures",
        &["security", "procedures", "powershell"],
        "Decode the command line, pull the parent process tree and check outbound connections.",
    ),
    (
        "40188",
        SECURITY_SPACE,
        "Impossible Travel Triage",
        &["security", "kb", "identity"],
        "Compare session sources against VPN egress ranges before revoking sessions.",
    ),
    (
        "40207",
        SECURITY_SPACE,
        "Public Storage Bucket Response",
        &["security", "kb", "cloud"],
        "Confirm the data classification, then remove the public grant and rotate keys.",
    ),
    (
        "51002",
        PLAYBOOK_SPACE,
        "Phishing Response",
        &["playbook", "email"],
        "Pull the message, search for other recipients and block the sender domain.",
    ),
];

/// Articles whose title, labels or excerpt mention any word of `query`,
/// most matching words first.
pub fn kb_search(query: &str, space: &str, limit: usize) -> Value {
    let words: Vec<String> = query
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();

    let mut hits: Vec<(usize, Value)> = ARTICLES
        .iter()
        .filter(|(_, article_space, ..)| article_space.eq_ignore_ascii_case(space))
        .filter_map(|(page_id, article_space, title, labels, excerpt)| {
            let haystack = format!("{} {} {}", title, labels.join(" "), excerpt).to_lowercase();
            let score = words.iter().filter(|w| haystack.contains(w.as_str())).count();
            (score > 0).then(|| {
                (
                    score,
                    json!({
                        "page_id": page_id,
                        "title": title,
                        "space": article_space,
                        "labels": labels,
                        "excerpt": excerpt,
                        "url": format!("{}/{}/{}", KB_URL, article_space, page_id),
                        "relevance_score": score as f64 / words.len().max(1) as f64
                    }),
                )
            })
        })
        .collect();
    hits.sort_by(|a, b| b.0.cmp(&a.0));

    let results: Vec<Value> = hits.into_iter().take(limit).map(|(_, v)| v).collect();
    json!({ "query": query, "space": space, "count": results.len(), "results": results })
}

/// Full content of a playbook page, matched by case-insensitive title
/// substring, or `None`.
pub fn kb_playbook(name: &str, space: &str) -> Option<Value> {
    let wanted = name.to_lowercase();
    ARTICLES
        .iter()
        .find(|(_, article_space, title, ..)| {
            article_space.eq_ignore_ascii_case(space) && title.to_lowercase().contains(&wanted)
        })
        .map(|(page_id, article_space, title, labels, excerpt)| {
            json!({
                "name": name,
                "title": title,
                "page_id": page_id,
                "space": article_space,
                "labels": labels,
                "content": format!("## {}\n\n{}", title, excerpt),
                "url": format!("{}/{}/{}", KB_URL, article_space, page_id)
            })
        })
}

/// Titles available in `space`.
pub fn kb_titles(space: &str) -> Vec<&'static str> {
    ARTICLES
        .iter()
        .filter(|(_, article_space, ..)| article_space.eq_ignore_ascii_case(space))
        .map(|(_, _, title, ..)| *title)
        .collect()
}

/// A created incident page. The title is prefixed with the incident id
/// unless it already contains it.
pub fn kb_create_page(incident_id: &str, title: &str, content: &str, space: &str, parent: Option<&str>) -> Value {
    let title = if title.contains(incident_id) {
        title.to_string()
    } else {
        format!("[{}] {}", incident_id, title)
    };
    let page_id = format!("7{:04}", content.len() % 10_000);
    json!({
        "page_id": page_id,
        "title": title,
        "space": space,
        "parent_page_id": parent,
        "incident_id": incident_id,
        "version": 1,
        "url": format!("{}/{}/{}", KB_URL, space, page_id)
    })
}

pub fn kb_update_page(page_id: &str, additional_content: &str, status: Option<&str>) -> Value {
    json!({
        "page_id": page_id,
        "content_added": true,
        "added_length": additional_content.len(),
        "status_updated": status.is_some(),
        "new_status": status
    })
}

// ── Connectivity (mock) ───────────────────────────────────────────────────────

pub const INTEGRATION_NAMES: [&str; 8] = [
    "siem",
    "edr",
    "directory",
    "sso",
    "cloud",
    "ticketing",
    "chat",
    "knowledge_base",
];

pub fn connection_status(integration: &str) -> Value {
    json!({ "integration": integration, "connected": true, "simulated": true })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detections_respect_window_and_severity() {
        assert_eq!(siem_detections(24, None)["count"], 2);
        assert_eq!(siem_detections(72, None)["count"], 3);

        let high = siem_detections(24, Some("high"));
        assert_eq!(high["count"], 1);
        assert_eq!(high["detections"][0]["id"], "det-1001");
    }

    #[test]
    fn unknown_host_and_user_are_none() {
        assert!(edr_host("WS-042").is_some());
        assert!(edr_host("nope").is_none());
        assert!(directory_user("nobody").is_none());
    }

    #[test]
    fn cloud_filters_apply() {
        assert_eq!(cloud_instances(Some("eu-west-1"))["count"], 1);
        assert_eq!(cloud_instances(None)["count"], 3);
        assert_eq!(cloud_findings(Some("MEDIUM"))["findings"][0]["finding_id"], "csf-202");
    }

    #[test]
    fn ticket_key_is_stable() {
        assert_eq!(ticket("a", "b", "High")["ticket_id"], ticket("a", "c", "Low")["ticket_id"]);
    }

    #[test]
    fn ioc_type_is_inferred_for_auto() {
        assert_eq!(siem_ioc("203.0.113.77", "auto")["type"], "ip");
        assert_eq!(siem_ioc("203.0.113.77", "auto")["threat_intelligence"]["malicious"], true);
        assert_eq!(siem_ioc("update-check.example.net", "auto")["type"], "domain");
        assert_eq!(siem_ioc(&"ab".repeat(32), "auto")["type"], "hash");
        assert_eq!(siem_ioc("1.2.3.4", "domain")["type"], "domain");
        assert_eq!(siem_ioc("1.2.3.4", "auto")["prevalence"], "unseen");
    }

    #[test]
    fn stale_tickets_respect_age_and_status() {
        assert_eq!(stale_tickets(24, None)["count"], 2);
        assert_eq!(stale_tickets(1, None)["count"], 3);
        let open = stale_tickets(24, Some("open"));
        assert_eq!(open["count"], 1);
        assert_eq!(open["tickets"][0]["ticket_id"], "SEC-298");
    }

    #[test]
    fn high_urgency_requests_escalate() {
        let normal = chat_human_input("Isolate ws-042?", "normal", 4, "#soc");
        assert_eq!(normal["escalated_to"].as_array().unwrap().len(), 0);
        let high = chat_human_input("Isolate ws-042?", "high", 4, "#soc");
        assert_eq!(high["escalated_to"][0], "soc-lead");
        assert_eq!(normal["request_id"], high["request_id"]);
        assert_eq!(chat_security_alert("x", "critical", None, "#soc")["escalated"], true);
    }

    #[test]
    fn kb_search_ranks_and_limits() {
        let results = kb_search("powershell investigation", SECURITY_SPACE, 10);
        assert_eq!(results["count"], 1);
        assert_eq!(results["results"][0]["page_id"], "40121");

        let broad = kb_search("security", SECURITY_SPACE, 2);
        assert_eq!(broad["count"], 2);

        assert_eq!(kb_search("phishing", SECURITY_SPACE, 10)["count"], 0);
        assert_eq!(kb_search("phishing", PLAYBOOK_SPACE, 10)["count"], 1);
    }

    #[test]
    fn kb_playbook_matches_title_substring() {
        let page = kb_playbook("phishing", PLAYBOOK_SPACE).unwrap();
        assert_eq!(page["title"], "Phishing Response");
        assert!(kb_playbook("ransomware", PLAYBOOK_SPACE).is_none());
        assert_eq!(kb_titles(PLAYBOOK_SPACE), vec!["Phishing Response"]);
    }

    #[test]
    fn kb_page_title_carries_incident_id_once() {
        let page = kb_create_page("INC-7", "PowerShell on ws-042", "body", SECURITY_SPACE, None);
        assert_eq!(page["title"], "[INC-7] PowerShell on ws-042");
        let page = kb_create_page("INC-7", "INC-7 summary", "body", SECURITY_SPACE, None);
        assert_eq!(page["title"], "INC-7 summary");
    }
}
