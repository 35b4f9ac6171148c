//! Markdown playbook loader.
//!
//! A playbook is a markdown document with an optional YAML directive block at
//! the very top:
//!
//! ```text
//! ---
//! allowed_tools: [siem_search_detections, edr_get_host]
//! environments: test, production
//! allow_destructive: false
//! owner: soc-tier1
//! ---
//! # Triage new detections
//!
//! Review the detections from the last 24 hours ...
//! ```
//!
//! Everything after the block is the mission and is kept verbatim. Unknown
//! scalar directives are carried as metadata; they never cause rejection.

use std::{collections::BTreeSet, path::Path};

use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use serde_yaml::{Mapping, Value as YamlValue};
use tracing::debug;

use engage_contracts::{
    error::{EngageError, EngageResult},
    playbook::Playbook,
};

const DELIMITER: &str = "---";

/// Turns playbook text into a `Playbook`.
pub struct PlaybookLoader;

impl PlaybookLoader {
    /// Parse playbook text. Performs no I/O.
    ///
    /// # Errors
    ///
    /// `EngageError::Parse` when the directive block is not a YAML mapping, carries a recognized directive of the wrong type, or when
    /// the body has no textual content.
    pub fn parse(text: &str) -> EngageResult<Playbook> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let (directives, body) = split_directives(text)?;

        let (has_text, heading) = scan_body(body);
        if !has_text {
            return Err(parse_error("no mission section"));
        }

        let mut playbook = Playbook::from_mission(body);
        if let Some(directives) = directives {
            apply_directives(&mut playbook, &directives)?;
        }
        if let Some(heading) = heading {
            playbook
                .metadata
                .entry("title".to_string())
                .or_insert(heading);
        }

        debug!(
            title = playbook.title().unwrap_or(""),
            allowed_tools = playbook.allowed_tools.as_ref().map_or(0, BTreeSet::len),
            allow_destructive = playbook.allow_destructive,
            "playbook parsed"
        );
        Ok(playbook)
    }

    /// Read and parse a playbook file.
    pub fn from_file(path: impl AsRef<Path>) -> EngageResult<Playbook> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| EngageError::Io {
            reason: format!("failed to read playbook '{}': {}", path.display(), e),
        })?;
        Self::parse(&text)
    }
}

fn parse_error(reason: impl Into<String>) -> EngageError {
    EngageError::Parse {
        reason: reason.into(),
    }
}

/// Split off the directive block, if the document opens with one.
///
/// Returns the parsed mapping and the body that follows the closing delimiter.
fn split_directives(text: &str) -> EngageResult<(Option<Mapping>, &str)> {
    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return Ok((None, text));
    };
    if first.trim_end() != DELIMITER {
        return Ok((None, text));
    }

    let block_start = first.len();
    let mut offset = block_start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            let block = &text[block_start..offset];
            let body = &text[offset + line.len()..];
            return Ok((Some(parse_block(block)?), body));
        }
        offset += line.len();
    }

    // A lone leading `---` is a markdown horizontal rule.
    debug!("leading '---' has no closing delimiter, treating it as body text");
    Ok((None, text))
}

fn parse_block(block: &str) -> EngageResult<Mapping> {
    if block.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let value: YamlValue = serde_yaml::from_str(block)
        .map_err(|e| parse_error(format!("invalid directive block: {}", e)))?;
    match value {
        YamlValue::Mapping(mapping) => Ok(mapping),
        // An empty block parses as null.
        YamlValue::Null => Ok(Mapping::new()),
        _ => Err(parse_error("directive block must be a YAML mapping")),
    }
}

fn apply_directives(playbook: &mut Playbook, directives: &Mapping) -> EngageResult<()> {
    for (key, value) in directives {
        let Some(key) = scalar_to_string(key) else {
            continue;
        };
        match key.as_str() {
            "allowed_tools" => playbook.allowed_tools = Some(name_set(&key, value)?),
            "environments" => playbook.environments = Some(name_set(&key, value)?),
            "allow_destructive" => {
                playbook.allow_destructive = value
                    .as_bool()
                    .ok_or_else(|| parse_error("allow_destructive must be true or false"))?;
            }
            _ => {
                // Non-scalar unknown directives are ignored.
                if let Some(text) = scalar_to_string(value) {
                    playbook.metadata.insert(key, text);
                }
            }
        }
    }
    Ok(())
}

/// A list of names, given as a YAML sequence or a comma-separated string.
fn name_set(key: &str, value: &YamlValue) -> EngageResult<BTreeSet<String>> {
    let names: Vec<String> = match value {
        YamlValue::Sequence(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| parse_error(format!("{} entries must be strings", key)))
            })
            .collect::<EngageResult<_>>()?,
        YamlValue::String(list) => list.split(',').map(str::to_string).collect(),
        _ => {
            return Err(parse_error(format!(
                "{} must be a list or a comma-separated string",
                key
            )))
        }
    };

    Ok(names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

fn scalar_to_string(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Whether the markdown has any text, and the text of its first heading.
fn scan_body(body: &str) -> (bool, Option<String>) {
    let mut has_text = false;
    let mut heading: Option<String> = None;
    let mut in_first_heading = false;
    let mut heading_done = false;

    for event in Parser::new(body) {
        match event {
            Event::Start(Tag::Heading { .. }) if !heading_done => {
                in_first_heading = true;
                heading = Some(String::new());
            }
            Event::End(TagEnd::Heading(_)) if in_first_heading => {
                in_first_heading = false;
                heading_done = true;
            }
            Event::Text(text) | Event::Code(text) => {
                if !text.trim().is_empty() {
                    has_text = true;
                }
                if in_first_heading {
                    if let Some(heading) = heading.as_mut() {
                        heading.push_str(&text);
                    }
                }
            }
            _ => {}
        }
    }

    let heading = heading
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty());
    (has_text, heading)
}
