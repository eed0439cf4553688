//! Workflow YAML loading

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use super::{ConfigError, WorkflowDefinition};

/// Top-level keys starting with this prefix are workflow definitions
pub const WORKFLOW_PREFIX: &str = "workflow";

/// Read the top-level mapping of a YAML file.
///
/// A missing or unreadable file is an error. A document that does not parse
/// as a mapping is logged and read as empty. Repeated keys keep the last
/// value.
pub fn load(path: &Path) -> Result<BTreeMap<String, Value>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    Ok(parse(&content, path))
}

fn parse(content: &str, path: &Path) -> BTreeMap<String, Value> {
    match serde_yaml::from_str::<TopLevel>(content) {
        Ok(TopLevel(entries)) => {
            log::debug!("Read {} top-level keys from {}", entries.len(), path.display());
            entries
        }
        Err(e) => {
            log::error!("Error parsing yaml file {}: {e}", path.display());
            BTreeMap::new()
        }
    }
}

/// Keep the `workflow*` entries and read them as definitions
pub fn workflows(
    raw: &BTreeMap<String, Value>,
) -> Result<BTreeMap<String, WorkflowDefinition>, ConfigError> {
    let mut definitions = BTreeMap::new();

    for (name, value) in raw {
        if !name.starts_with(WORKFLOW_PREFIX) {
            log::debug!("Ignoring top-level key '{name}'");
            continue;
        }

        let definition = if value.is_null() {
            WorkflowDefinition::default()
        } else {
            serde_yaml::from_value(value.clone()).map_err(|e| ConfigError::InvalidWorkflow {
                workflow: name.clone(),
                reason: e.to_string(),
            })?
        };
        definitions.insert(name.clone(), definition);
    }

    log::info!("Workflow data read: {} workflows found", definitions.len());
    Ok(definitions)
}

// ============================================================================
// Top-level mapping
// ============================================================================

/// The document root, tolerant of an empty document and of repeated keys
struct TopLevel(BTreeMap<String, Value>);

impl<'de> Deserialize<'de> for TopLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TopLevelVisitor)
    }
}

struct TopLevelVisitor;

impl<'de> Visitor<'de> for TopLevelVisitor {
    type Value = TopLevel;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping of workflow definitions")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(TopLevel(BTreeMap::new()))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(TopLevel(BTreeMap::new()))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some((key, value)) = map.next_entry::<Value, Value>()? {
            match key_string(&key) {
                Some(key) => {
                    if entries.insert(key.clone(), value).is_some() {
                        log::warn!("Duplicate top-level key '{key}'; the later one wins");
                    }
                }
                None => log::warn!("Skipping top-level key that is not a scalar: {key:?}"),
            }
        }
        Ok(TopLevel(entries))
    }
}

fn key_string(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse_str(content: &str) -> BTreeMap<String, Value> {
        parse(content, Path::new("test.yaml"))
    }

    #[test]
    fn test_load_reads_mapping() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("jobs.yaml");
        fs::write(&path, "workflow_a:\n  job_name: alpha\nother: 1\n").unwrap();

        let raw = load(&path).unwrap();
        assert_eq!(raw.len(), 2);
        assert!(raw.contains_key("workflow_a"));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(load(&temp.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_malformed_document_is_empty() {
        assert!(parse_str("workflow_a: [unclosed").is_empty());
        assert!(parse_str("- just\n- a list\n").is_empty());
    }

    #[test]
    fn test_empty_document_is_empty() {
        assert!(parse_str("").is_empty());
        assert!(parse_str("# only a comment\n").is_empty());
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let raw = parse_str("workflow_a:\n  job_name: first\nworkflow_a:\n  job_name: second\n");
        let defs = workflows(&raw).unwrap();
        assert_eq!(defs["workflow_a"].job_name.as_deref(), Some("second"));
    }

    #[test]
    fn test_workflows_filters_prefix() {
        let raw = parse_str(
            "workflow_a:\n  job_name: alpha\nworkflow_b:\n  job_name: beta\ndefaults:\n  x: 1\n",
        );
        let defs = workflows(&raw).unwrap();
        assert_eq!(defs.keys().collect::<Vec<_>>(), vec!["workflow_a", "workflow_b"]);
    }

    #[test]
    fn test_workflows_structural_error() {
        let raw = parse_str("workflow_a:\n  tasks: not-a-list\n");
        let err = workflows(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkflow { ref workflow, .. } if workflow == "workflow_a"));
    }

    #[test]
    fn test_empty_workflow_reads_as_default() {
        let raw = parse_str("workflow_a:\n");
        let defs = workflows(&raw).unwrap();
        assert_eq!(defs["workflow_a"], WorkflowDefinition::default());
    }

    #[test]
    fn test_numeric_keys_are_stringified() {
        let raw = parse_str("1: one\nworkflow_x:\n  job_name: x\n");
        assert!(raw.contains_key("1"));
    }
}
