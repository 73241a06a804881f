//! Configuration validation
//!
//! Documents are validated as raw JSON values before deserialization so that
//! every problem of a document is reported at once, each naming the JSON path
//! of the offending property.

use super::data::{ConfigData, GlobalAccess, RuleEntry, RuleSeverity};
use crate::plugins::{PluginRef, split_plugin_reference};
use crate::{Result, StrataError};
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Keys allowed at every level
const BASE_KEYS: [&str; 13] = [
    "env",
    "extends",
    "globals",
    "noInlineConfig",
    "overrides",
    "parser",
    "parserOptions",
    "plugins",
    "processor",
    "reportUnusedDisableDirectives",
    "rules",
    "settings",
    "$schema",
];

/// Keys allowed only at the top level of a document
const TOP_LEVEL_KEYS: [&str; 2] = ["root", "ignorePatterns"];

/// Keys allowed only inside override blocks
const OVERRIDE_KEYS: [&str; 2] = ["files", "excludedFiles"];

/// Validates configuration documents
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a raw document and convert it into [`ConfigData`]
    pub fn validate(value: &Value, source_name: &str) -> Result<ConfigData> {
        let mut problems = Vec::new();
        match value.as_object() {
            Some(object) => validate_block(object, "", false, &mut problems),
            None => problems.push("Configuration must be an object.".to_string()),
        }

        if !problems.is_empty() {
            return Err(StrataError::InvalidConfig {
                source_name: source_name.to_string(),
                problems,
            });
        }

        serde_json::from_value(value.clone())
            .map_err(|e| StrataError::invalid_config(source_name, e.to_string()))
    }

    /// Check references into plugins once the plugins of a chain are known
    ///
    /// Plugin-scoped environments and processors must exist, and options of
    /// plugin rules must fit the rule's positional schema.
    pub fn validate_plugin_usage(
        source_name: &str,
        env: &IndexMap<String, bool>,
        rules: &IndexMap<String, RuleEntry>,
        processor: Option<&str>,
        plugins: &IndexMap<String, PluginRef>,
    ) -> Result<()> {
        let mut problems = Vec::new();

        for env_name in env.keys() {
            if let Some((plugin_id, name)) = split_plugin_reference(env_name) {
                let known = plugins
                    .get(plugin_id)
                    .is_some_and(|p| p.definition.environment(name).is_some());
                if !known {
                    problems.push(format!("Environment key \"{env_name}\" is unknown"));
                }
            }
        }

        for (rule_id, entry) in rules {
            if entry.severity == RuleSeverity::Off {
                continue;
            }
            let Some((plugin_id, name)) = split_plugin_reference(rule_id) else {
                continue;
            };
            let schema = plugins
                .get(plugin_id)
                .and_then(|p| p.definition.rule(name))
                .and_then(|rule| rule.schema.as_ref());
            if let Some(Value::Array(positional)) = schema {
                if entry.options.len() > positional.len() {
                    problems.push(format!(
                        "Configuration for rule \"{rule_id}\" is invalid:\n\tValue {} should NOT have more than {} items.",
                        Value::Array(entry.options.clone()),
                        positional.len()
                    ));
                }
            }
        }

        if let Some(reference) = processor {
            let known = split_plugin_reference(reference).is_some_and(|(plugin_id, name)| {
                plugins
                    .get(plugin_id)
                    .is_some_and(|p| p.definition.processor(name).is_some())
            });
            if !known {
                problems.push(format!("Processor \"{reference}\" was not found."));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(StrataError::InvalidConfig {
                source_name: source_name.to_string(),
                problems,
            })
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn validate_block(
    object: &Map<String, Value>,
    path: &str,
    is_override: bool,
    problems: &mut Vec<String>,
) {
    for (key, value) in object {
        let allowed = BASE_KEYS.contains(&key.as_str())
            || if is_override {
                OVERRIDE_KEYS.contains(&key.as_str())
            } else {
                TOP_LEVEL_KEYS.contains(&key.as_str())
            };
        let key_path = join_path(path, key);

        if !allowed {
            problems.push(format!("Unexpected top-level property \"{key_path}\"."));
            continue;
        }

        match key.as_str() {
            "root" | "noInlineConfig" | "reportUnusedDisableDirectives" => {
                if !value.is_boolean() {
                    problems.push(format!("\"{key_path}\" should be boolean."));
                }
            }
            "parser" | "processor" | "$schema" => {
                if !value.is_string() && !value.is_null() {
                    problems.push(format!("\"{key_path}\" should be string."));
                }
            }
            "extends" | "ignorePatterns" | "excludedFiles" => {
                check_string_or_strings(value, &key_path, false, problems);
            }
            "files" => check_string_or_strings(value, &key_path, true, problems),
            "plugins" => match value.as_array() {
                Some(items) if items.iter().all(Value::is_string) => {}
                _ => problems.push(format!("\"{key_path}\" should be array of strings.")),
            },
            "parserOptions" | "settings" => {
                if !value.is_object() {
                    problems.push(format!("\"{key_path}\" should be object."));
                }
            }
            "env" => match value.as_object() {
                Some(env) => {
                    for (name, enabled) in env {
                        if !enabled.is_boolean() {
                            problems.push(format!(
                                "\"{}\" should be boolean.",
                                join_path(&key_path, name)
                            ));
                        }
                    }
                }
                None => problems.push(format!("\"{key_path}\" should be object.")),
            },
            "globals" => match value.as_object() {
                Some(globals) => {
                    for (name, access) in globals {
                        if GlobalAccess::from_value(access).is_none() {
                            problems.push(format!(
                                "Key \"{name}\": '{access}' is not a valid configuration for a global (use 'readonly', 'writable', or 'off')"
                            ));
                        }
                    }
                }
                None => problems.push(format!("\"{key_path}\" should be object.")),
            },
            "rules" => match value.as_object() {
                Some(rules) => {
                    for (rule_id, entry) in rules {
                        if RuleEntry::from_value(entry).is_none() {
                            problems.push(format!(
                                "Configuration for rule \"{rule_id}\" is invalid:\n\tSeverity should be one of the following: 0 = off, 1 = warn, 2 = error (you passed '{}').",
                                severity_part(entry)
                            ));
                        }
                    }
                }
                None => problems.push(format!("\"{key_path}\" should be object.")),
            },
            "overrides" => match value.as_array() {
                Some(blocks) => {
                    for (index, block) in blocks.iter().enumerate() {
                        let block_path = format!("{key_path}[{index}]");
                        match block.as_object() {
                            Some(block) => {
                                if !block.contains_key("files") {
                                    problems.push(format!(
                                        "\"{block_path}\" should have required property 'files'."
                                    ));
                                }
                                validate_block(block, &block_path, true, problems);
                            }
                            None => problems.push(format!("\"{block_path}\" should be object.")),
                        }
                    }
                }
                None => problems.push(format!("\"{key_path}\" should be array.")),
            },
            _ => {}
        }
    }
}

fn severity_part(entry: &Value) -> &Value {
    match entry {
        Value::Array(items) => items.first().unwrap_or(entry),
        other => other,
    }
}

fn check_string_or_strings(
    value: &Value,
    key_path: &str,
    non_empty: bool,
    problems: &mut Vec<String>,
) {
    let valid = match value {
        Value::String(s) => !non_empty || !s.is_empty(),
        Value::Array(items) => {
            items.iter().all(Value::is_string) && (!non_empty || !items.is_empty())
        }
        _ => false,
    };
    if !valid {
        problems.push(format!(
            "\"{key_path}\" should be {}string or array of strings.",
            if non_empty { "a non-empty " } else { "" }
        ));
    }
}
