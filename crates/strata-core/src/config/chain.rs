//! Flattened configuration chains and their per-file extraction
//!
//! A [`ConfigChain`] lists every configuration entry that may apply to the
//! files of one directory, lowest priority first. Extraction folds the entries
//! that apply to a given file into an [`EffectiveConfig`].

use super::data::{GlobalAccess, RuleEntry};
use crate::ignore_pattern::{IgnoreMatcher, IgnorePattern};
use crate::overrides::OverrideTester;
use crate::plugins::PluginRef;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Priority band of an entry; bands fold in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChainLayer {
    /// Base config and directory-discovered documents with their extends
    Cascade,
    /// The explicit `--config` document
    ConfigFile,
    /// Configuration assembled from command-line options
    Cli,
}

/// A parser resolved for one configuration source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserRef {
    pub name: String,
    pub file_path: PathBuf,
    #[serde(skip)]
    pub importer_name: String,
}

/// One flattened element of a configuration chain
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    /// Provenance, e.g. `sub/.stratarc.json » strata-config-foo#overrides[0]`
    pub name: String,
    pub file_path: Option<PathBuf>,
    pub layer: ChainLayer,
    /// Set for override entries
    pub criteria: Option<OverrideTester>,
    /// Override synthesized for an extension processor such as `.md`
    pub implicit: bool,
    pub root: Option<bool>,
    pub env: IndexMap<String, bool>,
    pub globals: IndexMap<String, GlobalAccess>,
    pub ignore_pattern: Option<IgnorePattern>,
    pub no_inline_config: Option<bool>,
    pub parser: Option<ParserRef>,
    pub parser_options: Map<String, Value>,
    pub plugins: IndexMap<String, PluginRef>,
    pub processor: Option<String>,
    pub report_unused_disable_directives: Option<bool>,
    pub rules: IndexMap<String, RuleEntry>,
    pub settings: Map<String, Value>,
}

impl ConfigEntry {
    pub fn new(name: impl Into<String>, layer: ChainLayer) -> Self {
        Self {
            name: name.into(),
            file_path: None,
            layer,
            criteria: None,
            implicit: false,
            root: None,
            env: IndexMap::new(),
            globals: IndexMap::new(),
            ignore_pattern: None,
            no_inline_config: None,
            parser: None,
            parser_options: Map::new(),
            plugins: IndexMap::new(),
            processor: None,
            report_unused_disable_directives: None,
            rules: IndexMap::new(),
            settings: Map::new(),
        }
    }

    pub fn is_override(&self) -> bool {
        self.criteria.is_some()
    }

    fn applies_to(&self, file_path: &Path) -> bool {
        self.criteria
            .as_ref()
            .is_some_and(|criteria| criteria.test(file_path))
    }
}

/// Ordered configuration entries for one directory, lowest priority first
#[derive(Debug)]
pub struct ConfigChain {
    entries: Vec<ConfigEntry>,
    ignore: Arc<IgnoreMatcher>,
}

impl ConfigChain {
    pub fn new(entries: Vec<ConfigEntry>, ignore: Arc<IgnoreMatcher>) -> Self {
        Self { entries, ignore }
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ignore(&self) -> &IgnoreMatcher {
        &self.ignore
    }

    /// Whether any entry was loaded from a file
    pub fn has_file_entries(&self) -> bool {
        self.entries.iter().any(|entry| entry.file_path.is_some())
    }

    /// Every plugin declared anywhere in the chain, in declaration order
    pub fn plugin_refs(&self) -> impl Iterator<Item = &PluginRef> {
        self.entries.iter().flat_map(|entry| entry.plugins.values())
    }

    /// Whether an override that names specific files selects `file_path`
    ///
    /// Blocks whose patterns all end in `*` only refine files selected by
    /// extension and never add targets.
    pub fn is_additional_target_path(&self, file_path: &Path) -> bool {
        self.entries.iter().any(|entry| {
            !entry.implicit
                && entry
                    .criteria
                    .as_ref()
                    .is_some_and(|c| !c.ends_with_wildcard() && c.test(file_path))
        })
    }

    /// Fold every entry applying to `file_path` into one configuration
    pub fn extract(&self, file_path: &Path) -> EffectiveConfig {
        let mut config = EffectiveConfig::default();

        for layer in [ChainLayer::Cascade, ChainLayer::ConfigFile, ChainLayer::Cli] {
            let in_layer = || self.entries.iter().filter(move |e| e.layer == layer);
            for entry in in_layer().filter(|e| !e.is_override()) {
                config.merge_entry(entry);
            }
            for entry in in_layer().filter(|e| e.applies_to(file_path)) {
                tracing::trace!("Override '{}' applies to {}", entry.name, file_path.display());
                config.merge_entry(entry);
            }
        }

        config
    }
}

/// The fully merged configuration of one file
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    pub env: BTreeMap<String, bool>,
    pub globals: BTreeMap<String, GlobalAccess>,
    pub no_inline_config: bool,
    pub parser: Option<ParserRef>,
    pub parser_options: BTreeMap<String, Value>,
    pub plugins: Vec<String>,
    pub processor: Option<String>,
    pub report_unused_disable_directives: bool,
    pub rules: BTreeMap<String, RuleEntry>,
    pub settings: BTreeMap<String, Value>,
    #[serde(skip)]
    pub plugin_refs: IndexMap<String, PluginRef>,
}

impl EffectiveConfig {
    /// Fold a higher-priority entry over this configuration
    pub fn merge_entry(&mut self, entry: &ConfigEntry) {
        for (name, enabled) in &entry.env {
            self.env.insert(name.clone(), *enabled);
        }
        for (name, access) in &entry.globals {
            self.globals.insert(name.clone(), *access);
        }
        if let Some(no_inline_config) = entry.no_inline_config {
            self.no_inline_config = no_inline_config;
        }
        if let Some(parser) = &entry.parser {
            self.parser = Some(parser.clone());
        }
        for (key, value) in &entry.parser_options {
            merge_value(self.parser_options.entry(key.clone()), value);
        }
        for (id, plugin) in &entry.plugins {
            if !self.plugin_refs.contains_key(id) {
                self.plugins.push(id.clone());
                self.plugin_refs.insert(id.clone(), plugin.clone());
            }
        }
        if let Some(processor) = &entry.processor {
            self.processor = Some(processor.clone());
        }
        if let Some(report) = entry.report_unused_disable_directives {
            self.report_unused_disable_directives = report;
        }
        for (rule_id, rule) in &entry.rules {
            merge_rule(&mut self.rules, rule_id, rule);
        }
        for (key, value) in &entry.settings {
            merge_value(self.settings.entry(key.clone()), value);
        }
    }

    /// Severity and options of one rule
    pub fn rule(&self, rule_id: &str) -> Option<&RuleEntry> {
        self.rules.get(rule_id)
    }

    /// Stable digest of the tool version and this configuration
    pub fn fingerprint(&self) -> String {
        let canonical = canonicalize(serde_json::to_value(self).unwrap_or_default());
        let mut hasher = Sha256::new();
        hasher.update(crate::VERSION.as_bytes());
        hasher.update(b"\n");
        hasher.update(canonical.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A severity-only entry keeps the options of the rule it overrides
fn merge_rule(rules: &mut BTreeMap<String, RuleEntry>, rule_id: &str, rule: &RuleEntry) {
    match rules.get_mut(rule_id) {
        Some(existing) if rule.options.is_empty() => existing.severity = rule.severity,
        _ => {
            rules.insert(rule_id.to_string(), rule.clone());
        }
    }
}

fn merge_value(slot: std::collections::btree_map::Entry<'_, String, Value>, value: &Value) {
    use std::collections::btree_map::Entry;
    match slot {
        Entry::Occupied(mut occupied) => deep_merge(occupied.get_mut(), value),
        Entry::Vacant(vacant) => {
            vacant.insert(value.clone());
        }
    }
}

/// Merge `higher` into `lower`; nested objects merge key-wise, anything else replaces
fn deep_merge(lower: &mut Value, higher: &Value) {
    match (lower, higher) {
        (Value::Object(lower), Value::Object(higher)) => {
            for (key, value) in higher {
                match lower.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        lower.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (lower, higher) => *lower = higher.clone(),
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(object) => {
            let sorted: BTreeMap<String, Value> = object
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
