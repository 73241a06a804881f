//! Configuration document types
//!
//! [`ConfigData`] is the on-disk shape of one configuration source. Override
//! blocks reuse the same type with `files`/`excludedFiles` set; the validator
//! decides which keys are legal at which level.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

/// A string or a list of strings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value.clone()],
            OneOrMany::Many(values) => values.clone(),
        }
    }
}

impl From<Vec<String>> for OneOrMany {
    fn from(values: Vec<String>) -> Self {
        OneOrMany::Many(values)
    }
}

/// One configuration document or override block
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigData {
    /// JSON schema reference for editor tooling
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "JSON schema reference, ignored by strata")]
    pub schema: Option<String>,

    /// Stop configuration discovery at this document's directory
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Stop looking for configuration in parent directories")]
    pub root: Option<bool>,

    /// Shareable configurations to inherit from
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Configurations this document extends, lowest priority first")]
    pub extends: Option<OneOrMany>,

    /// Enabled environments
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Environments to enable or disable")]
    pub env: Option<IndexMap<String, bool>>,

    /// Declared globals
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(
        with = "Option<IndexMap<String, Value>>",
        description = "Global variables: \"readonly\", \"writable\" or \"off\""
    )]
    pub globals: Option<IndexMap<String, GlobalAccess>>,

    /// Gitignore-style patterns relative to this document's directory
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Files and directories to ignore, relative to this document")]
    pub ignore_patterns: Option<OneOrMany>,

    /// Disallow inline configuration comments
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Disable inline configuration comments")]
    pub no_inline_config: Option<bool>,

    /// Glob-scoped partial configurations
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Configuration applied only to files matching `files`")]
    pub overrides: Option<Vec<ConfigData>>,

    /// Parser module name or path
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Parser to use")]
    pub parser: Option<String>,

    /// Options passed to the parser
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Parser options")]
    pub parser_options: Option<Map<String, Value>>,

    /// Plugins to load
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Plugin names, without the strata-plugin- prefix if desired")]
    pub plugins: Option<Vec<String>>,

    /// Processor reference in `plugin/processor` form
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Processor to extract code from non-script files")]
    pub processor: Option<String>,

    /// Report disable directives that suppress nothing
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Report unused disable directives")]
    pub report_unused_disable_directives: Option<bool>,

    /// Rule severities and options
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(
        with = "Option<IndexMap<String, Value>>",
        description = "Rules: severity or [severity, ...options]"
    )]
    pub rules: Option<IndexMap<String, RuleEntry>>,

    /// Shared settings visible to every rule
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Shared settings")]
    pub settings: Option<Map<String, Value>>,

    /// Globs this override block applies to
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Override blocks only: files the block applies to")]
    pub files: Option<OneOrMany>,

    /// Globs excluded from this override block
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Override blocks only: files excluded from the block")]
    pub excluded_files: Option<OneOrMany>,
}

impl ConfigData {
    pub fn extends_list(&self) -> Vec<String> {
        self.extends.as_ref().map(OneOrMany::to_vec).unwrap_or_default()
    }

    pub fn ignore_pattern_list(&self) -> Vec<String> {
        self.ignore_patterns
            .as_ref()
            .map(OneOrMany::to_vec)
            .unwrap_or_default()
    }
}

/// Rule severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleSeverity {
    Off,
    Warn,
    Error,
}

impl RuleSeverity {
    /// Parse `"off" | "warn" | "error"` (any case) or `0 | 1 | 2`
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "off" => Some(RuleSeverity::Off),
                "warn" => Some(RuleSeverity::Warn),
                "error" => Some(RuleSeverity::Error),
                _ => None,
            },
            Value::Number(n) => {
                // json5 produces floats for plain integers
                let level = n.as_u64().or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                        .map(|f| f as u64)
                })?;
                match level {
                    0 => Some(RuleSeverity::Off),
                    1 => Some(RuleSeverity::Warn),
                    2 => Some(RuleSeverity::Error),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSeverity::Off => "off",
            RuleSeverity::Warn => "warn",
            RuleSeverity::Error => "error",
        }
    }
}

impl fmt::Display for RuleSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RuleSeverity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RuleSeverity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RuleSeverity::from_value(&value).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "Severity should be one of the following: 0 = off, 1 = warn, 2 = error (you passed '{value}')"
            ))
        })
    }
}

/// Normalized rule configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEntry {
    pub severity: RuleSeverity,
    pub options: Vec<Value>,
}

impl RuleEntry {
    pub fn new(severity: RuleSeverity) -> Self {
        Self {
            severity,
            options: Vec::new(),
        }
    }

    pub fn with_options(severity: RuleSeverity, options: Vec<Value>) -> Self {
        Self { severity, options }
    }

    /// Parse `severity` or `[severity, ...options]`
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => {
                let (first, rest) = items.split_first()?;
                Some(Self {
                    severity: RuleSeverity::from_value(first)?,
                    options: rest.to_vec(),
                })
            }
            other => RuleSeverity::from_value(other).map(Self::new),
        }
    }
}

impl Serialize for RuleEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut items = Vec::with_capacity(self.options.len() + 1);
        items.push(Value::String(self.severity.as_str().to_string()));
        items.extend(self.options.iter().cloned());
        items.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RuleEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RuleEntry::from_value(&value).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "Severity should be one of the following: 0 = off, 1 = warn, 2 = error (you passed '{value}')"
            ))
        })
    }
}

/// Access level of a declared global
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalAccess {
    Readonly,
    Writable,
    Off,
}

impl GlobalAccess {
    /// Parse a global value, accepting legacy spellings
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(GlobalAccess::Writable),
            Value::Bool(false) | Value::Null => Some(GlobalAccess::Readonly),
            Value::String(s) => match s.as_str() {
                "readonly" | "readable" => Some(GlobalAccess::Readonly),
                "writable" | "writeable" => Some(GlobalAccess::Writable),
                "off" => Some(GlobalAccess::Off),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalAccess::Readonly => "readonly",
            GlobalAccess::Writable => "writable",
            GlobalAccess::Off => "off",
        }
    }
}

impl Serialize for GlobalAccess {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GlobalAccess {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        GlobalAccess::from_value(&value).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "'{value}' is not a valid configuration for a global (use 'readonly', 'writable', or 'off')"
            ))
        })
    }
}

/// Where a configuration document came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConfigOrigin {
    /// A file on disk
    File(PathBuf),
    /// Configuration assembled from command-line options
    Cli,
    /// The caller-supplied base configuration
    BaseConfig,
}

/// One loaded configuration source
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    pub origin: ConfigOrigin,
    pub data: ConfigData,
}

impl ConfigDocument {
    pub fn file(path: impl Into<PathBuf>, data: ConfigData) -> Self {
        Self {
            origin: ConfigOrigin::File(path.into()),
            data,
        }
    }

    pub fn file_path(&self) -> Option<&Path> {
        match &self.origin {
            ConfigOrigin::File(path) => Some(path),
            _ => None,
        }
    }
}
