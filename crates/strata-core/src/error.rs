//! Error types and handling for configuration resolution and file selection

use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// One importer that loaded a conflicting copy of a plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConflictSource {
    /// Name of the configuration that declared the plugin
    pub importer_name: String,
    /// Canonical path of the plugin definition it resolved to
    pub file_path: PathBuf,
}

/// Main error type for strata operations
#[derive(Debug, Error)]
pub enum StrataError {
    /// A configuration document could not be read
    #[error("Cannot read config file: {}\nError: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration or plugin document could not be parsed
    #[error("Failed to parse config file '{}': {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// A configuration document failed validation
    #[error("Strata configuration in {source_name} is invalid:\n{}", format_problems(.problems))]
    InvalidConfig {
        source_name: String,
        problems: Vec<String>,
    },

    /// The options bundle failed validation
    #[error("Invalid Options:\n{}", format_problems(.problems))]
    InvalidOptions { problems: Vec<String> },

    /// An override block used a pattern that escapes its base directory
    #[error("Invalid override pattern (expected relative path not containing '..'): {pattern}")]
    InvalidOverridePattern { pattern: String },

    /// A glob could not be compiled
    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    /// A name in `extends` did not resolve to anything
    #[error("Failed to load config \"{config_name}\" to extend from.\nReferenced from: {importer_name}")]
    ExtendConfigMissing {
        config_name: String,
        importer_name: String,
    },

    /// `extends` references form a cycle
    #[error("Circular `extends` chain detected: {}", .chain.join(" » "))]
    CircularExtends { chain: Vec<String> },

    /// A plugin named in `plugins` could not be resolved
    #[error(
        "Failed to load plugin '{plugin_name}' declared in '{importer_name}': Cannot find module '{package_name}'\nRequire stack: {}",
        .resolve_plugins_relative_to.display()
    )]
    PluginMissing {
        plugin_name: String,
        package_name: String,
        importer_name: String,
        resolve_plugins_relative_to: PathBuf,
    },

    /// Two configuration sources loaded different copies of one plugin
    #[error("Plugin \"{plugin_id}\" was conflicted between {}.\n{}", conflict_importers(.sources), conflict_details(.sources))]
    PluginConflict {
        plugin_id: String,
        sources: Vec<PluginConflictSource>,
    },

    /// A parser named in `parser` could not be resolved
    #[error("Failed to load parser '{parser_name}' declared in '{importer_name}': Cannot find module '{parser_name}'")]
    ParserMissing {
        parser_name: String,
        importer_name: String,
    },

    /// Raw module-resolution failure from the package layer
    #[error("Cannot find module '{request}' from '{}'", .relative_to.display())]
    ModuleNotFound { request: String, relative_to: PathBuf },

    /// No configuration was found for a directory
    #[error("No strata configuration found in {}.", .directory.display())]
    NoConfigFound { directory: PathBuf },

    /// The ignore file could not be used
    #[error("Cannot read ignore file: {}\nError: {message}", .path.display())]
    IgnoreFileRead { path: PathBuf, message: String },

    /// An input pattern matched nothing on disk
    #[error("No files matching the pattern \"{pattern}\"{} were found.", glob_note(.glob_disabled))]
    NoFilesFound { pattern: String, glob_disabled: bool },

    /// Every file matched by an input pattern is ignored
    #[error("All files matched by '{pattern}' are ignored.")]
    AllFilesIgnored { pattern: String },

    /// Cache-related errors
    #[error("Cache error for '{}': {message}", .path.display())]
    CacheError { path: PathBuf, message: String },

    /// Errors reported by the external lint engine
    #[error("Lint error in '{}': {message}", .path.display())]
    LintError { path: PathBuf, message: String },

    /// File system I/O errors
    #[error("IO error for path '{}': {source}", .path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error kind enumeration for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Resolution,
    Conflict,
    Ignore,
    NoFiles,
    Cache,
    Lint,
    Io,
}

fn glob_note(glob_disabled: &bool) -> &'static str {
    if *glob_disabled {
        " (with disabled globs)"
    } else {
        ""
    }
}

fn format_problems(problems: &[String]) -> String {
    problems
        .iter()
        .map(|problem| format!("\t- {problem}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn conflict_importers(sources: &[PluginConflictSource]) -> String {
    sources
        .iter()
        .map(|source| format!("\"{}\"", source.importer_name))
        .collect::<Vec<_>>()
        .join(" and ")
}

fn conflict_details(sources: &[PluginConflictSource]) -> String {
    sources
        .iter()
        .map(|source| {
            format!(
                "\t- {} (loaded in \"{}\")",
                source.file_path.display(),
                source.importer_name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl StrataError {
    /// Get the error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StrataError::InvalidConfig { .. }
            | StrataError::InvalidOptions { .. }
            | StrataError::InvalidOverridePattern { .. }
            | StrataError::InvalidGlob { .. }
            | StrataError::ConfigParse { .. } => ErrorKind::Validation,
            StrataError::ExtendConfigMissing { .. }
            | StrataError::CircularExtends { .. }
            | StrataError::PluginMissing { .. }
            | StrataError::ParserMissing { .. }
            | StrataError::ModuleNotFound { .. }
            | StrataError::NoConfigFound { .. }
            | StrataError::ConfigRead { .. } => ErrorKind::Resolution,
            StrataError::PluginConflict { .. } => ErrorKind::Conflict,
            StrataError::IgnoreFileRead { .. } => ErrorKind::Ignore,
            StrataError::NoFilesFound { .. } | StrataError::AllFilesIgnored { .. } => {
                ErrorKind::NoFiles
            }
            StrataError::CacheError { .. } => ErrorKind::Cache,
            StrataError::LintError { .. } => ErrorKind::Lint,
            StrataError::IoError { .. } => ErrorKind::Io,
        }
    }

    /// Template tag callers can use to render an actionable message
    pub fn message_template(&self) -> Option<&'static str> {
        match self {
            StrataError::ExtendConfigMissing { .. } => Some("extend-config-missing"),
            StrataError::PluginMissing { .. } => Some("plugin-missing"),
            StrataError::PluginConflict { .. } => Some("plugin-conflict"),
            StrataError::NoFilesFound { .. } => Some("file-not-found"),
            StrataError::AllFilesIgnored { .. } => Some("all-files-ignored"),
            StrataError::NoConfigFound { .. } => Some("no-config-found"),
            _ => None,
        }
    }

    /// Structured data accompanying [`Self::message_template`]
    pub fn message_data(&self) -> Option<serde_json::Value> {
        match self {
            StrataError::ExtendConfigMissing {
                config_name,
                importer_name,
            } => Some(json!({
                "configName": config_name,
                "importerName": importer_name,
            })),
            StrataError::PluginMissing {
                package_name,
                importer_name,
                resolve_plugins_relative_to,
                ..
            } => Some(json!({
                "pluginName": package_name,
                "importerName": importer_name,
                "resolvePluginsRelativeTo": resolve_plugins_relative_to,
            })),
            StrataError::PluginConflict { plugin_id, sources } => Some(json!({
                "pluginId": plugin_id,
                "plugins": sources
                    .iter()
                    .map(|s| json!({ "filePath": s.file_path, "importerName": s.importer_name }))
                    .collect::<Vec<_>>(),
            })),
            StrataError::NoFilesFound {
                pattern,
                glob_disabled,
            } => Some(json!({ "pattern": pattern, "globDisabled": glob_disabled })),
            StrataError::AllFilesIgnored { pattern } => Some(json!({ "pattern": pattern })),
            StrataError::NoConfigFound { directory } => {
                Some(json!({ "directoryPath": directory }))
            }
            _ => None,
        }
    }

    /// Diagnostic code for raw failures coming from the package layer
    pub fn code(&self) -> Option<&'static str> {
        match self {
            StrataError::ModuleNotFound { .. } => Some("MODULE_NOT_FOUND"),
            _ => None,
        }
    }

    /// Create a configuration parse error
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a validation error for a single problem
    pub fn invalid_config(source_name: impl Into<String>, problem: impl Into<String>) -> Self {
        Self::InvalidConfig {
            source_name: source_name.into(),
            problems: vec![problem.into()],
        }
    }

    /// Create an invalid glob error
    pub fn invalid_glob(pattern: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidGlob {
            pattern: pattern.into(),
            message: message.to_string(),
        }
    }

    /// Create a cache error
    pub fn cache_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CacheError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an IO error with path context
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for StrataError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            path: PathBuf::new(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_only_for_actionable_errors() {
        let missing = StrataError::ExtendConfigMissing {
            config_name: "foo".to_string(),
            importer_name: ".stratarc.json".to_string(),
        };
        assert_eq!(missing.message_template(), Some("extend-config-missing"));
        assert_eq!(missing.kind(), ErrorKind::Resolution);

        let raw = StrataError::ModuleNotFound {
            request: "strata-config-foo".to_string(),
            relative_to: PathBuf::from("/project"),
        };
        assert_eq!(raw.message_template(), None);
        assert_eq!(raw.code(), Some("MODULE_NOT_FOUND"));
    }

    #[test]
    fn test_conflict_message_lists_every_importer() {
        let error = StrataError::PluginConflict {
            plugin_id: "foo".to_string(),
            sources: vec![
                PluginConflictSource {
                    importer_name: ".stratarc.json".to_string(),
                    file_path: PathBuf::from("/a/node_modules/strata-plugin-foo/index.json"),
                },
                PluginConflictSource {
                    importer_name: "sub/.stratarc.json".to_string(),
                    file_path: PathBuf::from("/a/sub/node_modules/strata-plugin-foo/index.json"),
                },
            ],
        };

        let message = error.to_string();
        assert!(message.contains("\".stratarc.json\" and \"sub/.stratarc.json\""));
        assert!(message.contains("/a/sub/node_modules/strata-plugin-foo/index.json"));
        assert_eq!(error.kind(), ErrorKind::Conflict);

        let data = error.message_data().unwrap();
        assert_eq!(data["plugins"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_no_files_found_mentions_disabled_globs() {
        let error = StrataError::NoFilesFound {
            pattern: "*.js".to_string(),
            glob_disabled: true,
        };
        assert_eq!(
            error.to_string(),
            "No files matching the pattern \"*.js\" (with disabled globs) were found."
        );
    }
}
