//! Options accepted by [`LintEngine`](crate::engine::LintEngine)

use crate::cache::CacheStrategy;
use crate::config::{ConfigData, OneOrMany, ResolverOptions};
use crate::selector::SelectorOptions;
use crate::{Result, StrataError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_default()
}

/// Everything a lint run is configured with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOptions {
    /// Absolute working directory all relative inputs resolve against
    #[serde(default = "current_dir")]
    pub cwd: PathBuf,

    /// Explicit configuration file (`--config`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,

    /// Discover configuration documents in directories
    #[serde(default = "default_true")]
    pub use_config_file: bool,

    /// Apply ignore files and patterns
    #[serde(default = "default_true")]
    pub ignore: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_patterns: Option<OneOrMany>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_plugins_relative_to: Option<PathBuf>,

    #[serde(default)]
    pub cache_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_location: Option<PathBuf>,

    #[serde(default)]
    pub cache_strategy: CacheStrategy,

    /// Extensions of files linted when walking directories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,

    /// Treat input patterns as globs
    #[serde(default = "default_true")]
    pub glob_input_paths: bool,

    /// Configuration applied below every discovered document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_config: Option<ConfigData>,

    /// Configuration applied above everything else, e.g. from `--rule`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_config: Option<ConfigData>,

    /// Directory discovery never looks above this directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_root: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub error_on_unmatched_pattern: bool,

    /// Report explicitly named files that are ignored
    #[serde(default = "default_true")]
    pub warn_ignored: bool,

    /// Document behind `strata:recommended`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_config_path: Option<PathBuf>,

    /// Document behind `strata:all`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_config_path: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::new(current_dir())
    }
}

impl EngineOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            config_path: None,
            use_config_file: true,
            ignore: true,
            ignore_path: None,
            ignore_patterns: None,
            resolve_plugins_relative_to: None,
            cache_enabled: false,
            cache_location: None,
            cache_strategy: CacheStrategy::default(),
            extensions: None,
            glob_input_paths: true,
            base_config: None,
            override_config: None,
            project_root: None,
            error_on_unmatched_pattern: true,
            warn_ignored: true,
            recommended_config_path: None,
            all_config_path: None,
        }
    }

    /// Check the options, collecting every problem
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if !self.cwd.is_absolute() {
            problems.push("'cwd' must be an absolute path.".to_string());
        }
        if let Some(extensions) = &self.extensions {
            if extensions.is_empty() || extensions.iter().any(|ext| ext.trim_start_matches('.').is_empty()) {
                problems.push("'extensions' must be an array of non-empty strings.".to_string());
            }
        }
        if self.ignore_path.as_deref().is_some_and(is_empty_path) {
            problems.push("'ignorePath' must be a non-empty string or null.".to_string());
        }
        if self.cache_location.as_deref().is_some_and(is_empty_path) {
            problems.push("'cacheLocation' must be a non-empty string.".to_string());
        }
        if self.config_path.as_deref().is_some_and(is_empty_path) {
            problems.push("'configPath' must be a non-empty string or null.".to_string());
        }
        if self.ignore_pattern_list().iter().any(String::is_empty) {
            problems.push("'ignorePatterns' must not contain empty strings.".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(StrataError::InvalidOptions { problems })
        }
    }

    /// Target extensions, each with a leading `.`
    pub fn normalized_extensions(&self) -> Option<Vec<String>> {
        self.extensions.as_ref().map(|extensions| {
            extensions
                .iter()
                .map(|ext| {
                    if ext.starts_with('.') {
                        ext.clone()
                    } else {
                        format!(".{ext}")
                    }
                })
                .collect()
        })
    }

    pub fn ignore_pattern_list(&self) -> Vec<String> {
        self.ignore_patterns
            .as_ref()
            .map(OneOrMany::to_vec)
            .unwrap_or_default()
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        let mut options = ResolverOptions::new(&self.cwd);
        options.use_config_file = self.use_config_file;
        options.config_path = self.config_path.clone();
        options.base_config = self.base_config.clone();
        options.cli_config = self.override_config.clone();
        options.project_root = self.project_root.clone();
        options.ignore = self.ignore;
        options.ignore_path = self.ignore_path.clone();
        options.ignore_patterns = self.ignore_pattern_list();
        options.resolve_plugins_relative_to = self.resolve_plugins_relative_to.clone();
        options.recommended_config_path = self.recommended_config_path.clone();
        options.all_config_path = self.all_config_path.clone();
        options
    }

    pub fn selector_options(&self) -> SelectorOptions {
        SelectorOptions {
            cwd: self.cwd.clone(),
            extensions: self.normalized_extensions(),
            glob_input_paths: self.glob_input_paths,
            error_on_unmatched_pattern: self.error_on_unmatched_pattern,
        }
    }
}

fn is_empty_path(path: &Path) -> bool {
    path.as_os_str().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_defaults() {
        let options: EngineOptions = serde_json::from_value(json!({
            "cwd": "/project",
            "ignorePatterns": "dist/",
            "cacheStrategy": "content"
        }))
        .unwrap();

        assert!(options.use_config_file);
        assert!(options.glob_input_paths);
        assert!(options.warn_ignored);
        assert!(!options.cache_enabled);
        assert_eq!(options.cache_strategy, CacheStrategy::Content);
        assert_eq!(options.ignore_pattern_list(), vec!["dist/"]);
    }

    #[test]
    fn test_validate_collects_problems() {
        let mut options = EngineOptions::new("relative");
        options.extensions = Some(Vec::new());
        options.ignore_path = Some(PathBuf::new());

        let StrataError::InvalidOptions { problems } = options.validate().unwrap_err() else {
            panic!("expected invalid options");
        };
        assert_eq!(problems.len(), 3);
        assert!(problems[0].contains("'cwd'"));
    }

    #[test]
    fn test_normalized_extensions() {
        let mut options = EngineOptions::new("/project");
        options.extensions = Some(vec!["ts".to_string(), ".tsx".to_string()]);
        assert!(options.validate().is_ok());
        assert_eq!(
            options.normalized_extensions(),
            Some(vec![".ts".to_string(), ".tsx".to_string()])
        );
    }

    #[test]
    fn test_resolver_options_carry_override_config() {
        let mut options = EngineOptions::new("/project");
        options.override_config = Some(ConfigData::default());
        options.ignore_patterns = Some(OneOrMany::Many(vec!["a".into(), "b".into()]));

        let resolver = options.resolver_options();
        assert!(resolver.cli_config.is_some());
        assert_eq!(resolver.ignore_patterns, vec!["a", "b"]);
    }
}
