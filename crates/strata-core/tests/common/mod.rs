//! Shared fixtures for strata-core integration tests

#![allow(dead_code)]

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use strata_core::{
    ConfigResolver, EffectiveConfig, EngineOptions, LintEngine, LintMessage, LintOutput, Linter,
    Result, RuleSeverity,
};
use tempfile::TempDir;

/// A temporary project tree
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write a file, creating parent directories
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    pub fn write_json(&self, relative: &str, value: Value) -> PathBuf {
        self.write(relative, &serde_json::to_string_pretty(&value).unwrap())
    }

    /// Install a plugin package under `<dir>/node_modules`
    pub fn install_plugin(&self, dir: &str, name: &str, definition: Value) -> PathBuf {
        let relative = format!("{dir}/node_modules/strata-plugin-{name}/index.json");
        self.write_json(relative.trim_start_matches("./"), definition)
    }

    /// Install a shareable config package under `<dir>/node_modules`
    pub fn install_config(&self, dir: &str, name: &str, config: Value) -> PathBuf {
        let relative = format!("{dir}/node_modules/strata-config-{name}/index.json");
        self.write_json(relative.trim_start_matches("./"), config)
    }

    /// Options rooted at the fixture, never reading above it
    pub fn options(&self) -> EngineOptions {
        let mut options = EngineOptions::new(self.root());
        options.project_root = Some(self.root().to_path_buf());
        options
    }

    pub fn resolver(&self) -> ConfigResolver {
        ConfigResolver::new(self.options().resolver_options()).unwrap()
    }

    pub fn engine(&self) -> LintEngine {
        LintEngine::new(self.options()).unwrap()
    }

    /// Paths of `files` relative to the fixture root
    pub fn relative(&self, files: impl IntoIterator<Item = PathBuf>) -> Vec<String> {
        files
            .into_iter()
            .map(|path| {
                path.strip_prefix(self.root())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }
}

/// Severity of `rule_id` in `config`
pub fn severity(config: &EffectiveConfig, rule_id: &str) -> Option<RuleSeverity> {
    config.rule(rule_id).map(|rule| rule.severity)
}

/// A linter reporting one message per enabled rule and counting its calls
#[derive(Default)]
pub struct RuleEcho {
    pub calls: AtomicUsize,
}

impl RuleEcho {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Linter for RuleEcho {
    fn lint(&self, _source: &str, config: &EffectiveConfig, _file_path: &Path) -> Result<LintOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(LintOutput {
            messages: config
                .rules
                .iter()
                .filter(|(_, rule)| rule.severity != RuleSeverity::Off)
                .map(|(id, rule)| LintMessage::new(id, rule.severity, format!("{id} reported")))
                .collect(),
            output: None,
        })
    }
}
