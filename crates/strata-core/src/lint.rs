//! Lint results and the interface to the rule engine
//!
//! Rule execution lives outside this crate. A [`Linter`] receives a file's
//! source together with its [`EffectiveConfig`] and reports messages; this
//! module turns those into per-file [`LintResult`]s with counts.

use crate::Result;
use crate::config::{EffectiveConfig, RuleSeverity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Runs rules over one file
pub trait Linter: Sync {
    fn lint(&self, source: &str, config: &EffectiveConfig, file_path: &Path) -> Result<LintOutput>;
}

/// What a [`Linter`] reports for one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LintOutput {
    pub messages: Vec<LintMessage>,
    /// Fixed source, when fixes were applied
    pub output: Option<String>,
}

/// A single problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub severity: RuleSeverity,
    pub message: String,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub column: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fatal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<Value>,
}

impl LintMessage {
    pub fn new(rule_id: impl Into<String>, severity: RuleSeverity, message: impl Into<String>) -> Self {
        Self {
            rule_id: Some(rule_id.into()),
            severity,
            message: message.into(),
            line: 0,
            column: 0,
            fatal: false,
            fix: None,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    fn is_error(&self) -> bool {
        self.fatal || self.severity == RuleSeverity::Error
    }
}

/// Outcome of linting one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintResult {
    pub file_path: PathBuf,
    pub messages: Vec<LintMessage>,
    pub error_count: usize,
    pub warning_count: usize,
    pub fatal_error_count: usize,
    pub fixable_error_count: usize,
    pub fixable_warning_count: usize,
    /// Source text; present when there are messages and no fixed output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl LintResult {
    /// Build a result from linter output, computing the counts
    pub fn from_output(file_path: impl Into<PathBuf>, output: LintOutput, source: &str) -> Self {
        let mut result = Self {
            file_path: file_path.into(),
            messages: output.messages,
            error_count: 0,
            warning_count: 0,
            fatal_error_count: 0,
            fixable_error_count: 0,
            fixable_warning_count: 0,
            source: None,
            output: output.output,
        };
        result.recount();

        if result.has_problems() && result.output.is_none() {
            result.source = Some(source.to_string());
        }
        result
    }

    /// The warning reported for a file that was named explicitly but is ignored
    pub fn ignored(file_path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        let mut result = Self {
            file_path: file_path.into(),
            messages: vec![LintMessage {
                rule_id: None,
                severity: RuleSeverity::Warn,
                message: message.into(),
                line: 0,
                column: 0,
                fatal: false,
                fix: None,
            }],
            error_count: 0,
            warning_count: 0,
            fatal_error_count: 0,
            fixable_error_count: 0,
            fixable_warning_count: 0,
            source: None,
            output: None,
        };
        result.recount();
        result
    }

    pub fn has_problems(&self) -> bool {
        self.error_count + self.warning_count > 0
    }

    fn recount(&mut self) {
        self.error_count = 0;
        self.warning_count = 0;
        self.fatal_error_count = 0;
        self.fixable_error_count = 0;
        self.fixable_warning_count = 0;

        for message in &self.messages {
            let fixable = message.fix.is_some();
            if message.is_error() {
                self.error_count += 1;
                if message.fatal {
                    self.fatal_error_count += 1;
                }
                if fixable {
                    self.fixable_error_count += 1;
                }
            } else {
                self.warning_count += 1;
                if fixable {
                    self.fixable_warning_count += 1;
                }
            }
        }
    }
}

/// Results of a run with totals over all files
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LintReport {
    pub results: Vec<LintResult>,
    pub error_count: usize,
    pub warning_count: usize,
    pub fatal_error_count: usize,
    pub fixable_error_count: usize,
    pub fixable_warning_count: usize,
}

impl LintReport {
    pub fn new(results: Vec<LintResult>) -> Self {
        let mut report = Self::default();
        for result in &results {
            report.error_count += result.error_count;
            report.warning_count += result.warning_count;
            report.fatal_error_count += result.fatal_error_count;
            report.fixable_error_count += result.fixable_error_count;
            report.fixable_warning_count += result.fixable_warning_count;
        }
        report.results = results;
        report
    }
}
