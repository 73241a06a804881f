//! Lint engine facade
//!
//! [`LintEngine`] ties configuration resolution, file selection and the
//! result cache together around an external [`Linter`].

use crate::cache::LintResultCache;
use crate::config::{ConfigResolver, EffectiveConfig};
use crate::lint::{LintReport, LintResult, Linter};
use crate::options::EngineOptions;
use crate::paths::{absolutize, relative_path};
use crate::result::IoResultExt;
use crate::selector::FileSelector;
use crate::Result;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name used for text linted without a file path
pub const TEXT_PLACEHOLDER: &str = "<text>";

const HIDDEN_FILE_WARNING: &str = "File ignored by default. Use a negated ignore pattern (like \"--ignore-pattern '!<relative/path/to/filename>'\") to override.";
const NODE_MODULES_WARNING: &str = "File ignored by default because it is located under the node_modules directory. Use ignore pattern \"!**/node_modules/\" to override.";
const PATTERN_WARNING: &str =
    "File ignored because of a matching ignore pattern. Use \"--no-ignore\" to override.";

/// A file queued for linting with its resolved configuration
enum Pending {
    Done(LintResult),
    Lint(PathBuf, Arc<EffectiveConfig>),
}

/// Lints files according to their cascaded configuration
pub struct LintEngine {
    options: EngineOptions,
    resolver: ConfigResolver,
    cache_path: PathBuf,
}

impl LintEngine {
    /// Validate `options`, load fixed configuration layers and prepare the cache
    ///
    /// With caching disabled, a cache file left at the configured location is
    /// deleted.
    pub fn new(options: EngineOptions) -> Result<Self> {
        options.validate()?;
        let resolver = ConfigResolver::new(options.resolver_options())?;
        let cache_path =
            LintResultCache::cache_file_path(options.cache_location.as_deref(), &options.cwd);

        if !options.cache_enabled {
            LintResultCache::delete(&cache_path)?;
        }

        Ok(Self {
            options,
            resolver,
            cache_path,
        })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// A selector over this engine's configuration
    pub fn selector(&self) -> FileSelector<'_> {
        FileSelector::new(&self.resolver, self.options.selector_options())
    }

    /// Lint every file selected by `patterns`
    pub fn lint_files<S: AsRef<str>>(&self, patterns: &[S], linter: &dyn Linter) -> Result<LintReport> {
        let selector = self.selector();
        let selected = selector.select(patterns)?;
        let mut cache = self
            .options
            .cache_enabled
            .then(|| LintResultCache::load(&self.cache_path, self.options.cache_strategy));

        let mut pending = Vec::with_capacity(selected.len());
        for file in selected {
            if file.ignored {
                if self.options.warn_ignored {
                    pending.push(Pending::Done(self.ignored_result(&file.file_path)));
                }
                continue;
            }

            let config = self.resolver.resolve(&file.file_path)?;
            if let Some(hit) = cache
                .as_ref()
                .and_then(|cache| cache.get_cached_lint_results(&file.file_path, &config))
            {
                pending.push(Pending::Done(hit));
                continue;
            }
            pending.push(Pending::Lint(file.file_path, config));
        }

        let linted: Vec<(LintResult, Option<Arc<EffectiveConfig>>)> = pending
            .into_par_iter()
            .map(|item| match item {
                Pending::Done(result) => Ok((result, None)),
                Pending::Lint(path, config) => {
                    let result = lint_file(&path, &config, linter)?;
                    Ok((result, Some(config)))
                }
            })
            .collect::<Result<_>>()?;

        let mut results = Vec::with_capacity(linted.len());
        for (result, config) in linted {
            if let (Some(cache), Some(config)) = (cache.as_mut(), config) {
                cache.set_cached_lint_results(&result.file_path, &config, &result);
            }
            results.push(result);
        }
        if let Some(cache) = cache.as_mut() {
            cache.reconcile(&selector.scanned_roots(patterns))?;
        }

        let report = LintReport::new(results);
        tracing::info!(
            "Linted {} files: {} errors, {} warnings",
            report.results.len(),
            report.error_count,
            report.warning_count
        );
        Ok(report)
    }

    /// Lint in-memory text, optionally as if it were the file `file_path`
    pub fn lint_text(
        &self,
        source: &str,
        file_path: Option<&Path>,
        linter: &dyn Linter,
    ) -> Result<LintReport> {
        let file_path = file_path.map(|path| absolutize(&self.options.cwd, path));

        if let Some(path) = &file_path {
            if self.resolver.is_path_ignored(path)? {
                let results = if self.options.warn_ignored {
                    vec![self.ignored_result(path)]
                } else {
                    Vec::new()
                };
                return Ok(LintReport::new(results));
            }
        }

        let config_path = file_path
            .clone()
            .unwrap_or_else(|| self.options.cwd.join("__placeholder__.js"));
        let config = self.resolver.resolve(&config_path)?;
        let output = linter.lint(source, &config, &config_path)?;
        let result = LintResult::from_output(
            file_path.unwrap_or_else(|| PathBuf::from(TEXT_PLACEHOLDER)),
            output,
            source,
        );
        Ok(LintReport::new(vec![result]))
    }

    /// Whether `path` would be skipped by a directory walk
    pub fn is_path_ignored(&self, path: &Path) -> Result<bool> {
        self.resolver.is_path_ignored(path)
    }

    /// The effective configuration of `path`
    pub fn calculate_config_for_file(&self, path: &Path) -> Result<Arc<EffectiveConfig>> {
        self.resolver.resolve(path)
    }

    /// Forget every memoized configuration
    pub fn clear_cache(&mut self) -> Result<()> {
        self.resolver.clear_cache()
    }

    fn ignored_result(&self, file_path: &Path) -> LintResult {
        let relative = relative_path(&self.options.cwd, file_path);
        let hidden = relative
            .split('/')
            .any(|segment| segment.starts_with('.') && segment != "." && segment != "..");
        let message = if hidden {
            HIDDEN_FILE_WARNING
        } else if relative.starts_with("node_modules") {
            NODE_MODULES_WARNING
        } else {
            PATTERN_WARNING
        };
        LintResult::ignored(file_path, message)
    }
}

fn lint_file(path: &Path, config: &EffectiveConfig, linter: &dyn Linter) -> Result<LintResult> {
    let source = fs::read_to_string(path).with_path(path)?;
    tracing::debug!("Linting {}", path.display());
    let output = linter.lint(&source, config, path)?;
    Ok(LintResult::from_output(path, output, &source))
}
