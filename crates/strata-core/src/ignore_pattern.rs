//! Ignore engine
//!
//! Patterns come from four layers: built-in defaults, the `ignorePatterns`
//! of every configuration in a file's chain, one ignore file and the command
//! line. Each layer is an [`IgnorePattern`] anchored at its own base
//! directory; [`IgnoreMatcher`] relocates all of them under one common base
//! and evaluates them as a single gitignore list where later patterns win.
//!
//! A path is ignored when any of its ancestor directories is ignored, even if
//! a later pattern negates the path itself. That mirrors gitignore, where an
//! excluded directory is never descended into.

use crate::config::loader::{ConfigLoader, PACKAGE_IGNORE_KEY};
use crate::paths::{common_ancestor, normalize_path, relative_path};
use crate::{Result, StrataError};
use ::ignore::gitignore::{Gitignore, GitignoreBuilder};
use ::ignore::Match;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Patterns active even when ignoring is disabled
pub const DEFAULT_PATTERNS: [&str; 1] = ["/**/node_modules/*"];

/// Patterns hiding dotfiles unless a glob names them explicitly
///
/// Configuration documents stay lintable.
pub const DOTFILE_PATTERNS: [&str; 2] = [".*", "!.stratarc.*"];

/// Default ignore file name
pub const IGNORE_FILENAME: &str = ".strataignore";

/// A list of gitignore patterns anchored at a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnorePattern {
    pub patterns: Vec<String>,
    pub base_path: PathBuf,
}

impl IgnorePattern {
    pub fn new(patterns: Vec<String>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            patterns,
            base_path: base_path.into(),
        }
    }

    /// The built-in defaults anchored at `cwd`
    pub fn defaults(cwd: &Path) -> Self {
        Self::new(
            DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            cwd,
        )
    }

    /// Rewrite the patterns so they behave identically under `new_base`
    ///
    /// Patterns keep applying only inside this pattern's own subtree.
    pub fn patterns_relative_to(&self, new_base: &Path) -> Vec<String> {
        if new_base == self.base_path {
            return self.patterns.clone();
        }

        let prefix = relative_path(new_base, &self.base_path);
        self.patterns
            .iter()
            .map(|pattern| {
                let (head, body) = match pattern.strip_prefix('!') {
                    Some(body) => ("!", body),
                    None => ("", pattern.as_str()),
                };

                if let Some(anchored) = body.strip_prefix('/') {
                    format!("{head}/{prefix}/{anchored}")
                } else if body.starts_with("../") {
                    let joined = normalize_path(Path::new(&format!("{prefix}/{body}")));
                    format!("{head}/{}", joined.to_string_lossy())
                } else {
                    format!("{head}/{prefix}/**/{body}")
                }
            })
            .collect()
    }
}

/// Compiled ignore predicate for one configuration chain
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    base_path: PathBuf,
    patterns: Vec<String>,
    with_dotfiles: Gitignore,
    without_dotfiles: Gitignore,
}

impl IgnoreMatcher {
    /// Combine pattern layers, lowest priority first
    pub fn new(layers: &[IgnorePattern]) -> Result<Self> {
        let base_path = common_ancestor(layers.iter().map(|l| l.base_path.as_path()))
            .unwrap_or_else(|| PathBuf::from("/"));

        let patterns: Vec<String> = layers
            .iter()
            .flat_map(|layer| layer.patterns_relative_to(&base_path))
            .collect();

        let without_dotfiles = build_gitignore(&base_path, patterns.iter().map(String::as_str))?;
        let with_dotfiles = build_gitignore(
            &base_path,
            DOTFILE_PATTERNS
                .iter()
                .copied()
                .chain(patterns.iter().map(String::as_str)),
        )?;

        tracing::debug!(
            "Built ignore matcher at {} with {} patterns",
            base_path.display(),
            patterns.len()
        );

        Ok(Self {
            base_path,
            patterns,
            with_dotfiles,
            without_dotfiles,
        })
    }

    /// Whether `path` (absolute) is ignored
    ///
    /// `dotfiles` disables the default dotfile pattern. Ancestors at or above
    /// `entry_dir` are never considered ignored.
    pub fn is_ignored(
        &self,
        path: &Path,
        is_dir: bool,
        dotfiles: bool,
        entry_dir: Option<&Path>,
    ) -> bool {
        let Ok(relative) = path.strip_prefix(&self.base_path) else {
            return false;
        };
        let gitignore = if dotfiles {
            &self.without_dotfiles
        } else {
            &self.with_dotfiles
        };

        let components: Vec<_> = relative.components().collect();
        let mut current = self.base_path.clone();

        for (index, component) in components.iter().enumerate() {
            current.push(component);
            let is_last = index + 1 == components.len();

            if entry_dir.is_some_and(|entry| entry.starts_with(&current)) {
                continue;
            }

            let matched = gitignore.matched(&current, if is_last { is_dir } else { true });
            if is_last {
                return matched.is_ignore();
            }
            if let Match::Ignore(glob) = matched {
                tracing::trace!(
                    "{} excluded by ancestor pattern '{}'",
                    path.display(),
                    glob.original()
                );
                return true;
            }
        }

        false
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// The relocated patterns, lowest priority first
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

fn build_gitignore<'a>(base: &Path, lines: impl Iterator<Item = &'a str>) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(base);
    for line in lines {
        builder
            .add_line(None, line)
            .map_err(|e| StrataError::invalid_glob(line, e))?;
    }
    builder
        .build()
        .map_err(|e| StrataError::invalid_glob(base.to_string_lossy(), e))
}

/// Run-wide ignore inputs, fixed when a resolver is constructed
#[derive(Debug, Clone)]
pub struct IgnoreState {
    default_patterns: IgnorePattern,
    ignore_file: Option<IgnorePattern>,
    cli_patterns: Option<IgnorePattern>,
    ignore_enabled: bool,
}

impl IgnoreState {
    /// Read the ignore file and collect command-line patterns
    ///
    /// An explicit `ignore_path` that cannot be read is an error. Without one,
    /// `<cwd>/.strataignore` is used when present, then the `strataIgnore`
    /// array of `<cwd>/package.json`.
    pub fn load(
        cwd: &Path,
        ignore_enabled: bool,
        ignore_path: Option<&Path>,
        cli_patterns: &[String],
    ) -> Result<Self> {
        let default_patterns = IgnorePattern::defaults(cwd);
        if !ignore_enabled {
            return Ok(Self {
                default_patterns,
                ignore_file: None,
                cli_patterns: None,
                ignore_enabled,
            });
        }

        let ignore_file = match ignore_path {
            Some(path) => Some(load_ignore_file(path)?),
            None => {
                let default_path = cwd.join(IGNORE_FILENAME);
                if default_path.is_file() {
                    Some(load_ignore_file(&default_path)?)
                } else {
                    load_package_ignore(cwd)?
                }
            }
        };

        let cli_patterns = if cli_patterns.is_empty() {
            None
        } else {
            Some(IgnorePattern::new(cli_patterns.to_vec(), cwd))
        };

        Ok(Self {
            default_patterns,
            ignore_file,
            cli_patterns,
            ignore_enabled,
        })
    }

    pub fn ignore_enabled(&self) -> bool {
        self.ignore_enabled
    }

    /// Build the matcher for a chain whose `ignorePatterns` are `chain_patterns`
    pub fn matcher(&self, chain_patterns: Vec<IgnorePattern>) -> Result<IgnoreMatcher> {
        let mut layers = vec![self.default_patterns.clone()];
        if self.ignore_enabled {
            layers.extend(chain_patterns);
            layers.extend(self.ignore_file.iter().cloned());
            layers.extend(self.cli_patterns.iter().cloned());
        }
        IgnoreMatcher::new(&layers)
    }
}

fn load_ignore_file(path: &Path) -> Result<IgnorePattern> {
    let text = fs::read_to_string(path).map_err(|e| StrataError::IgnoreFileRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let patterns: Vec<String> = text
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    let base = path.parent().unwrap_or(Path::new("/"));
    tracing::debug!(
        "Loaded {} ignore patterns from {}",
        patterns.len(),
        path.display()
    );
    Ok(IgnorePattern::new(patterns, base))
}

fn load_package_ignore(cwd: &Path) -> Result<Option<IgnorePattern>> {
    let manifest = cwd.join("package.json");
    if !manifest.is_file() {
        return Ok(None);
    }

    match ConfigLoader::load_package_field(&manifest, PACKAGE_IGNORE_KEY)? {
        None => Ok(None),
        Some(Value::Array(items)) => {
            let patterns = items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        StrataError::IgnoreFileRead {
                            path: manifest.clone(),
                            message: format!("{PACKAGE_IGNORE_KEY} entries must be strings"),
                        }
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            tracing::debug!("Using {} from {}", PACKAGE_IGNORE_KEY, manifest.display());
            Ok(Some(IgnorePattern::new(patterns, cwd)))
        }
        Some(_) => Err(StrataError::IgnoreFileRead {
            path: manifest,
            message: format!("package.json {PACKAGE_IGNORE_KEY} property requires an array of paths"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pattern(patterns: &[&str], base: &str) -> IgnorePattern {
        IgnorePattern::new(patterns.iter().map(|p| p.to_string()).collect(), base)
    }

    fn matcher(layers: &[IgnorePattern]) -> IgnoreMatcher {
        IgnoreMatcher::new(layers).unwrap()
    }

    #[test]
    fn test_patterns_relative_to_subdirectory() {
        let sub = pattern(&["foo.js", "!bar.js", "/dist", "build/"], "/p/sub");
        assert_eq!(
            sub.patterns_relative_to(Path::new("/p")),
            vec![
                "/sub/**/foo.js",
                "!/sub/**/bar.js",
                "/sub/dist",
                "/sub/**/build/"
            ]
        );
        assert_eq!(
            sub.patterns_relative_to(Path::new("/p/sub")),
            sub.patterns.clone()
        );
    }

    #[test]
    fn test_defaults_hide_dotfiles_and_node_modules() {
        let m = matcher(&[IgnorePattern::defaults(Path::new("/p"))]);
        assert!(m.is_ignored(Path::new("/p/.hidden.js"), false, false, None));
        assert!(m.is_ignored(Path::new("/p/.git/config"), false, false, None));
        assert!(m.is_ignored(Path::new("/p/node_modules/pkg/index.js"), false, false, None));
        assert!(m.is_ignored(Path::new("/p/a/node_modules/pkg"), true, false, None));
        assert!(!m.is_ignored(Path::new("/p/src/index.js"), false, false, None));
        assert!(!m.is_ignored(Path::new("/p/.hidden.js"), false, true, None));
    }

    #[test]
    fn test_defaults_keep_config_documents() {
        let m = matcher(&[IgnorePattern::defaults(Path::new("/p"))]);
        assert!(!m.is_ignored(Path::new("/p/.stratarc.js"), false, false, None));
        assert!(!m.is_ignored(Path::new("/p/lib/.stratarc.json"), false, false, None));
        assert!(m.is_ignored(Path::new("/p/.stratarc"), false, false, None));
        assert!(m.is_ignored(Path::new("/p/.config/.stratarc.js"), false, false, None));
    }

    #[test]
    fn test_ancestor_exclusion_blocks_negation() {
        let m = matcher(&[pattern(&["d/", "!d/child.txt"], "/p")]);
        assert!(m.is_ignored(Path::new("/p/d/child.txt"), false, true, None));
        assert!(m.is_ignored(Path::new("/p/d"), true, true, None));
    }

    #[test]
    fn test_negation_of_file_pattern() {
        let m = matcher(&[pattern(&["*.js", "!keep.js"], "/p")]);
        assert!(m.is_ignored(Path::new("/p/a.js"), false, true, None));
        assert!(!m.is_ignored(Path::new("/p/keep.js"), false, true, None));
    }

    #[test]
    fn test_subdirectory_patterns_stay_in_subtree() {
        let m = matcher(&[
            pattern(&["foo.js"], "/p"),
            pattern(&["!foo.js"], "/p/subdir"),
        ]);
        assert!(m.is_ignored(Path::new("/p/foo.js"), false, true, None));
        assert!(!m.is_ignored(Path::new("/p/subdir/foo.js"), false, true, None));
        assert!(m.is_ignored(Path::new("/p/other/foo.js"), false, true, None));
    }

    #[test]
    fn test_entry_dir_is_never_ignored() {
        let m = matcher(&[pattern(&["vendor/"], "/p")]);
        assert!(m.is_ignored(Path::new("/p/vendor/lib.js"), false, true, None));
        assert!(!m.is_ignored(
            Path::new("/p/vendor/lib.js"),
            false,
            true,
            Some(Path::new("/p/vendor"))
        ));
        assert!(!m.is_ignored(
            Path::new("/p/vendor"),
            true,
            true,
            Some(Path::new("/p/vendor"))
        ));
    }

    #[test]
    fn test_paths_outside_base_are_not_ignored() {
        let m = matcher(&[pattern(&["*.js"], "/p")]);
        assert!(!m.is_ignored(Path::new("/q/a.js"), false, true, None));
        assert!(!m.is_ignored(Path::new("/p"), true, true, None));
    }

    #[test]
    fn test_ignore_file_is_anchored_to_its_directory() {
        let temp = TempDir::new().unwrap();
        let cwd = temp.path();
        fs::write(
            cwd.join(IGNORE_FILENAME),
            "# comment\n\n/build\n*.min.js\n!keep.min.js\n",
        )
        .unwrap();

        let state = IgnoreState::load(cwd, true, None, &[]).unwrap();
        let m = state.matcher(Vec::new()).unwrap();
        assert!(m.is_ignored(&cwd.join("build/a.js"), false, false, None));
        assert!(!m.is_ignored(&cwd.join("src/build/a.js"), false, false, None));
        assert!(m.is_ignored(&cwd.join("src/a.min.js"), false, false, None));
        assert!(!m.is_ignored(&cwd.join("src/keep.min.js"), false, false, None));
    }

    #[test]
    fn test_package_json_fallback() {
        let temp = TempDir::new().unwrap();
        let cwd = temp.path();
        fs::write(
            cwd.join("package.json"),
            r#"{ "name": "app", "strataIgnore": ["generated/"] }"#,
        )
        .unwrap();

        let state = IgnoreState::load(cwd, true, None, &[]).unwrap();
        let m = state.matcher(Vec::new()).unwrap();
        assert!(m.is_ignored(&cwd.join("generated/a.js"), false, false, None));
    }

    #[test]
    fn test_explicit_ignore_path_must_be_readable() {
        let temp = TempDir::new().unwrap();
        let error = IgnoreState::load(temp.path(), true, Some(temp.path()), &[]).unwrap_err();
        assert!(matches!(error, StrataError::IgnoreFileRead { .. }));

        let missing = temp.path().join("missing-ignore");
        assert!(IgnoreState::load(temp.path(), true, Some(&missing), &[]).is_err());
    }

    #[test]
    fn test_disabled_ignoring_keeps_defaults_only() {
        let temp = TempDir::new().unwrap();
        let cwd = temp.path();
        fs::write(cwd.join(IGNORE_FILENAME), "*.js\n").unwrap();

        let state = IgnoreState::load(cwd, false, None, &["*.ts".to_string()]).unwrap();
        let m = state
            .matcher(vec![IgnorePattern::new(vec!["*.css".to_string()], cwd)])
            .unwrap();
        assert!(!m.is_ignored(&cwd.join("a.js"), false, false, None));
        assert!(!m.is_ignored(&cwd.join("a.ts"), false, false, None));
        assert!(!m.is_ignored(&cwd.join("a.css"), false, false, None));
        assert!(m.is_ignored(&cwd.join("node_modules/x/a.js"), false, false, None));
    }

    #[test]
    fn test_cli_patterns_override_ignore_file() {
        let temp = TempDir::new().unwrap();
        let cwd = temp.path();
        fs::write(cwd.join(IGNORE_FILENAME), "*.js\n").unwrap();

        let state = IgnoreState::load(cwd, true, None, &["!keep.js".to_string()]).unwrap();
        let m = state.matcher(Vec::new()).unwrap();
        assert!(m.is_ignored(&cwd.join("a.js"), false, false, None));
        assert!(!m.is_ignored(&cwd.join("keep.js"), false, false, None));
    }
}
