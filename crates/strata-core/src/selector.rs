//! File selection for lint runs
//!
//! Turns command-line patterns into concrete files. A pattern naming an
//! existing file yields it directly, a directory is walked for target files
//! and anything else is treated as a glob when globbing is enabled.

use crate::config::{ConfigChain, ConfigResolver};
use crate::paths::{absolutize, compile_glob, glob_names_dotfiles, glob_parent, is_glob_pattern, to_slash};
use crate::{Result, StrataError};
use globset::GlobMatcher;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Extension linted when none are configured
pub const DEFAULT_EXTENSION: &str = ".js";

/// Selection settings taken from the engine options
#[derive(Debug, Clone)]
pub struct SelectorOptions {
    pub cwd: PathBuf,
    /// Explicit target extensions, each starting with `.`
    pub extensions: Option<Vec<String>>,
    pub glob_input_paths: bool,
    pub error_on_unmatched_pattern: bool,
}

/// A file chosen for linting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub file_path: PathBuf,
    /// Named explicitly but excluded by the ignore engine
    pub ignored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    None,
    /// Given directly on the command line; reported with a warning
    Ignored,
    /// Found by a walk; dropped without a warning
    IgnoredSilently,
}

/// How a walk decides which files it yields
enum WalkFilter {
    Glob(GlobMatcher),
    Targets,
}

struct Walk<'p> {
    root: PathBuf,
    /// The root was named directly and cannot be ignored
    explicit_root: bool,
    recursive: bool,
    dotfiles: bool,
    filter: WalkFilter,
    pattern: &'p str,
}

/// Enumerates files for a list of patterns
pub struct FileSelector<'a> {
    resolver: &'a ConfigResolver,
    options: SelectorOptions,
}

impl<'a> FileSelector<'a> {
    pub fn new(resolver: &'a ConfigResolver, options: SelectorOptions) -> Self {
        Self { resolver, options }
    }

    /// Files selected by `patterns`, de-duplicated, in discovery order
    ///
    /// With `error_on_unmatched_pattern`, the first pattern that yields
    /// nothing fails with [`StrataError::NoFilesFound`], and the first whose
    /// matches were all silently ignored fails with
    /// [`StrataError::AllFilesIgnored`].
    pub fn select<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Vec<SelectedFile>> {
        let mut seen = HashSet::new();
        let mut selected = Vec::new();

        for pattern in patterns.iter().map(AsRef::as_ref) {
            if pattern.is_empty() {
                continue;
            }

            let mut found_regardless_of_ignored = false;
            let mut found = false;

            for (file_path, flag) in self.iterate_pattern(pattern)? {
                found_regardless_of_ignored = true;
                if flag == Flag::IgnoredSilently {
                    continue;
                }
                found = true;

                if seen.insert(file_path.clone()) {
                    selected.push(SelectedFile {
                        file_path,
                        ignored: flag == Flag::Ignored,
                    });
                }
            }

            if self.options.error_on_unmatched_pattern && !found {
                if found_regardless_of_ignored {
                    return Err(StrataError::AllFilesIgnored {
                        pattern: pattern.to_string(),
                    });
                }
                return Err(StrataError::NoFilesFound {
                    pattern: pattern.to_string(),
                    glob_disabled: !self.options.glob_input_paths && is_glob_pattern(pattern),
                });
            }
        }

        tracing::debug!("Selected {} files", selected.len());
        Ok(selected)
    }

    /// Directories a run over `patterns` scans
    ///
    /// Cache entries under these roots whose files vanished can be pruned.
    pub fn scanned_roots<S: AsRef<str>>(&self, patterns: &[S]) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        for pattern in patterns.iter().map(AsRef::as_ref).filter(|p| !p.is_empty()) {
            let path = absolutize(&self.options.cwd, Path::new(pattern));
            let root = if path.exists() {
                path
            } else if self.options.glob_input_paths && is_glob_pattern(pattern) {
                absolutize(&self.options.cwd, Path::new(&glob_parent(&to_slash(&path))))
            } else {
                continue;
            };
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        roots
    }

    /// Whether a file found in a directory walk should be linted
    pub fn is_target_path(&self, file_path: &Path, chain: &ConfigChain) -> bool {
        let file_name = file_path.to_string_lossy();
        if let Some(extensions) = &self.options.extensions {
            return extensions.iter().any(|ext| file_name.ends_with(ext.as_str()));
        }
        file_name.ends_with(DEFAULT_EXTENSION) || chain.is_additional_target_path(file_path)
    }

    fn iterate_pattern(&self, pattern: &str) -> Result<Vec<(PathBuf, Flag)>> {
        let absolute = absolutize(&self.options.cwd, Path::new(pattern));
        let dotfiles = glob_names_dotfiles(pattern);

        if absolute.is_dir() {
            return self.walk(Walk {
                root: absolute,
                explicit_root: true,
                recursive: true,
                dotfiles,
                filter: WalkFilter::Targets,
                pattern,
            });
        }
        if absolute.is_file() {
            return self.iterate_file(absolute).map(|file| vec![file]);
        }
        if self.options.glob_input_paths && is_glob_pattern(pattern) {
            let absolute_pattern = to_slash(&absolute);
            let root = PathBuf::from(glob_parent(&absolute_pattern));
            let glob_part = absolute_pattern
                .strip_prefix(&to_slash(&root))
                .unwrap_or(&absolute_pattern)
                .trim_start_matches('/');
            let recursive = glob_part.contains("**") || glob_part.contains('/');

            return self.walk(Walk {
                root,
                explicit_root: false,
                recursive,
                dotfiles,
                filter: WalkFilter::Glob(compile_glob(&absolute_pattern)?),
                pattern,
            });
        }

        Ok(Vec::new())
    }

    fn iterate_file(&self, file_path: PathBuf) -> Result<(PathBuf, Flag)> {
        // Without --no-ignore a direct file follows the same rules as any other
        let ignored = if self.resolver.ignore_enabled() {
            let chain = self.chain_for(&file_path)?;
            chain.ignore().is_ignored(&file_path, false, false, None)
        } else {
            false
        };
        let flag = if ignored { Flag::Ignored } else { Flag::None };
        Ok((file_path, flag))
    }

    fn walk(&self, walk: Walk<'_>) -> Result<Vec<(PathBuf, Flag)>> {
        tracing::debug!(
            "Walking {} for '{}' (recursive: {})",
            walk.root.display(),
            walk.pattern,
            walk.recursive
        );

        let mut walker = WalkDir::new(&walk.root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        if !walk.recursive {
            walker = walker.max_depth(1);
        }

        let entry_dir = walk.explicit_root.then_some(walk.root.as_path());
        let mut files = Vec::new();
        let mut entries = walker.into_iter();
        while let Some(entry) = entries.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            let chain = self.chain_for(path)?;

            if entry.file_type().is_dir() {
                if chain
                    .ignore()
                    .is_ignored(path, true, walk.dotfiles, entry_dir)
                {
                    tracing::trace!("Pruning ignored directory {}", path.display());
                    entries.skip_current_dir();
                }
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            let matched = match &walk.filter {
                WalkFilter::Glob(glob) => glob.is_match(to_slash(path)),
                WalkFilter::Targets => self.is_target_path(path, &chain),
            };
            if !matched {
                continue;
            }

            let ignored = chain
                .ignore()
                .is_ignored(path, false, walk.dotfiles, entry_dir);
            let flag = if ignored {
                Flag::IgnoredSilently
            } else {
                Flag::None
            };
            files.push((path.to_path_buf(), flag));
        }

        Ok(files)
    }

    fn chain_for(&self, path: &Path) -> Result<Arc<ConfigChain>> {
        let directory = path.parent().unwrap_or(path);
        self.resolver.chain_for_directory(directory)
    }
}
