//! Override block matching
//!
//! An override applies to a file when the file matches one of its `files`
//! globs and none of its `excludedFiles` globs. Globs are evaluated against
//! the path relative to the directory of the document that declared the
//! block, so the result never depends on the working directory.

use crate::paths::{compile_glob, relative_path, to_slash};
use crate::{Result, StrataError};
use globset::GlobMatcher;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct CompiledPattern {
    matcher: GlobMatcher,
    /// Patterns without `/` match the file name at any depth
    basename_only: bool,
}

impl CompiledPattern {
    fn compile(pattern: &str) -> Result<Self> {
        if Path::new(pattern).is_absolute()
            || pattern.starts_with('/')
            || pattern.split('/').any(|segment| segment == "..")
        {
            return Err(StrataError::InvalidOverridePattern {
                pattern: pattern.to_string(),
            });
        }

        let normalized = pattern.strip_prefix("./").unwrap_or(pattern);
        Ok(Self {
            matcher: compile_glob(normalized)?,
            basename_only: !normalized.contains('/'),
        })
    }

    fn is_match(&self, relative: &str) -> bool {
        if self.basename_only {
            let basename = relative.rsplit('/').next().unwrap_or(relative);
            self.matcher.is_match(basename)
        } else {
            self.matcher.is_match(relative)
        }
    }
}

/// One nesting level of an override block
#[derive(Debug, Clone)]
struct PatternGroup {
    includes: Vec<CompiledPattern>,
    excludes: Vec<CompiledPattern>,
    sources: Vec<String>,
}

impl PatternGroup {
    fn test(&self, relative: &str) -> bool {
        (self.includes.is_empty() || self.includes.iter().any(|p| p.is_match(relative)))
            && !self.excludes.iter().any(|p| p.is_match(relative))
    }
}

/// Tests file paths against the criteria of an override block
#[derive(Debug, Clone)]
pub struct OverrideTester {
    groups: Vec<PatternGroup>,
    base_path: PathBuf,
    ends_with_wildcard: bool,
}

impl OverrideTester {
    /// Compile the criteria of one override block
    ///
    /// Returns `None` when the block has no `files` patterns.
    pub fn create(
        files: &[String],
        excluded_files: &[String],
        base_path: &Path,
    ) -> Result<Option<Self>> {
        if files.is_empty() {
            return Ok(None);
        }

        let includes = files
            .iter()
            .map(|p| CompiledPattern::compile(p))
            .collect::<Result<Vec<_>>>()?;
        let excludes = excluded_files
            .iter()
            .map(|p| CompiledPattern::compile(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Self {
            groups: vec![PatternGroup {
                includes,
                excludes,
                sources: files.to_vec(),
            }],
            base_path: base_path.to_path_buf(),
            ends_with_wildcard: files.iter().all(|p| p.ends_with('*')),
        }))
    }

    /// Combine the criteria of a nested override with its parent's
    ///
    /// Both testers must share a base path; the result matches only files
    /// matched by both.
    pub fn and(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (None, None) => None,
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (Some(mut a), Some(b)) => {
                debug_assert_eq!(a.base_path, b.base_path);
                a.groups.extend(b.groups);
                a.ends_with_wildcard = a.ends_with_wildcard || b.ends_with_wildcard;
                Some(a)
            }
        }
    }

    /// Whether `file_path` (absolute) is matched by every nesting level
    pub fn test(&self, file_path: &Path) -> bool {
        if !file_path.starts_with(&self.base_path) {
            return false;
        }
        let relative = relative_path(&self.base_path, file_path);
        let relative = to_slash(Path::new(&relative));
        self.groups.iter().all(|group| group.test(&relative))
    }

    /// Whether every `files` pattern ends with `*`
    ///
    /// Such blocks refine already-selected files and never add lint targets.
    pub fn ends_with_wildcard(&self) -> bool {
        self.ends_with_wildcard
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// `files` patterns of each nesting level, outermost first
    pub fn file_patterns(&self) -> impl Iterator<Item = &[String]> {
        self.groups.iter().map(|group| group.sources.as_slice())
    }
}
