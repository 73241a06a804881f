//! Path and glob utilities
//!
//! Everything here is lexical: paths are normalized without touching the
//! filesystem so that resolution results do not depend on symlinks or on the
//! process working directory.

use crate::{Result, StrataError};
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Component, Path, PathBuf};

/// Normalize `.` and `..` components without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                if !normalized.pop() && !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Resolve `path` against `cwd` and normalize the result
pub fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&cwd.join(path))
    }
}

/// `/`-separated path of `to` relative to the directory `from_dir`
///
/// Returns an empty string when both are the same path and uses `..`
/// segments when `to` lies outside `from_dir`.
pub fn relative_path(from_dir: &Path, to: &Path) -> String {
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let to: Vec<Component<'_>> = to.components().collect();

    let shared = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> = Vec::new();
    for _ in shared..from.len() {
        segments.push("..".to_string());
    }
    for component in &to[shared..] {
        segments.push(component.as_os_str().to_string_lossy().into_owned());
    }
    segments.join("/")
}

/// Deepest directory shared by every path
pub fn common_ancestor<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Option<PathBuf> {
    let mut iter = paths.into_iter();
    let first = iter.next()?;
    let mut common: Vec<Component<'_>> = first.components().collect();

    for path in iter {
        let shared = common
            .iter()
            .zip(path.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(shared);
    }

    Some(common.iter().map(|c| c.as_os_str()).collect())
}

/// Whether a string should be treated as a glob rather than a literal path
pub fn is_glob_pattern(pattern: &str) -> bool {
    const EXTGLOB_OPENERS: [&str; 5] = ["!(", "@(", "+(", "*(", "?("];

    pattern.contains(['*', '?', '[', '{'])
        || EXTGLOB_OPENERS.iter().any(|opener| pattern.contains(opener))
}

/// Longest leading portion of a glob that contains no glob characters
pub fn glob_parent(pattern: &str) -> String {
    let mut parent: Vec<&str> = Vec::new();
    for segment in pattern.split('/') {
        if is_glob_pattern(segment) {
            break;
        }
        parent.push(segment);
    }

    // Pattern without any glob segment: its parent is the containing directory
    if parent.len() == pattern.split('/').count() {
        parent.pop();
    }

    match parent.join("/") {
        joined if joined.is_empty() && pattern.starts_with('/') => "/".to_string(),
        joined if joined.is_empty() => ".".to_string(),
        joined => joined,
    }
}

/// Convert a path into the `/`-separated form globs are matched against
pub fn to_slash(path: &Path) -> String {
    let text = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        text.into_owned()
    } else {
        text.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Compile a glob where `*` stays inside one segment and `**` crosses them
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| StrataError::invalid_glob(pattern, e))
}

/// Whether the glob explicitly names dot segments (and may match dotfiles)
pub fn glob_names_dotfiles(pattern: &str) -> bool {
    pattern.split('/').any(|segment| {
        segment.len() > 1 && segment.starts_with('.') && segment != ".." && segment != "."
    })
}
