//! Module resolution for shareable configs, plugins and parsers
//!
//! Packages are plain directories under `node_modules`, found by walking from
//! the requesting directory towards the filesystem root. A package's entry
//! document is named by the `main` field of its `package.json`, falling back
//! to an `index` document in one of the supported formats.

use crate::paths::normalize_path;
use crate::{Result, StrataError};
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions tried for extension-less requests and package entry points
pub const DOCUMENT_EXTENSIONS: [&str; 4] = ["json", "yaml", "yml", "toml"];

/// Resolves a module request to the canonical path of a document on disk
pub trait ModuleResolver: Send + Sync {
    /// Resolve `request` as seen from `base_dir`
    ///
    /// Fails with [`StrataError::ModuleNotFound`] when nothing matches.
    fn resolve(&self, request: &str, base_dir: &Path) -> Result<PathBuf>;
}

/// Default resolver following the `node_modules` package layout
#[derive(Debug, Default, Clone)]
pub struct PackageResolver;

impl PackageResolver {
    pub fn new() -> Self {
        Self
    }

    fn resolve_path(&self, candidate: &Path) -> Option<PathBuf> {
        if candidate.is_file() {
            return Some(candidate.to_path_buf());
        }

        for ext in DOCUMENT_EXTENSIONS {
            let mut with_ext = candidate.as_os_str().to_owned();
            with_ext.push(".");
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }

        if candidate.is_dir() {
            return self.resolve_package_dir(candidate);
        }

        None
    }

    fn resolve_package_dir(&self, dir: &Path) -> Option<PathBuf> {
        if let Some(main) = read_package_main(dir) {
            let main_path = normalize_path(&dir.join(main));
            if main_path.is_file() {
                return Some(main_path);
            }
            tracing::debug!(
                "Package '{}' declares a missing main entry '{}'",
                dir.display(),
                main_path.display()
            );
        }

        DOCUMENT_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("index.{ext}")))
            .find(|index| index.is_file())
    }
}

impl ModuleResolver for PackageResolver {
    fn resolve(&self, request: &str, base_dir: &Path) -> Result<PathBuf> {
        let not_found = || StrataError::ModuleNotFound {
            request: request.to_string(),
            relative_to: base_dir.to_path_buf(),
        };

        let found = if is_path_request(request) {
            self.resolve_path(&normalize_path(&base_dir.join(request)))
        } else {
            base_dir.ancestors().find_map(|dir| {
                let candidate = dir.join("node_modules").join(request);
                self.resolve_path(&candidate)
            })
        };

        let found = found.ok_or_else(not_found)?;
        tracing::debug!("Resolved '{}' to {}", request, found.display());

        // Canonical paths give one identity per physical installation
        fs::canonicalize(&found).map_err(|e| StrataError::io_error(&found, e))
    }
}

/// Whether a request names a file path rather than a package
pub fn is_path_request(request: &str) -> bool {
    request.starts_with("./")
        || request.starts_with("../")
        || request == "."
        || request == ".."
        || Path::new(request).is_absolute()
}

fn read_package_main(dir: &Path) -> Option<String> {
    let text = fs::read_to_string(dir.join("package.json")).ok()?;
    let manifest: serde_json::Value = serde_json::from_str(&text).ok()?;
    manifest
        .get("main")
        .and_then(|main| main.as_str())
        .map(str::to_string)
}
