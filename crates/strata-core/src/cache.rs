//! Incremental lint result cache
//!
//! Results are stored in one JSON file mapping absolute file paths to the
//! file's fingerprint, the fingerprint of the configuration it was linted
//! with and the result itself. An entry is reused only while both
//! fingerprints still match.

use crate::config::EffectiveConfig;
use crate::lint::LintResult;
use crate::result::IoResultExt;
use crate::{Result, StrataError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::UNIX_EPOCH;

/// Default cache file name inside the working directory
pub const DEFAULT_CACHE_FILE: &str = ".stratacache";

/// How file changes are detected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    /// Modification time and size
    #[default]
    Metadata,
    /// SHA-256 of the contents and size
    Content,
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStrategy::Metadata => write!(f, "metadata"),
            CacheStrategy::Content => write!(f, "content"),
        }
    }
}

impl FromStr for CacheStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "metadata" => Ok(CacheStrategy::Metadata),
            "content" => Ok(CacheStrategy::Content),
            other => Err(format!(
                "Cache strategy must be one of: \"metadata\", \"content\" (got \"{other}\")"
            )),
        }
    }
}

/// Change-detection snapshot of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl FileFingerprint {
    pub fn compute(path: &Path, strategy: CacheStrategy) -> Result<Self> {
        match strategy {
            CacheStrategy::Metadata => {
                let metadata = fs::metadata(path).with_path(path)?;
                let mtime = metadata
                    .modified()
                    .ok()
                    .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                    .map(|elapsed| elapsed.as_millis() as u64);
                Ok(Self {
                    size: metadata.len(),
                    mtime,
                    hash: None,
                })
            }
            CacheStrategy::Content => {
                let bytes = fs::read(path).with_path(path)?;
                Ok(Self {
                    size: bytes.len() as u64,
                    mtime: None,
                    hash: Some(format!("{:x}", Sha256::digest(&bytes))),
                })
            }
        }
    }
}

/// One stored result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub fingerprint: FileFingerprint,
    pub config_fingerprint: String,
    pub result: LintResult,
}

/// Summary of a cache file, as shown by `strata cache info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub path: PathBuf,
    pub exists: bool,
    pub entries: usize,
    pub size_bytes: u64,
}

/// Lint results persisted between runs
#[derive(Debug)]
pub struct LintResultCache {
    path: PathBuf,
    strategy: CacheStrategy,
    entries: BTreeMap<PathBuf, CacheEntry>,
}

impl LintResultCache {
    /// Where the cache file lives for `location`, relative to `cwd`
    ///
    /// A location ending in a separator or naming an existing directory gets
    /// a file named after a hash of `cwd` inside it.
    pub fn cache_file_path(location: Option<&Path>, cwd: &Path) -> PathBuf {
        let Some(location) = location else {
            return cwd.join(DEFAULT_CACHE_FILE);
        };

        let text = location.to_string_lossy();
        let looks_like_directory = text.ends_with('/') || text.ends_with(std::path::MAIN_SEPARATOR);
        let resolved = crate::paths::absolutize(cwd, location);

        if looks_like_directory || resolved.is_dir() {
            let digest = format!("{:x}", Sha256::digest(cwd.to_string_lossy().as_bytes()));
            resolved.join(format!("{DEFAULT_CACHE_FILE}_{}", &digest[..16]))
        } else {
            resolved
        }
    }

    /// Read the cache file; a missing, unreadable or corrupt file yields an empty cache
    pub fn load(path: impl Into<PathBuf>, strategy: CacheStrategy) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt cache file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!("Cannot read cache file {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        tracing::debug!(
            "Loaded {} cached results from {}",
            entries.len(),
            path.display()
        );
        Self {
            path,
            strategy,
            entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached result for `file_path`, or `None` when it must be linted again
    pub fn get_cached_lint_results(
        &self,
        file_path: &Path,
        config: &EffectiveConfig,
    ) -> Option<LintResult> {
        let entry = self.entries.get(file_path)?;

        let current = match FileFingerprint::compute(file_path, self.strategy) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                tracing::debug!("Cannot fingerprint {}: {}", file_path.display(), e);
                return None;
            }
        };
        if entry.fingerprint != current {
            tracing::debug!("File changed: {}", file_path.display());
            return None;
        }
        if entry.config_fingerprint != config.fingerprint() {
            tracing::debug!("Configuration changed for {}", file_path.display());
            return None;
        }

        let mut result = entry.result.clone();
        if result.has_problems() && result.output.is_none() {
            match fs::read_to_string(file_path) {
                Ok(source) => result.source = Some(source),
                Err(e) => {
                    tracing::debug!("Cannot re-read {}: {}", file_path.display(), e);
                    return None;
                }
            }
        }

        tracing::debug!("Using cached result for {}", file_path.display());
        Some(result)
    }

    /// Store the result of linting `file_path` with `config`
    ///
    /// Results carrying fixed output are not cached.
    pub fn set_cached_lint_results(
        &mut self,
        file_path: &Path,
        config: &EffectiveConfig,
        result: &LintResult,
    ) {
        if result.output.is_some() {
            return;
        }

        let fingerprint = match FileFingerprint::compute(file_path, self.strategy) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                tracing::debug!("Not caching {}: {}", file_path.display(), e);
                return;
            }
        };

        let mut result = result.clone();
        result.source = None;
        self.entries.insert(
            file_path.to_path_buf(),
            CacheEntry {
                fingerprint,
                config_fingerprint: config.fingerprint(),
                result,
            },
        );
    }

    /// Prune vanished files under `scanned_roots` and write the cache file
    pub fn reconcile(&mut self, scanned_roots: &[PathBuf]) -> Result<()> {
        let before = self.entries.len();
        self.entries.retain(|path, _| {
            path.exists() || !scanned_roots.iter().any(|root| path.starts_with(root))
        });
        let pruned = before - self.entries.len();
        if pruned > 0 {
            tracing::debug!("Pruned {} stale cache entries", pruned);
        }

        self.write()
    }

    /// Remove a cache file if it exists
    pub fn delete(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!("Deleted cache file {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StrataError::cache_error(path, e.to_string())),
        }
    }

    /// Describe the cache file at `path` without keeping it loaded
    pub fn stats(path: &Path) -> CacheStats {
        let size_bytes = fs::metadata(path).map(|m| m.len()).ok();
        let entries = if size_bytes.is_some() {
            Self::load(path, CacheStrategy::default()).len()
        } else {
            0
        };
        CacheStats {
            path: path.to_path_buf(),
            exists: size_bytes.is_some(),
            entries,
            size_bytes: size_bytes.unwrap_or(0),
        }
    }

    /// Write to a temporary file next to the cache and rename it into place
    fn write(&self) -> Result<()> {
        let directory = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(directory).with_path(directory)?;

        let json = serde_json::to_string(&self.entries)
            .map_err(|e| StrataError::cache_error(&self.path, e.to_string()))?;

        let mut temp = tempfile::NamedTempFile::new_in(directory).with_path(directory)?;
        temp.write_all(json.as_bytes()).with_path(temp.path())?;
        temp.persist(&self.path)
            .map_err(|e| StrataError::cache_error(&self.path, e.to_string()))?;

        tracing::debug!(
            "Wrote {} cache entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuleEntry, RuleSeverity};
    use crate::lint::{LintMessage, LintOutput};
    use tempfile::TempDir;

    fn result_for(path: &Path, source: &str) -> LintResult {
        LintResult::from_output(
            path,
            LintOutput {
                messages: vec![LintMessage::new("semi", RuleSeverity::Error, "Missing semicolon.")],
                output: None,
            },
            source,
        )
    }

    fn config(severity: RuleSeverity) -> EffectiveConfig {
        let mut config = EffectiveConfig::default();
        config.rules.insert("semi".to_string(), RuleEntry::new(severity));
        config
    }

    #[test]
    fn test_cache_file_path() {
        let temp = TempDir::new().unwrap();
        let cwd = temp.path();

        assert_eq!(
            LintResultCache::cache_file_path(None, cwd),
            cwd.join(".stratacache")
        );
        assert_eq!(
            LintResultCache::cache_file_path(Some(Path::new("custom.json")), cwd),
            cwd.join("custom.json")
        );

        let in_dir = LintResultCache::cache_file_path(Some(Path::new("tmp/")), cwd);
        let name = in_dir.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(in_dir.parent().unwrap(), cwd.join("tmp"));
        assert!(name.starts_with(".stratacache_"));
        assert_eq!(name.len(), ".stratacache_".len() + 16);

        fs::create_dir(cwd.join("existing")).unwrap();
        let existing = LintResultCache::cache_file_path(Some(Path::new("existing")), cwd);
        assert_eq!(existing.parent().unwrap(), cwd.join("existing"));
    }

    #[test]
    fn test_hit_and_config_invalidation() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.js");
        fs::write(&file, "a = 1").unwrap();
        let cache_path = temp.path().join(".stratacache");

        let mut cache = LintResultCache::load(&cache_path, CacheStrategy::Metadata);
        let error_config = config(RuleSeverity::Error);
        cache.set_cached_lint_results(&file, &error_config, &result_for(&file, "a = 1"));
        cache.reconcile(&[temp.path().to_path_buf()]).unwrap();

        let cache = LintResultCache::load(&cache_path, CacheStrategy::Metadata);
        let hit = cache.get_cached_lint_results(&file, &error_config).unwrap();
        assert_eq!(hit.error_count, 1);
        assert_eq!(hit.source.as_deref(), Some("a = 1"));

        assert!(
            cache
                .get_cached_lint_results(&file, &config(RuleSeverity::Warn))
                .is_none()
        );
    }

    #[test]
    fn test_content_change_invalidates() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.js");
        fs::write(&file, "a = 1").unwrap();

        let mut cache = LintResultCache::load(temp.path().join("c"), CacheStrategy::Content);
        let config = config(RuleSeverity::Error);
        cache.set_cached_lint_results(&file, &config, &result_for(&file, "a = 1"));
        assert!(cache.get_cached_lint_results(&file, &config).is_some());

        fs::write(&file, "a = 2").unwrap();
        assert!(cache.get_cached_lint_results(&file, &config).is_none());
    }

    #[test]
    fn test_fixed_results_are_not_cached() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.js");
        fs::write(&file, "a").unwrap();

        let mut cache = LintResultCache::load(temp.path().join("c"), CacheStrategy::Metadata);
        let mut result = result_for(&file, "a");
        result.output = Some("a;".to_string());
        cache.set_cached_lint_results(&file, &config(RuleSeverity::Error), &result);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reconcile_prunes_only_scanned_roots() {
        let temp = TempDir::new().unwrap();
        let scanned = temp.path().join("src");
        let other = temp.path().join("lib");
        fs::create_dir_all(&scanned).unwrap();
        fs::create_dir_all(&other).unwrap();
        let gone_scanned = scanned.join("gone.js");
        let gone_other = other.join("gone.js");
        fs::write(&gone_scanned, "x").unwrap();
        fs::write(&gone_other, "x").unwrap();

        let cache_path = temp.path().join(".stratacache");
        let mut cache = LintResultCache::load(&cache_path, CacheStrategy::Metadata);
        let config = config(RuleSeverity::Error);
        cache.set_cached_lint_results(&gone_scanned, &config, &result_for(&gone_scanned, "x"));
        cache.set_cached_lint_results(&gone_other, &config, &result_for(&gone_other, "x"));

        fs::remove_file(&gone_scanned).unwrap();
        fs::remove_file(&gone_other).unwrap();
        cache.reconcile(&[scanned]).unwrap();

        let reloaded = LintResultCache::load(&cache_path, CacheStrategy::Metadata);
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.entries.contains_key(&gone_other));
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let cache_path = temp.path().join(".stratacache");
        fs::write(&cache_path, "{ not json").unwrap();

        let cache = LintResultCache::load(&cache_path, CacheStrategy::Metadata);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_delete_and_stats() {
        let temp = TempDir::new().unwrap();
        let cache_path = temp.path().join(".stratacache");
        LintResultCache::delete(&cache_path).unwrap();

        let mut cache = LintResultCache::load(&cache_path, CacheStrategy::Metadata);
        cache.reconcile(&[]).unwrap();
        let stats = LintResultCache::stats(&cache_path);
        assert!(stats.exists);
        assert_eq!(stats.entries, 0);

        LintResultCache::delete(&cache_path).unwrap();
        assert!(!cache_path.exists());
        assert!(!LintResultCache::stats(&cache_path).exists);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("content".parse::<CacheStrategy>(), Ok(CacheStrategy::Content));
        assert!("mtime".parse::<CacheStrategy>().is_err());
    }
}
