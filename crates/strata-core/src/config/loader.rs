//! Configuration file discovery and parsing

use crate::{Result, StrataError};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file names, highest priority first
pub const CONFIG_FILENAMES: [&str; 6] = [
    ".stratarc.toml",
    ".stratarc.yaml",
    ".stratarc.yml",
    ".stratarc.json",
    ".stratarc",
    "package.json",
];

/// Key holding embedded configuration in `package.json`
pub const PACKAGE_CONFIG_KEY: &str = "strataConfig";

/// Key holding embedded ignore patterns in `package.json`
pub const PACKAGE_IGNORE_KEY: &str = "strataIgnore";

/// Configuration loader for discovering and parsing config files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Find the configuration document of a single directory
    ///
    /// Searches in the following order:
    /// 1. `.stratarc.toml`
    /// 2. `.stratarc.yaml` / `.stratarc.yml`
    /// 3. `.stratarc.json` (comments and trailing commas allowed)
    /// 4. `.stratarc` (legacy, YAML or JSON)
    /// 5. `package.json` with a `strataConfig` field
    ///
    /// A `package.json` without the field does not count as a document.
    pub fn find_in_directory(dir: &Path) -> Result<Option<(PathBuf, Value)>> {
        for filename in CONFIG_FILENAMES {
            let config_path = dir.join(filename);
            if !config_path.is_file() {
                continue;
            }

            if filename == "package.json" {
                if let Some(value) = Self::load_package_field(&config_path, PACKAGE_CONFIG_KEY)? {
                    tracing::debug!("Found config: {}", config_path.display());
                    return Ok(Some((config_path, value)));
                }
                tracing::debug!(
                    "Skipping {} without '{}'",
                    config_path.display(),
                    PACKAGE_CONFIG_KEY
                );
                continue;
            }

            tracing::debug!("Found config: {}", config_path.display());
            let value = Self::load_file(&config_path)?;
            return Ok(Some((config_path, value)));
        }

        Ok(None)
    }

    /// Parse a configuration document, choosing the format from its file name
    pub fn load_file(path: &Path) -> Result<Value> {
        let text = Self::read(path)?;

        if path.file_name().is_some_and(|name| name == "package.json") {
            return Self::parse_package_field(path, &text, PACKAGE_CONFIG_KEY)?
                .ok_or_else(|| {
                    StrataError::config_parse(
                        path,
                        format!("package.json has no '{PACKAGE_CONFIG_KEY}' field"),
                    )
                });
        }

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
        let value = match extension {
            "json" => json5::from_str::<Value>(&text)
                .map_err(|e| StrataError::config_parse(path, e.to_string()))?,
            "toml" => toml::from_str::<Value>(&text)
                .map_err(|e| StrataError::config_parse(path, e.to_string()))?,
            // `.yaml`, `.yml` and the legacy extension-less file; YAML accepts JSON too
            _ => serde_yaml::from_str::<Value>(&text)
                .map_err(|e| StrataError::config_parse(path, e.to_string()))?,
        };

        // An empty YAML document means an empty configuration
        Ok(match value {
            Value::Null => Value::Object(Default::default()),
            other => other,
        })
    }

    /// Read one top-level field of a `package.json`
    pub fn load_package_field(path: &Path, key: &str) -> Result<Option<Value>> {
        let text = Self::read(path)?;
        Self::parse_package_field(path, &text, key)
    }

    fn parse_package_field(path: &Path, text: &str, key: &str) -> Result<Option<Value>> {
        let manifest: Value = serde_json::from_str(text)
            .map_err(|e| StrataError::config_parse(path, e.to_string()))?;
        Ok(manifest.get(key).cloned())
    }

    fn read(path: &Path) -> Result<String> {
        let text = fs::read_to_string(path).map_err(|source| StrataError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        })
    }
}
