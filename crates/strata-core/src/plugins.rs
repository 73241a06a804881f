//! Plugin loading and identity conflict detection
//!
//! A plugin is a data document (JSON, YAML or TOML) describing the rules,
//! shareable configs, processors and environments it provides. Plugins are
//! identified by their shorthand id (`foo`, `@scope`, `@scope/foo`) and by the
//! canonical path of the installation they were loaded from.

use crate::config::GlobalAccess;
use crate::config::loader::ConfigLoader;
use crate::error::PluginConflictSource;
use crate::module_resolver::ModuleResolver;
use crate::{Result, StrataError};
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Package name prefix of plugins
pub const PLUGIN_PREFIX: &str = "strata-plugin";

/// Package name prefix of shareable configs
pub const CONFIG_PREFIX: &str = "strata-config";

/// Metadata of a rule provided by a plugin
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleDefinition {
    pub description: Option<String>,
    pub fixable: Option<String>,
    pub deprecated: bool,
    /// Positional option schemas; an empty list means the rule takes no options
    pub schema: Option<Value>,
}

/// A processor a plugin exposes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessorCapability {
    pub description: Option<String>,
    pub supports_autofix: bool,
}

/// An environment a plugin exposes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentDefinition {
    pub globals: IndexMap<String, GlobalAccess>,
    pub parser_options: Map<String, Value>,
}

/// Capabilities of one loaded plugin
///
/// Consumers check for the capability they need instead of assuming a shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginDefinition {
    pub rules: IndexMap<String, RuleDefinition>,
    /// Shareable configs; validated when something extends them
    pub configs: IndexMap<String, Value>,
    pub processors: IndexMap<String, ProcessorCapability>,
    pub environments: IndexMap<String, EnvironmentDefinition>,
}

impl PluginDefinition {
    pub fn rule(&self, name: &str) -> Option<&RuleDefinition> {
        self.rules.get(name)
    }

    pub fn config(&self, name: &str) -> Option<&Value> {
        self.configs.get(name)
    }

    pub fn processor(&self, name: &str) -> Option<&ProcessorCapability> {
        self.processors.get(name)
    }

    pub fn environment(&self, name: &str) -> Option<&EnvironmentDefinition> {
        self.environments.get(name)
    }

    /// Processors keyed by file extension (`.md`), which imply an override block
    pub fn extension_processors(&self) -> impl Iterator<Item = &str> {
        self.processors
            .keys()
            .map(String::as_str)
            .filter(|name| name.starts_with('.'))
    }
}

/// A plugin resolved on behalf of one configuration source
#[derive(Debug, Clone)]
pub struct PluginRef {
    /// Shorthand id used in rule names, e.g. `foo` for `strata-plugin-foo`
    pub id: String,
    pub package_name: String,
    /// Canonical path of the plugin document
    pub file_path: PathBuf,
    pub importer_name: String,
    pub importer_path: Option<PathBuf>,
    pub definition: Arc<PluginDefinition>,
}

impl PartialEq for PluginRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.file_path == other.file_path
    }
}

/// The configuration source declaring a plugin
#[derive(Debug, Clone, Copy)]
pub struct PluginImporter<'a> {
    pub name: &'a str,
    pub path: Option<&'a Path>,
    /// Directory plugin resolution starts from
    pub base_dir: &'a Path,
}

/// Loads plugin documents, caching definitions by canonical path
pub struct PluginLoader {
    resolver: Arc<dyn ModuleResolver>,
    resolve_plugins_relative_to: Option<PathBuf>,
    definitions: DashMap<PathBuf, Arc<PluginDefinition>>,
}

impl PluginLoader {
    pub fn new(
        resolver: Arc<dyn ModuleResolver>,
        resolve_plugins_relative_to: Option<PathBuf>,
    ) -> Self {
        Self {
            resolver,
            resolve_plugins_relative_to,
            definitions: DashMap::new(),
        }
    }

    /// Resolve and load the plugin `name` declared by `importer`
    pub fn load(&self, name: &str, importer: PluginImporter<'_>) -> Result<PluginRef> {
        check_plugin_name(name, importer.name)?;

        let package_name = normalize_package_name(name, PLUGIN_PREFIX);
        let id = get_shorthand_name(&package_name, PLUGIN_PREFIX);
        let base_dir = self
            .resolve_plugins_relative_to
            .as_deref()
            .unwrap_or(importer.base_dir);

        let file_path = match self.resolver.resolve(&package_name, base_dir) {
            Ok(path) => path,
            Err(StrataError::ModuleNotFound { .. }) => {
                return Err(StrataError::PluginMissing {
                    plugin_name: name.to_string(),
                    package_name,
                    importer_name: importer.name.to_string(),
                    resolve_plugins_relative_to: base_dir.to_path_buf(),
                });
            }
            Err(err) => return Err(err),
        };

        let definition = self.definition(&file_path)?;
        tracing::debug!(
            "Loaded plugin '{}' from {} (declared in {})",
            id,
            file_path.display(),
            importer.name
        );

        Ok(PluginRef {
            id,
            package_name,
            file_path,
            importer_name: importer.name.to_string(),
            importer_path: importer.path.map(Path::to_path_buf),
            definition,
        })
    }

    fn definition(&self, file_path: &Path) -> Result<Arc<PluginDefinition>> {
        if let Some(cached) = self.definitions.get(file_path) {
            return Ok(Arc::clone(cached.value()));
        }

        let value = ConfigLoader::load_file(file_path)?;
        let definition: PluginDefinition = serde_json::from_value(value)
            .map_err(|e| StrataError::config_parse(file_path, e.to_string()))?;
        let definition = Arc::new(definition);

        self.definitions
            .insert(file_path.to_path_buf(), Arc::clone(&definition));
        Ok(definition)
    }

    /// Number of distinct installations loaded so far
    pub fn loaded_count(&self) -> usize {
        self.definitions.len()
    }

    pub fn clear(&self) {
        self.definitions.clear();
    }
}

fn check_plugin_name(name: &str, importer_name: &str) -> Result<()> {
    if name.chars().any(char::is_whitespace) {
        return Err(StrataError::invalid_config(
            importer_name,
            format!("Whitespace found in plugin name '{name}'"),
        ));
    }

    let is_path = name.starts_with('.')
        || Path::new(name).is_absolute()
        || name.contains('\\')
        || if name.starts_with('@') {
            name.matches('/').count() > 1
        } else {
            name.contains('/')
        };

    if is_path {
        return Err(StrataError::invalid_config(
            importer_name,
            format!("Plugin '{name}' must be a package name, not a file path."),
        ));
    }
    Ok(())
}

/// Expand a shorthand into a full package name
///
/// `foo` becomes `<prefix>-foo`, `@scope` becomes `@scope/<prefix>` and
/// `@scope/foo` becomes `@scope/<prefix>-foo`. Full names pass through.
pub fn normalize_package_name(name: &str, prefix: &str) -> String {
    let name = name.replace('\\', "/");

    if let Some(scoped) = name.strip_prefix('@') {
        let (scope, rest) = match scoped.split_once('/') {
            Some((scope, rest)) => (scope, rest),
            None => (scoped, ""),
        };

        if rest.is_empty() || rest == prefix {
            return format!("@{scope}/{prefix}");
        }

        let first_segment = rest.split('/').next().unwrap_or(rest);
        if first_segment == prefix || first_segment.starts_with(&format!("{prefix}-")) {
            return name;
        }
        return format!("@{scope}/{prefix}-{rest}");
    }

    if name.starts_with(&format!("{prefix}-")) {
        name
    } else {
        format!("{prefix}-{name}")
    }
}

/// Reduce a full package name to the id used in rule and config references
pub fn get_shorthand_name(full_name: &str, prefix: &str) -> String {
    if let Some(scoped) = full_name.strip_prefix('@') {
        if let Some((scope, rest)) = scoped.split_once('/') {
            if rest == prefix {
                return format!("@{scope}");
            }
            if let Some(short) = rest.strip_prefix(&format!("{prefix}-")) {
                return format!("@{scope}/{short}");
            }
        }
    } else if let Some(short) = full_name.strip_prefix(&format!("{prefix}-")) {
        return short.to_string();
    }
    full_name.to_string()
}

/// Split `plugin/name` references at the last slash into (plugin id, name)
pub fn split_plugin_reference(reference: &str) -> Option<(&str, &str)> {
    let index = reference.rfind('/')?;
    let (plugin_id, name) = (&reference[..index], &reference[index + 1..]);
    if plugin_id.is_empty() || name.is_empty() {
        None
    } else {
        Some((plugin_id, name))
    }
}

/// Fail when refs sharing an id were loaded from different installations
///
/// Refs resolving to the same canonical path never conflict.
pub fn detect_plugin_conflicts<'a>(refs: impl IntoIterator<Item = &'a PluginRef>) -> Result<()> {
    let mut by_id: IndexMap<&str, Vec<&PluginRef>> = IndexMap::new();
    for plugin in refs {
        by_id.entry(plugin.id.as_str()).or_default().push(plugin);
    }

    for (plugin_id, plugins) in by_id {
        let first_path = &plugins[0].file_path;
        if plugins.iter().all(|p| &p.file_path == first_path) {
            continue;
        }

        let mut sources: Vec<PluginConflictSource> = Vec::new();
        for plugin in plugins {
            let source = PluginConflictSource {
                importer_name: plugin.importer_name.clone(),
                file_path: plugin.file_path.clone(),
            };
            if !sources.contains(&source) {
                sources.push(source);
            }
        }

        tracing::debug!("Plugin '{}' conflicts across {} sources", plugin_id, sources.len());
        return Err(StrataError::PluginConflict {
            plugin_id: plugin_id.to_string(),
            sources,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_resolver::PackageResolver;
    use std::fs;
    use tempfile::TempDir;

    fn plugin_ref(id: &str, path: &str, importer: &str) -> PluginRef {
        PluginRef {
            id: id.to_string(),
            package_name: normalize_package_name(id, PLUGIN_PREFIX),
            file_path: PathBuf::from(path),
            importer_name: importer.to_string(),
            importer_path: None,
            definition: Arc::new(PluginDefinition::default()),
        }
    }

    #[test]
    fn test_normalize_package_name() {
        assert_eq!(normalize_package_name("foo", PLUGIN_PREFIX), "strata-plugin-foo");
        assert_eq!(
            normalize_package_name("strata-plugin-foo", PLUGIN_PREFIX),
            "strata-plugin-foo"
        );
        assert_eq!(normalize_package_name("@scope", PLUGIN_PREFIX), "@scope/strata-plugin");
        assert_eq!(
            normalize_package_name("@scope/foo", PLUGIN_PREFIX),
            "@scope/strata-plugin-foo"
        );
        assert_eq!(
            normalize_package_name("@scope/strata-plugin-foo", PLUGIN_PREFIX),
            "@scope/strata-plugin-foo"
        );
        assert_eq!(normalize_package_name("foo", CONFIG_PREFIX), "strata-config-foo");
    }

    #[test]
    fn test_get_shorthand_name() {
        assert_eq!(get_shorthand_name("strata-plugin-foo", PLUGIN_PREFIX), "foo");
        assert_eq!(get_shorthand_name("@scope/strata-plugin", PLUGIN_PREFIX), "@scope");
        assert_eq!(
            get_shorthand_name("@scope/strata-plugin-foo", PLUGIN_PREFIX),
            "@scope/foo"
        );
        assert_eq!(get_shorthand_name("other", PLUGIN_PREFIX), "other");
    }

    #[test]
    fn test_split_plugin_reference() {
        assert_eq!(split_plugin_reference("foo/bar"), Some(("foo", "bar")));
        assert_eq!(
            split_plugin_reference("@scope/foo/bar"),
            Some(("@scope/foo", "bar"))
        );
        assert_eq!(split_plugin_reference("semi"), None);
    }

    #[test]
    fn test_identical_paths_never_conflict() {
        let a = plugin_ref("foo", "/p/node_modules/strata-plugin-foo/index.json", "a");
        let b = plugin_ref("foo", "/p/node_modules/strata-plugin-foo/index.json", "b");
        assert!(detect_plugin_conflicts([&a, &b]).is_ok());
    }

    #[test]
    fn test_distinct_paths_conflict() {
        let a = plugin_ref("foo", "/p/node_modules/strata-plugin-foo/index.json", "CLIOptions");
        let b = plugin_ref("foo", "/p/sub/node_modules/strata-plugin-foo/index.json", "--config");
        let c = plugin_ref("bar", "/p/node_modules/strata-plugin-bar/index.json", "a");

        match detect_plugin_conflicts([&c, &a, &b]).unwrap_err() {
            StrataError::PluginConflict { plugin_id, sources } => {
                assert_eq!(plugin_id, "foo");
                assert_eq!(sources.len(), 2);
                assert_eq!(sources[0].importer_name, "CLIOptions");
                assert_eq!(sources[1].importer_name, "--config");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_path_names() {
        assert!(check_plugin_name("./local", "x").is_err());
        assert!(check_plugin_name("a/b", "x").is_err());
        assert!(check_plugin_name("@scope/a/b", "x").is_err());
        assert!(check_plugin_name("with space", "x").is_err());
        assert!(check_plugin_name("@scope/foo", "x").is_ok());
    }

    #[test]
    fn test_load_caches_by_canonical_path() {
        let temp = TempDir::new().unwrap();
        let pkg = temp.path().join("node_modules/strata-plugin-foo");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(
            pkg.join("index.json"),
            r#"{ "rules": { "no-bar": { "schema": [] } }, "processors": { ".md": {} } }"#,
        )
        .unwrap();
        fs::create_dir_all(temp.path().join("sub")).unwrap();

        let loader = PluginLoader::new(Arc::new(PackageResolver::new()), None);
        let root_ref = loader
            .load(
                "foo",
                PluginImporter {
                    name: ".stratarc.json",
                    path: None,
                    base_dir: temp.path(),
                },
            )
            .unwrap();
        let sub_ref = loader
            .load(
                "strata-plugin-foo",
                PluginImporter {
                    name: "sub/.stratarc.json",
                    path: None,
                    base_dir: &temp.path().join("sub"),
                },
            )
            .unwrap();

        assert_eq!(root_ref, sub_ref);
        assert!(Arc::ptr_eq(&root_ref.definition, &sub_ref.definition));
        assert_eq!(loader.loaded_count(), 1);
        assert_eq!(
            root_ref.definition.extension_processors().collect::<Vec<_>>(),
            vec![".md"]
        );
    }

    #[test]
    fn test_missing_plugin_error_data() {
        let temp = TempDir::new().unwrap();
        let loader = PluginLoader::new(Arc::new(PackageResolver::new()), None);
        let error = loader
            .load(
                "missing",
                PluginImporter {
                    name: ".stratarc.json",
                    path: None,
                    base_dir: temp.path(),
                },
            )
            .unwrap_err();

        assert_eq!(error.message_template(), Some("plugin-missing"));
        let data = error.message_data().unwrap();
        assert_eq!(data["pluginName"], "strata-plugin-missing");
        assert_eq!(data["importerName"], ".stratarc.json");
    }
}
