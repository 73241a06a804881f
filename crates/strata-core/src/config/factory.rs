//! Normalization of configuration documents into chain entries
//!
//! A document expands into a flat list of [`ConfigEntry`] values: first the
//! entries of everything it extends, then implicit processor overrides, then
//! the document's own entry, then its override blocks (recursively).

use super::chain::{ChainLayer, ConfigEntry, ParserRef};
use super::data::ConfigData;
use super::loader::ConfigLoader;
use super::validator::ConfigValidator;
use crate::module_resolver::{ModuleResolver, is_path_request};
use crate::ignore_pattern::IgnorePattern;
use crate::overrides::OverrideTester;
use crate::paths::relative_path;
use crate::plugins::{
    CONFIG_PREFIX, PluginImporter, PluginLoader, PluginRef, normalize_package_name,
};
use crate::{Result, StrataError};
use dashmap::DashMap;
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Prefix of built-in configuration names
pub const BUILTIN_PREFIX: &str = "strata:";

/// Prefix of plugin configuration references in `extends`
pub const PLUGIN_CONFIG_PREFIX: &str = "plugin:";

/// Inputs shared by every document a factory loads
#[derive(Clone)]
pub struct FactoryOptions {
    pub cwd: PathBuf,
    pub resolver: Arc<dyn ModuleResolver>,
    pub resolve_plugins_relative_to: Option<PathBuf>,
    pub recommended_config_path: Option<PathBuf>,
    pub all_config_path: Option<PathBuf>,
}

/// State of the document currently being normalized
#[derive(Clone)]
struct LoadContext {
    name: String,
    file_path: Option<PathBuf>,
    /// Base of override globs and `ignorePatterns`
    match_base: PathBuf,
    /// Directory plugins are resolved from
    plugin_base: PathBuf,
    layer: ChainLayer,
    /// `extends` traversal stack as (identity, display name)
    stack: Vec<(String, String)>,
}

impl LoadContext {
    fn enter(&self, identity: String, display: String) -> Result<Self> {
        if let Some(start) = self.stack.iter().position(|(id, _)| *id == identity) {
            let mut chain: Vec<String> = self.stack[start..]
                .iter()
                .map(|(_, display)| display.clone())
                .collect();
            chain.push(display);
            return Err(StrataError::CircularExtends { chain });
        }
        let mut next = self.clone();
        next.stack.push((identity, display));
        Ok(next)
    }

    fn extended(&self, name: String, file_path: Option<PathBuf>) -> Self {
        Self {
            name,
            file_path,
            ..self.clone()
        }
    }

    /// Directory relative `extends` and parsers resolve from
    fn resolve_base(&self, cwd: &Path) -> PathBuf {
        self.file_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf())
    }
}

/// Loads, validates and flattens configuration documents
pub struct ConfigFactory {
    options: FactoryOptions,
    plugins: PluginLoader,
    documents: DashMap<PathBuf, Arc<ConfigData>>,
}

impl ConfigFactory {
    pub fn new(options: FactoryOptions) -> Self {
        let plugins = PluginLoader::new(
            Arc::clone(&options.resolver),
            options.resolve_plugins_relative_to.clone(),
        );
        Self {
            options,
            plugins,
            documents: DashMap::new(),
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.options.cwd
    }

    /// Load the configuration document of `dir`, if it has one
    pub fn load_in_directory(&self, dir: &Path) -> Result<Option<Vec<ConfigEntry>>> {
        let Some((path, value)) = ConfigLoader::find_in_directory(dir)? else {
            return Ok(None);
        };

        let name = self.display_name(&path);
        let data = Arc::new(ConfigValidator::validate(&value, &name)?);
        self.documents.insert(path.clone(), Arc::clone(&data));

        let ctx = LoadContext {
            name: name.clone(),
            file_path: Some(path.clone()),
            match_base: dir.to_path_buf(),
            plugin_base: dir.to_path_buf(),
            layer: ChainLayer::Cascade,
            stack: Vec::new(),
        }
        .enter(identity_of(&path), name)?;

        self.normalize(&data, &ctx).map(Some)
    }

    /// Load a configuration file given explicitly, e.g. with `--config`
    ///
    /// Override globs and ignore patterns are relative to the working directory.
    pub fn load_file(&self, path: &Path, name: &str, layer: ChainLayer) -> Result<Vec<ConfigEntry>> {
        let data = self.document(path)?;
        let plugin_base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.options.cwd.clone());

        let ctx = LoadContext {
            name: name.to_string(),
            file_path: Some(path.to_path_buf()),
            match_base: self.options.cwd.clone(),
            plugin_base,
            layer,
            stack: Vec::new(),
        }
        .enter(identity_of(path), self.display_name(path))?;

        self.normalize(&data, &ctx)
    }

    /// Normalize configuration data that has no file, such as command-line options
    pub fn create(&self, data: &ConfigData, name: &str, layer: ChainLayer) -> Result<Vec<ConfigEntry>> {
        let ctx = LoadContext {
            name: name.to_string(),
            file_path: None,
            match_base: self.options.cwd.clone(),
            plugin_base: self.options.cwd.clone(),
            layer,
            stack: Vec::new(),
        };
        self.normalize(data, &ctx)
    }

    /// Drop cached documents and plugin definitions
    pub fn clear_cache(&self) {
        self.documents.clear();
        self.plugins.clear();
    }

    fn document(&self, path: &Path) -> Result<Arc<ConfigData>> {
        if let Some(cached) = self.documents.get(path) {
            return Ok(Arc::clone(cached.value()));
        }

        let value = ConfigLoader::load_file(path)?;
        let data = Arc::new(ConfigValidator::validate(&value, &self.display_name(path))?);
        self.documents.insert(path.to_path_buf(), Arc::clone(&data));
        Ok(data)
    }

    fn display_name(&self, path: &Path) -> String {
        relative_path(&self.options.cwd, path)
    }

    /// Apply the block's own `files` criteria to everything it produces
    fn normalize(&self, data: &ConfigData, ctx: &LoadContext) -> Result<Vec<ConfigEntry>> {
        let files = data.files.as_ref().map(|f| f.to_vec()).unwrap_or_default();
        let excluded = data
            .excluded_files
            .as_ref()
            .map(|f| f.to_vec())
            .unwrap_or_default();
        let criteria = OverrideTester::create(&files, &excluded, &ctx.match_base)?;

        let mut entries = self.normalize_body(data, ctx)?;
        if criteria.is_some() {
            for entry in &mut entries {
                entry.criteria = OverrideTester::and(criteria.clone(), entry.criteria.take());
            }
        }
        Ok(entries)
    }

    fn normalize_body(&self, data: &ConfigData, ctx: &LoadContext) -> Result<Vec<ConfigEntry>> {
        let mut entries = Vec::new();

        for extend_name in data.extends_list() {
            entries.extend(self.load_extends(&extend_name, ctx)?);
        }

        let parser = data
            .parser
            .as_deref()
            .map(|name| self.load_parser(name, ctx))
            .transpose()?;
        let plugins = self.load_plugins(data.plugins.as_deref().unwrap_or_default(), ctx)?;

        for plugin in plugins.values() {
            for processor in plugin.definition.extension_processors() {
                entries.push(self.implicit_processor_entry(plugin, processor, ctx)?);
            }
        }

        let ignore_patterns = data.ignore_pattern_list();
        entries.push(ConfigEntry {
            name: ctx.name.clone(),
            file_path: ctx.file_path.clone(),
            layer: ctx.layer,
            criteria: None,
            implicit: false,
            root: data.root,
            env: data.env.clone().unwrap_or_default(),
            globals: data.globals.clone().unwrap_or_default(),
            ignore_pattern: (!ignore_patterns.is_empty())
                .then(|| IgnorePattern::new(ignore_patterns, &ctx.match_base)),
            no_inline_config: data.no_inline_config,
            parser,
            parser_options: data.parser_options.clone().unwrap_or_default(),
            plugins,
            processor: data.processor.clone(),
            report_unused_disable_directives: data.report_unused_disable_directives,
            rules: data.rules.clone().unwrap_or_default(),
            settings: data.settings.clone().unwrap_or_default(),
        });

        for (index, block) in data.overrides.iter().flatten().enumerate() {
            let block_ctx = ctx.extended(format!("{}#overrides[{index}]", ctx.name), ctx.file_path.clone());
            entries.extend(self.normalize(block, &block_ctx)?);
        }

        Ok(entries)
    }

    fn implicit_processor_entry(
        &self,
        plugin: &PluginRef,
        processor: &str,
        ctx: &LoadContext,
    ) -> Result<ConfigEntry> {
        let reference = format!("{}/{}", plugin.id, processor);
        let mut entry = ConfigEntry::new(
            format!("{}#processors[\"{reference}\"]", ctx.name),
            ctx.layer,
        );
        entry.file_path = ctx.file_path.clone();
        entry.implicit = true;
        entry.criteria = OverrideTester::create(&[format!("*{processor}")], &[], &ctx.match_base)?;
        entry.processor = Some(reference);
        Ok(entry)
    }

    fn load_extends(&self, extend_name: &str, ctx: &LoadContext) -> Result<Vec<ConfigEntry>> {
        tracing::debug!("Loading '{}' extended by {}", extend_name, ctx.name);

        if let Some(builtin) = extend_name.strip_prefix(BUILTIN_PREFIX) {
            return self.load_builtin(builtin, extend_name, ctx);
        }
        if let Some(reference) = extend_name.strip_prefix(PLUGIN_CONFIG_PREFIX) {
            return self.load_plugin_config(reference, extend_name, ctx);
        }
        self.load_shareable(extend_name, ctx)
    }

    fn load_builtin(&self, builtin: &str, extend_name: &str, ctx: &LoadContext) -> Result<Vec<ConfigEntry>> {
        let path = match builtin {
            "recommended" => self.options.recommended_config_path.as_ref(),
            "all" => self.options.all_config_path.as_ref(),
            _ => None,
        };
        let Some(path) = path else {
            return Err(extend_missing(extend_name, ctx));
        };

        let data = self.document(path)?;
        let inner = ctx
            .extended(format!("{} » {extend_name}", ctx.name), Some(path.clone()))
            .enter(identity_of(path), extend_name.to_string())?;
        self.normalize(&data, &inner)
    }

    fn load_plugin_config(&self, reference: &str, extend_name: &str, ctx: &LoadContext) -> Result<Vec<ConfigEntry>> {
        let Some(slash) = reference.rfind('/') else {
            return Err(extend_missing(extend_name, ctx));
        };
        let (plugin_name, config_name) = (&reference[..slash], &reference[slash + 1..]);
        if is_path_request(plugin_name) {
            return Err(StrataError::invalid_config(
                &ctx.name,
                "'extends' cannot use a file path for plugins.",
            ));
        }

        let plugin = self.plugins.load(plugin_name, self.importer(ctx))?;
        let Some(value) = plugin.definition.config(config_name) else {
            return Err(extend_missing(extend_name, ctx));
        };

        let display = format!("plugin:{}/{config_name}", plugin.id);
        let data = ConfigValidator::validate(value, &display)?;
        let identity = format!("{}#{config_name}", plugin.file_path.display());
        let inner = ctx
            .extended(format!("{} » {display}", ctx.name), Some(plugin.file_path.clone()))
            .enter(identity, display)?;
        self.normalize(&data, &inner)
    }

    fn load_shareable(&self, extend_name: &str, ctx: &LoadContext) -> Result<Vec<ConfigEntry>> {
        let request = if is_path_request(extend_name) {
            extend_name.to_string()
        } else {
            normalize_package_name(extend_name, CONFIG_PREFIX)
        };

        // Only a failure to locate the config is rewritten; loading errors propagate as-is
        let path = match self.options.resolver.resolve(&request, &ctx.resolve_base(&self.options.cwd)) {
            Ok(path) => path,
            Err(StrataError::ModuleNotFound { .. }) => return Err(extend_missing(extend_name, ctx)),
            Err(err) => return Err(err),
        };

        let data = self.document(&path)?;
        let inner = ctx
            .extended(format!("{} » {request}", ctx.name), Some(path.clone()))
            .enter(identity_of(&path), self.display_name(&path))?;
        self.normalize(&data, &inner)
    }

    fn load_parser(&self, name: &str, ctx: &LoadContext) -> Result<ParserRef> {
        match self.options.resolver.resolve(name, &ctx.resolve_base(&self.options.cwd)) {
            Ok(file_path) => Ok(ParserRef {
                name: name.to_string(),
                file_path,
                importer_name: ctx.name.clone(),
            }),
            Err(StrataError::ModuleNotFound { .. }) => Err(StrataError::ParserMissing {
                parser_name: name.to_string(),
                importer_name: ctx.name.clone(),
            }),
            Err(err) => Err(err),
        }
    }

    fn load_plugins(&self, names: &[String], ctx: &LoadContext) -> Result<IndexMap<String, PluginRef>> {
        let mut plugins = IndexMap::new();
        for name in names {
            let plugin = self.plugins.load(name, self.importer(ctx))?;
            plugins.entry(plugin.id.clone()).or_insert(plugin);
        }
        Ok(plugins)
    }

    fn importer<'a>(&self, ctx: &'a LoadContext) -> PluginImporter<'a> {
        PluginImporter {
            name: &ctx.name,
            path: ctx.file_path.as_deref(),
            base_dir: &ctx.plugin_base,
        }
    }
}

fn extend_missing(extend_name: &str, ctx: &LoadContext) -> StrataError {
    StrataError::ExtendConfigMissing {
        config_name: extend_name.to_string(),
        importer_name: ctx.name.clone(),
    }
}

fn identity_of(path: &Path) -> String {
    fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleSeverity;
    use crate::module_resolver::PackageResolver;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn factory(cwd: &Path) -> ConfigFactory {
        ConfigFactory::new(FactoryOptions {
            cwd: cwd.to_path_buf(),
            resolver: Arc::new(PackageResolver::new()),
            resolve_plugins_relative_to: None,
            recommended_config_path: None,
            all_config_path: None,
        })
    }

    #[test]
    fn test_entry_order_and_names() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            root,
            "node_modules/strata-config-base/index.json",
            r#"{ "rules": { "semi": "warn" } }"#,
        );
        write(
            root,
            ".stratarc.json",
            r#"{
                "extends": "base",
                "rules": { "semi": "error" },
                "overrides": [{ "files": "*.ts", "rules": { "semi": "off" } }]
            }"#,
        );

        let entries = factory(root).load_in_directory(root).unwrap().unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                ".stratarc.json » strata-config-base",
                ".stratarc.json",
                ".stratarc.json#overrides[0]"
            ]
        );
        assert!(!entries[1].is_override());
        assert!(entries[2].is_override());
        assert_eq!(entries[0].rules["semi"].severity, RuleSeverity::Warn);
    }

    #[test]
    fn test_extends_inside_override_inherits_criteria() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "ts.json", r#"{ "rules": { "no-ts": "error" } }"#);
        write(
            root,
            ".stratarc.json",
            r#"{ "overrides": [{ "files": "*.ts", "extends": "./ts.json" }] }"#,
        );

        let entries = factory(root).load_in_directory(root).unwrap().unwrap();
        let extended = entries
            .iter()
            .find(|e| e.rules.contains_key("no-ts"))
            .unwrap();
        let criteria = extended.criteria.as_ref().unwrap();
        assert!(criteria.test(&root.join("a.ts")));
        assert!(!criteria.test(&root.join("a.js")));
    }

    #[test]
    fn test_circular_extends() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "a.json", r#"{ "extends": "./b.json" }"#);
        write(root, "b.json", r#"{ "extends": "./a.json" }"#);
        write(root, ".stratarc.json", r#"{ "extends": "./a.json" }"#);

        let error = factory(root).load_in_directory(root).unwrap_err();
        match error {
            StrataError::CircularExtends { chain } => {
                assert_eq!(chain, vec!["a.json", "b.json", "a.json"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_shareable_config() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, ".stratarc.json", r#"{ "extends": "missing" }"#);

        let error = factory(root).load_in_directory(root).unwrap_err();
        assert_eq!(error.message_template(), Some("extend-config-missing"));
        let data = error.message_data().unwrap();
        assert_eq!(data["configName"], "missing");
        assert_eq!(data["importerName"], ".stratarc.json");
    }

    #[test]
    fn test_builtin_configs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "builtin/recommended.json", r#"{ "rules": { "no-undef": "error" } }"#);
        write(root, ".stratarc.json", r#"{ "extends": ["strata:recommended"] }"#);

        let mut options = FactoryOptions {
            cwd: root.to_path_buf(),
            resolver: Arc::new(PackageResolver::new()),
            resolve_plugins_relative_to: None,
            recommended_config_path: Some(root.join("builtin/recommended.json")),
            all_config_path: None,
        };
        let entries = ConfigFactory::new(options.clone())
            .load_in_directory(root)
            .unwrap()
            .unwrap();
        assert_eq!(entries[0].name, ".stratarc.json » strata:recommended");

        options.recommended_config_path = None;
        let error = ConfigFactory::new(options).load_in_directory(root).unwrap_err();
        assert!(matches!(error, StrataError::ExtendConfigMissing { .. }));
    }

    #[test]
    fn test_plugin_config_and_implicit_processor() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            root,
            "node_modules/strata-plugin-md/index.json",
            r#"{
                "processors": { ".md": { "description": "markdown" } },
                "configs": { "recommended": { "plugins": ["md"], "rules": { "md/heading": "warn" } } }
            }"#,
        );
        write(root, ".stratarc.json", r#"{ "extends": "plugin:md/recommended" }"#);

        let entries = factory(root).load_in_directory(root).unwrap().unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                ".stratarc.json » plugin:md/recommended#processors[\"md/.md\"]",
                ".stratarc.json » plugin:md/recommended",
                ".stratarc.json",
            ]
        );
        assert!(entries[0].implicit);
        assert_eq!(entries[0].processor.as_deref(), Some("md/.md"));
        assert!(entries[0].criteria.as_ref().unwrap().test(&root.join("docs/readme.md")));
    }

    #[test]
    fn test_missing_parser() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, ".stratarc.json", r#"{ "parser": "missing-parser" }"#);

        let error = factory(root).load_in_directory(root).unwrap_err();
        assert!(matches!(error, StrataError::ParserMissing { .. }));
    }

    #[test]
    fn test_ignore_patterns_anchor_to_discovered_document() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            root,
            "node_modules/strata-config-shared/index.json",
            r#"{ "ignorePatterns": ["dist/"] }"#,
        );
        write(root, "sub/.stratarc.json", r#"{ "extends": "shared" }"#);

        let entries = factory(root)
            .load_in_directory(&root.join("sub"))
            .unwrap()
            .unwrap();
        let pattern = entries[0].ignore_pattern.as_ref().unwrap();
        assert_eq!(pattern.base_path, root.join("sub"));
    }
}
