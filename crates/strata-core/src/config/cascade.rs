//! Cascading configuration resolution
//!
//! [`ConfigResolver`] walks from a file's directory towards the filesystem
//! root collecting configuration documents, stopping at `root: true`, at the
//! filesystem root or at the caller's project root. The per-directory result
//! is memoized, finalized with the `--config` and command-line layers,
//! checked for plugin conflicts once, and then folded per file.

use super::chain::{ChainLayer, ConfigChain, ConfigEntry, EffectiveConfig};
use super::data::ConfigData;
use super::factory::{ConfigFactory, FactoryOptions};
use super::validator::ConfigValidator;
use crate::ignore_pattern::IgnoreState;
use crate::module_resolver::{ModuleResolver, PackageResolver};
use crate::paths::absolutize;
use crate::plugins::{PluginRef, detect_plugin_conflicts};
use crate::{Result, StrataError};
use dashmap::DashMap;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Importer name of the base configuration
pub const BASE_CONFIG_NAME: &str = "BaseConfig";

/// Importer name of the explicit configuration file
pub const CONFIG_FILE_NAME: &str = "--config";

/// Importer name of configuration built from command-line options
pub const CLI_CONFIG_NAME: &str = "CLIOptions";

/// Inputs of a [`ConfigResolver`]
#[derive(Clone)]
pub struct ResolverOptions {
    pub cwd: PathBuf,
    pub use_config_file: bool,
    pub config_path: Option<PathBuf>,
    pub base_config: Option<ConfigData>,
    pub cli_config: Option<ConfigData>,
    /// Directory discovery never walks above this directory
    pub project_root: Option<PathBuf>,
    pub ignore: bool,
    pub ignore_path: Option<PathBuf>,
    pub ignore_patterns: Vec<String>,
    pub resolve_plugins_relative_to: Option<PathBuf>,
    pub recommended_config_path: Option<PathBuf>,
    pub all_config_path: Option<PathBuf>,
    pub module_resolver: Arc<dyn ModuleResolver>,
}

impl ResolverOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            use_config_file: true,
            config_path: None,
            base_config: None,
            cli_config: None,
            project_root: None,
            ignore: true,
            ignore_path: None,
            ignore_patterns: Vec::new(),
            resolve_plugins_relative_to: None,
            recommended_config_path: None,
            all_config_path: None,
            module_resolver: Arc::new(PackageResolver::new()),
        }
    }
}

/// Entries that do not depend on the file being resolved
struct FixedLayers {
    base: Vec<ConfigEntry>,
    config_file: Vec<ConfigEntry>,
    cli: Vec<ConfigEntry>,
    ignore: IgnoreState,
}

impl FixedLayers {
    fn load(options: &ResolverOptions, factory: &ConfigFactory) -> Result<Self> {
        let base = match &options.base_config {
            Some(data) => factory.create(
                &validated(data, BASE_CONFIG_NAME)?,
                BASE_CONFIG_NAME,
                ChainLayer::Cascade,
            )?,
            None => Vec::new(),
        };
        let config_file = match &options.config_path {
            Some(path) => factory.load_file(
                &absolutize(&options.cwd, path),
                CONFIG_FILE_NAME,
                ChainLayer::ConfigFile,
            )?,
            None => Vec::new(),
        };
        let cli = match &options.cli_config {
            Some(data) => factory.create(
                &validated(data, CLI_CONFIG_NAME)?,
                CLI_CONFIG_NAME,
                ChainLayer::Cli,
            )?,
            None => Vec::new(),
        };
        let ignore_path = options
            .ignore_path
            .as_ref()
            .map(|path| absolutize(&options.cwd, path));
        let ignore = IgnoreState::load(
            &options.cwd,
            options.ignore,
            ignore_path.as_deref(),
            &options.ignore_patterns,
        )?;

        Ok(Self {
            base,
            config_file,
            cli,
            ignore,
        })
    }
}

/// Programmatic config data goes through the same checks as files
fn validated(data: &ConfigData, name: &str) -> Result<ConfigData> {
    let value = serde_json::to_value(data)
        .map_err(|e| StrataError::invalid_config(name, e.to_string()))?;
    ConfigValidator::validate(&value, name)
}

/// Resolves the effective configuration of files
///
/// All caches belong to the instance; two resolvers never share state.
pub struct ConfigResolver {
    options: ResolverOptions,
    factory: ConfigFactory,
    fixed: FixedLayers,
    /// Base and directory-discovered entries per directory
    directory_entries: DashMap<PathBuf, Arc<Vec<ConfigEntry>>>,
    /// Finalized chains per directory
    chains: DashMap<PathBuf, Arc<ConfigChain>>,
    /// Effective configuration per absolute file path
    effective: DashMap<PathBuf, Arc<EffectiveConfig>>,
}

impl ConfigResolver {
    /// Create a resolver, loading the base, `--config` and command-line layers
    /// and the ignore file up front
    pub fn new(mut options: ResolverOptions) -> Result<Self> {
        options.project_root = options
            .project_root
            .take()
            .map(|root| absolutize(&options.cwd, &root));
        let factory = ConfigFactory::new(FactoryOptions {
            cwd: options.cwd.clone(),
            resolver: Arc::clone(&options.module_resolver),
            resolve_plugins_relative_to: options
                .resolve_plugins_relative_to
                .as_ref()
                .map(|dir| absolutize(&options.cwd, dir)),
            recommended_config_path: options.recommended_config_path.clone(),
            all_config_path: options.all_config_path.clone(),
        });
        let fixed = FixedLayers::load(&options, &factory)?;

        Ok(Self {
            options,
            factory,
            fixed,
            directory_entries: DashMap::new(),
            chains: DashMap::new(),
            effective: DashMap::new(),
        })
    }

    pub fn cwd(&self) -> &Path {
        &self.options.cwd
    }

    pub fn ignore_enabled(&self) -> bool {
        self.fixed.ignore.ignore_enabled()
    }

    /// Effective configuration of `file_path`
    ///
    /// Repeated calls return the same `Arc` until [`Self::clear_cache`].
    pub fn resolve(&self, file_path: &Path) -> Result<Arc<EffectiveConfig>> {
        let file_path = absolutize(&self.options.cwd, file_path);
        if let Some(cached) = self.effective.get(&file_path) {
            return Ok(Arc::clone(cached.value()));
        }

        let chain = self.config_chain_for_file(&file_path)?;
        let config = Arc::new(chain.extract(&file_path));

        // Keep whichever value was stored first so identity stays stable
        let stored = self.effective.entry(file_path).or_insert(config);
        Ok(Arc::clone(stored.value()))
    }

    /// Finalized chain applying to `file_path`
    ///
    /// Fails with [`StrataError::NoConfigFound`] when configuration files are
    /// enabled but neither a file nor a base or command-line config was found.
    pub fn config_chain_for_file(&self, file_path: &Path) -> Result<Arc<ConfigChain>> {
        let file_path = absolutize(&self.options.cwd, file_path);
        let directory = file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| file_path.clone());
        let chain = self.chain_for_directory(&directory)?;

        if self.options.use_config_file
            && !chain.has_file_entries()
            && self.options.base_config.is_none()
            && self.options.cli_config.is_none()
        {
            return Err(StrataError::NoConfigFound { directory });
        }
        Ok(chain)
    }

    /// Whether `path` is excluded by the ignore layers of its chain
    pub fn is_path_ignored(&self, path: &Path) -> Result<bool> {
        let path = absolutize(&self.options.cwd, path);
        let directory = path.parent().unwrap_or(&path);
        let chain = self.chain_for_directory(directory)?;
        Ok(chain.ignore().is_ignored(&path, path.is_dir(), false, None))
    }

    /// Forget memoized documents, chains and configurations
    ///
    /// The base, `--config` and command-line layers and the ignore file are
    /// reloaded.
    pub fn clear_cache(&mut self) -> Result<()> {
        self.effective.clear();
        self.chains.clear();
        self.directory_entries.clear();
        self.factory.clear_cache();
        self.fixed = FixedLayers::load(&self.options, &self.factory)?;
        tracing::debug!("Cleared configuration caches");
        Ok(())
    }

    /// Finalized chain of a directory, without the missing-config check
    pub(crate) fn chain_for_directory(&self, directory: &Path) -> Result<Arc<ConfigChain>> {
        if let Some(cached) = self.chains.get(directory) {
            return Ok(Arc::clone(cached.value()));
        }

        let discovered = if self.options.use_config_file {
            self.load_in_ancestors(directory)?
        } else {
            Arc::new(self.fixed.base.clone())
        };
        let chain = Arc::new(self.finalize(&discovered)?);

        let stored = self
            .chains
            .entry(directory.to_path_buf())
            .or_insert(chain);
        Ok(Arc::clone(stored.value()))
    }

    fn load_in_ancestors(&self, directory: &Path) -> Result<Arc<Vec<ConfigEntry>>> {
        if let Some(cached) = self.directory_entries.get(directory) {
            return Ok(Arc::clone(cached.value()));
        }

        let own = self.factory.load_in_directory(directory)?.unwrap_or_default();
        let is_root = is_root(&own);
        let at_project_root = self.options.project_root.as_deref() == Some(directory);

        let mut entries = match directory.parent() {
            Some(parent) if !is_root && !at_project_root => {
                (*self.load_in_ancestors(parent)?).clone()
            }
            _ => {
                if is_root {
                    tracing::debug!("Stopping discovery at root config in {}", directory.display());
                }
                self.fixed.base.clone()
            }
        };
        entries.extend(own);

        let entries = Arc::new(entries);
        self.directory_entries
            .insert(directory.to_path_buf(), Arc::clone(&entries));
        Ok(entries)
    }

    fn finalize(&self, discovered: &[ConfigEntry]) -> Result<ConfigChain> {
        let entries: Vec<ConfigEntry> = discovered
            .iter()
            .chain(&self.fixed.config_file)
            .chain(&self.fixed.cli)
            .cloned()
            .collect();

        detect_plugin_conflicts(entries.iter().flat_map(|e| e.plugins.values()))?;

        let mut plugins: IndexMap<String, PluginRef> = IndexMap::new();
        for plugin in entries.iter().flat_map(|e| e.plugins.values()) {
            plugins
                .entry(plugin.id.clone())
                .or_insert_with(|| plugin.clone());
        }
        for entry in &entries {
            ConfigValidator::validate_plugin_usage(
                &entry.name,
                &entry.env,
                &entry.rules,
                entry.processor.as_deref(),
                &plugins,
            )?;
        }

        let chain_patterns = entries
            .iter()
            .filter(|entry| !entry.is_override())
            .filter_map(|entry| entry.ignore_pattern.clone())
            .collect();
        let ignore = self.fixed.ignore.matcher(chain_patterns)?;

        Ok(ConfigChain::new(entries, Arc::new(ignore)))
    }
}

/// Last explicit `root` among non-override entries
fn is_root(entries: &[ConfigEntry]) -> bool {
    entries
        .iter()
        .rev()
        .filter(|entry| !entry.is_override())
        .find_map(|entry| entry.root)
        .unwrap_or(false)
}
