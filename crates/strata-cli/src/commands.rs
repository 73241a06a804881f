//! CLI command implementations

use anyhow::{Context, bail};
use indexmap::IndexMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use strata_core::config::ConfigData;
use strata_core::paths::absolutize;
use strata_core::{
    ConfigResolver, EngineOptions, FileSelector, GlobalAccess, LintResultCache, OneOrMany,
    RuleEntry,
};
use tracing::debug;

use crate::EngineArgs;
use crate::output;

/// Build engine options from the shared command-line flags
pub fn engine_options(args: &EngineArgs) -> anyhow::Result<EngineOptions> {
    let current_dir = std::env::current_dir().context("Cannot determine current directory")?;
    let cwd = match &args.cwd {
        Some(cwd) => absolutize(&current_dir, cwd),
        None => current_dir,
    };

    let mut options = EngineOptions::new(&cwd);
    options.config_path = args.config.clone();
    options.use_config_file = !args.no_config_file;
    options.ignore = !args.no_ignore;
    options.ignore_path = args.ignore_path.clone();
    if !args.ignore_pattern.is_empty() {
        options.ignore_patterns = Some(OneOrMany::Many(args.ignore_pattern.clone()));
    }
    options.resolve_plugins_relative_to = args.resolve_plugins_relative_to.clone();
    if !args.ext.is_empty() {
        options.extensions = Some(args.ext.clone());
    }
    options.glob_input_paths = !args.no_glob;
    options.cache_location = args.cache_location.clone();
    if let Some(strategy) = args.cache_strategy {
        options.cache_strategy = strategy;
    }
    options.project_root = args.project_root.as_ref().map(|root| absolutize(&cwd, root));
    options.override_config = cli_config(args)?;

    options.validate()?;
    Ok(options)
}

/// The configuration layer formed by `--rule`, `--env`, `--global`, `--parser` and `--plugin`
fn cli_config(args: &EngineArgs) -> anyhow::Result<Option<ConfigData>> {
    let mut config = ConfigData::default();
    let mut present = false;

    if !args.rule.is_empty() {
        let mut rules = IndexMap::new();
        for (name, raw) in &args.rule {
            let value = json5::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.clone()));
            let Some(entry) = RuleEntry::from_value(&value) else {
                bail!(
                    "Invalid value for rule '{name}': severity should be one of off, warn, error, 0, 1, 2 (you passed '{raw}')"
                );
            };
            rules.insert(name.clone(), entry);
        }
        config.rules = Some(rules);
        present = true;
    }

    if !args.env.is_empty() {
        config.env = Some(args.env.iter().map(|name| (name.clone(), true)).collect());
        present = true;
    }

    if !args.global.is_empty() {
        let mut globals = IndexMap::new();
        for declaration in &args.global {
            let (name, access) = match declaration.split_once(':') {
                Some((name, "writable" | "writeable" | "true")) => (name, GlobalAccess::Writable),
                Some((name, "readonly" | "readable" | "false")) => (name, GlobalAccess::Readonly),
                Some((name, other)) => {
                    bail!("Invalid global '{name}': unknown access '{other}'")
                }
                None => (declaration.as_str(), GlobalAccess::Readonly),
            };
            globals.insert(name.to_string(), access);
        }
        config.globals = Some(globals);
        present = true;
    }

    if let Some(parser) = &args.parser {
        config.parser = Some(parser.clone());
        present = true;
    }

    if !args.plugin.is_empty() {
        config.plugins = Some(args.plugin.clone());
        present = true;
    }

    Ok(present.then_some(config))
}

fn resolver(options: &EngineOptions) -> anyhow::Result<ConfigResolver> {
    Ok(ConfigResolver::new(options.resolver_options())?)
}

/// Print the effective configuration of `file` as JSON
pub fn print_config_command(args: &EngineArgs, file: &Path) -> anyhow::Result<i32> {
    let options = engine_options(args)?;
    let resolver = resolver(&options)?;

    let config = resolver.resolve(file)?;
    debug!("Resolved configuration for {}", file.display());
    println!("{}", serde_json::to_string_pretty(&*config)?);
    Ok(0)
}

/// List the files selected by `patterns`
pub fn ls_files_command(
    args: &EngineArgs,
    patterns: &[String],
    show_ignored: bool,
) -> anyhow::Result<i32> {
    let options = engine_options(args)?;
    let resolver = resolver(&options)?;
    let selector = FileSelector::new(&resolver, options.selector_options());

    let files = selector.select(patterns)?;
    for file in files.iter().filter(|file| show_ignored || !file.ignored) {
        output::print_listed_file(&options.cwd, &file.file_path, file.ignored);
    }
    Ok(0)
}

/// Print each ignored path; exit status 1 when none is ignored
pub fn check_ignore_command(args: &EngineArgs, paths: &[PathBuf]) -> anyhow::Result<i32> {
    let options = engine_options(args)?;
    let resolver = resolver(&options)?;

    let mut any_ignored = false;
    for path in paths {
        let ignored = resolver.is_path_ignored(path)?;
        any_ignored |= ignored;
        output::print_ignore_status(path, ignored);
    }
    Ok(if any_ignored { 0 } else { 1 })
}

fn cache_path(args: &EngineArgs) -> anyhow::Result<(EngineOptions, PathBuf)> {
    let options = engine_options(args)?;
    let path = LintResultCache::cache_file_path(options.cache_location.as_deref(), &options.cwd);
    Ok((options, path))
}

pub fn cache_clear_command(args: &EngineArgs) -> anyhow::Result<i32> {
    let (_, path) = cache_path(args)?;
    let existed = path.exists();
    LintResultCache::delete(&path)?;
    output::print_cache_cleared(&path, existed);
    Ok(0)
}

pub fn cache_info_command(args: &EngineArgs) -> anyhow::Result<i32> {
    let (options, path) = cache_path(args)?;
    output::print_cache_stats(&LintResultCache::stats(&path), options.cache_strategy);
    Ok(0)
}

/// Print the JSON schema of configuration documents
pub fn schema_command() -> anyhow::Result<i32> {
    let schema = schemars::schema_for!(ConfigData);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(0)
}
