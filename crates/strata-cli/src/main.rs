//! Strata CLI
//!
//! Command-line interface for inspecting strata configuration

mod commands;
mod output;

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use strata_core::{CacheStrategy, init_tracing};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata: cascading lint configuration inspector")]
#[command(version = strata_core::VERSION)]
#[command(
    long_about = "Strata resolves cascading .stratarc configuration, ignore patterns and plugins\n\
for every file of a project, and maintains the incremental lint cache.\n\
\n\
Examples:\n  \
strata print-config src/app.js     # Effective configuration of a file\n  \
strata ls-files 'src/**/*.ts'      # Files a lint run would visit\n  \
strata check-ignore dist/a.js      # Is this path ignored?\n  \
strata cache info                  # Cache file location and size"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    engine: EngineArgs,

    /// Verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

/// Flags shared by every command that builds an engine
#[derive(Args, Debug, Default)]
pub struct EngineArgs {
    /// Working directory
    #[arg(long, global = true, help = "Directory patterns and paths are relative to")]
    pub cwd: Option<PathBuf>,

    /// Additional configuration file
    #[arg(short, long, global = true, help = "Use this configuration, overriding .stratarc.* files")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable use of configuration from .stratarc.* and package.json")]
    pub no_config_file: bool,

    #[arg(long, global = true, help = "Disable use of ignore files and patterns")]
    pub no_ignore: bool,

    #[arg(long, global = true, help = "Specify path of ignore file")]
    pub ignore_path: Option<PathBuf>,

    #[arg(long, global = true, help = "Pattern of files to ignore (in addition to those in .strataignore)")]
    pub ignore_pattern: Vec<String>,

    #[arg(long, global = true, help = "A folder where plugins should be resolved from")]
    pub resolve_plugins_relative_to: Option<PathBuf>,

    /// File extensions to walk in directories
    #[arg(long, global = true, value_delimiter = ',', help = "Specify file extensions (e.g. .js,.ts)")]
    pub ext: Vec<String>,

    #[arg(long, global = true, help = "Disable glob patterns in file arguments")]
    pub no_glob: bool,

    /// Rule overrides in `name=value` form
    #[arg(long, global = true, value_parser = parse_key_value, help = "Set a rule, e.g. semi=error or 'quotes=[\"warn\",\"single\"]'")]
    pub rule: Vec<(String, String)>,

    #[arg(long, global = true, value_delimiter = ',', help = "Enable environments")]
    pub env: Vec<String>,

    /// Globals in `name[:writable]` form
    #[arg(long, global = true, value_delimiter = ',', help = "Define global variables")]
    pub global: Vec<String>,

    #[arg(long, global = true, help = "Parser to use")]
    pub parser: Option<String>,

    #[arg(long, global = true, help = "Plugins to load")]
    pub plugin: Vec<String>,

    #[arg(long, global = true, help = "Path to the cache file or directory")]
    pub cache_location: Option<PathBuf>,

    #[arg(long, global = true, help = "Strategy used to detect changed files: metadata or content")]
    pub cache_strategy: Option<CacheStrategy>,

    #[arg(long, global = true, help = "Stop looking for configuration above this directory")]
    pub project_root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration of a file
    PrintConfig {
        #[arg(help = "File whose configuration to print")]
        file: PathBuf,
    },

    /// List the files a lint run over the given patterns would visit
    #[command(alias = "ls")]
    LsFiles {
        #[arg(help = "Files, directories or globs (default: current directory)")]
        patterns: Vec<String>,

        /// List files that are explicitly named but ignored
        #[arg(long, help = "Include ignored files in the listing")]
        show_ignored: bool,
    },

    /// Report whether paths are ignored
    CheckIgnore {
        #[arg(required = true, help = "Paths to check")]
        paths: Vec<PathBuf>,
    },

    /// Manage the lint result cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Print the JSON schema of configuration files
    Schema,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete the cache file
    Clear,
    /// Show cache file location and size
    Info,
}

/// Parse `key=value`
fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("Invalid rule '{s}'. Expected 'name=value'")),
    }
}

fn main() {
    let cli = Cli::parse();

    if !cli.no_color && std::env::var("NO_COLOR").is_err() {
        colored::control::set_override(true);
    } else {
        colored::control::set_override(false);
    }

    init_tracing(cli.verbose);

    match run_command(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::print_error(&e);
            std::process::exit(2);
        }
    }
}

fn run_command(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Some(Commands::PrintConfig { file }) => commands::print_config_command(&cli.engine, &file),
        Some(Commands::LsFiles {
            patterns,
            show_ignored,
        }) => {
            let patterns = if patterns.is_empty() {
                vec![".".to_string()]
            } else {
                patterns
            };
            commands::ls_files_command(&cli.engine, &patterns, show_ignored)
        }
        Some(Commands::CheckIgnore { paths }) => {
            commands::check_ignore_command(&cli.engine, &paths)
        }
        Some(Commands::Cache { action }) => match action {
            CacheAction::Clear => commands::cache_clear_command(&cli.engine),
            CacheAction::Info => commands::cache_info_command(&cli.engine),
        },
        Some(Commands::Schema) => commands::schema_command(),
        None => {
            Cli::command().print_help()?;
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("semi = error").unwrap(),
            ("semi".to_string(), "error".to_string())
        );
        assert_eq!(
            parse_key_value("quotes=[\"warn\",\"single\"]").unwrap().1,
            "[\"warn\",\"single\"]"
        );
        assert!(parse_key_value("semi").is_err());
        assert!(parse_key_value("=error").is_err());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
