//! Terminal output for CLI commands

use colored::*;
use std::path::Path;
use strata_core::{CacheStats, CacheStrategy, StrataError};

/// Print a listed file relative to `cwd`
pub fn print_listed_file(cwd: &Path, file_path: &Path, ignored: bool) {
    let display = file_path.strip_prefix(cwd).unwrap_or(file_path).display();
    if ignored {
        println!("{} {}", display, "(ignored)".dimmed());
    } else {
        println!("{display}");
    }
}

pub fn print_ignore_status(path: &Path, ignored: bool) {
    if ignored {
        println!("{} {}", "ignored".yellow(), path.display());
    } else {
        println!("{} {}", "included".green(), path.display());
    }
}

pub fn print_cache_cleared(path: &Path, existed: bool) {
    if existed {
        println!("{} Deleted {}", "✓".green(), path.display());
    } else {
        println!("No cache file at {}", path.display());
    }
}

pub fn print_cache_stats(stats: &CacheStats, strategy: CacheStrategy) {
    println!("{}", "Cache:".bold());
    println!("  Location: {}", stats.path.display());
    println!("  Strategy: {}", strategy);
    if stats.exists {
        println!("  Entries:  {}", stats.entries.to_string().cyan());
        println!("  Size:     {} bytes", stats.size_bytes);
    } else {
        println!("  {}", "No cache file".dimmed());
    }
}

/// Print a failure to stderr
///
/// Errors carrying a message template also print the template name and its data.
pub fn print_error(error: &anyhow::Error) {
    eprintln!("{} {:#}", "error:".red().bold(), error);

    if let Some(strata) = error.downcast_ref::<StrataError>()
        && let Some(template) = strata.message_template()
    {
        eprintln!("  {} {}", "template:".dimmed(), template);
        if let Some(data) = strata.message_data() {
            eprintln!("  {} {}", "data:".dimmed(), data);
        }
    }
}
