//! Strata Core
//!
//! Configuration cascade, ignore engine, plugin loading, file selection and
//! incremental result cache for the strata linter. Rule execution itself is
//! supplied by the caller through the [`Linter`] trait.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod ignore_pattern;
pub mod lint;
pub mod module_resolver;
pub mod options;
pub mod overrides;
pub mod paths;
pub mod plugins;
pub mod result;
pub mod selector;

// Re-export commonly used types
pub use cache::{CacheStats, CacheStrategy, LintResultCache};
pub use config::{
    ChainLayer, ConfigChain, ConfigData, ConfigEntry, ConfigLoader, ConfigResolver,
    EffectiveConfig, GlobalAccess, OneOrMany, ResolverOptions, RuleEntry, RuleSeverity,
};
pub use engine::LintEngine;
pub use error::{ErrorKind, PluginConflictSource, StrataError};
pub use ignore_pattern::{IgnoreMatcher, IgnorePattern};
pub use lint::{LintMessage, LintOutput, LintReport, LintResult, Linter};
pub use module_resolver::{ModuleResolver, PackageResolver};
pub use options::EngineOptions;
pub use overrides::OverrideTester;
pub use plugins::{PluginDefinition, PluginLoader, PluginRef};
pub use result::Result;
pub use selector::{FileSelector, SelectedFile};

/// Initialize the tracing subscriber for logging
///
/// `RUST_LOG` takes precedence; otherwise `verbosity` picks the level
/// (0 = warn, 1 = info, 2 = debug, 3+ = trace).
pub fn init_tracing(verbosity: u8) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("strata_core={level},strata={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
