//! Configuration system for strata
//!
//! This module turns configuration documents into per-file effective
//! configurations:
//! - Document discovery in every directory from a file up to the root
//! - JSON/JSONC, YAML and TOML documents, or a `strataConfig` field in `package.json`
//! - `extends` of shareable, built-in and plugin configurations
//! - `overrides` blocks matched against paths relative to their document
//!
//! ## Configuration Files
//!
//! The first of these names present in a directory is used:
//! - `.stratarc.toml`
//! - `.stratarc.yaml` / `.stratarc.yml`
//! - `.stratarc.json`
//! - `.stratarc` (YAML or JSON)
//! - `package.json` with a `strataConfig` field
//!
//! ## Cascade
//!
//! Documents closer to the file take precedence over documents in ancestor
//! directories. Discovery stops at a document with `"root": true`.
//!
//! ## Example Configuration
//!
//! ```jsonc
//! {
//!   "root": true,
//!   "extends": ["strata:recommended", "plugin:md/recommended"],
//!   "plugins": ["md"],
//!   "env": { "browser": true },
//!   "rules": {
//!     "semi": ["error", "always"],
//!     "quotes": "warn"
//!   },
//!   "ignorePatterns": ["dist/"],
//!   "overrides": [
//!     {
//!       "files": ["*.test.js"],
//!       "rules": { "semi": "off" }
//!     }
//!   ]
//! }
//! ```

pub mod cascade;
pub mod chain;
pub mod data;
pub mod factory;
pub mod loader;
pub mod validator;

// Re-export main types
pub use cascade::{ConfigResolver, ResolverOptions};
pub use chain::{ChainLayer, ConfigChain, ConfigEntry, EffectiveConfig, ParserRef};
pub use data::{
    ConfigData, ConfigDocument, ConfigOrigin, GlobalAccess, OneOrMany, RuleEntry, RuleSeverity,
};
pub use factory::{ConfigFactory, FactoryOptions};
pub use loader::ConfigLoader;
pub use validator::ConfigValidator;
