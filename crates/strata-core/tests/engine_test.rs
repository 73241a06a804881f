//! Integration tests for file selection, linting and the result cache

mod common;

use common::{Fixture, RuleEcho};
use serde_json::json;
use std::fs;
use strata_core::{CacheStrategy, LintEngine, LintResultCache, StrataError};

#[test]
fn test_first_unmatched_pattern_is_reported() {
    let fixture = Fixture::new();
    fixture.write_json(".stratarc.json", json!({}));

    let error = fixture
        .engine()
        .lint_files(&["aaa.js", "bbb.js"], &RuleEcho::default())
        .unwrap_err();
    assert_eq!(error.message_template(), Some("file-not-found"));
    assert_eq!(
        error.message_data(),
        Some(json!({ "pattern": "aaa.js", "globDisabled": false }))
    );
}

#[test]
fn test_all_matches_ignored() {
    let fixture = Fixture::new();
    fixture.write_json(".stratarc.json", json!({ "ignorePatterns": "gen/" }));
    fixture.write("gen/a.js", "");

    let error = fixture
        .engine()
        .lint_files(&["gen/**/*.js"], &RuleEcho::default())
        .unwrap_err();
    assert!(matches!(error, StrataError::AllFilesIgnored { ref pattern } if pattern == "gen/**/*.js"));
}

#[test]
fn test_overrides_add_targets_to_directory_walks() {
    let fixture = Fixture::new();
    fixture.write_json(
        ".stratarc.json",
        json!({
            "overrides": [
                { "files": ["*.ts"], "rules": { "semi": "error" } },
                { "files": ["src/*"], "rules": { "quotes": "warn" } }
            ]
        }),
    );
    fixture.write("src/a.js", "");
    fixture.write("src/b.ts", "");
    fixture.write("src/c.md", "");

    let engine = fixture.engine();
    let files = engine.selector().select(&["."]).unwrap();
    let selected = fixture.relative(files.into_iter().map(|f| f.file_path));
    assert_eq!(selected, vec!["src/a.js", "src/b.ts"]);
}

#[test]
fn test_explicit_extensions_ignore_override_targets() {
    let fixture = Fixture::new();
    fixture.write_json(".stratarc.json", json!({ "overrides": [{ "files": "*.ts" }] }));
    fixture.write("a.js", "");
    fixture.write("b.ts", "");
    fixture.write("c.jsx", "");

    let mut options = fixture.options();
    options.extensions = Some(vec!["jsx".to_string()]);
    let engine = LintEngine::new(options).unwrap();

    let files = engine.selector().select(&["."]).unwrap();
    assert_eq!(fixture.relative(files.into_iter().map(|f| f.file_path)), vec!["c.jsx"]);
}

#[test]
fn test_walk_prunes_ignored_directories() {
    let fixture = Fixture::new();
    fixture.write_json(".stratarc.json", json!({ "ignorePatterns": ["dist/", "!dist/keep.js"] }));
    fixture.write("dist/keep.js", "");
    fixture.write("src/a.js", "");
    fixture.write(".cache/b.js", "");

    let engine = fixture.engine();
    let files = engine.selector().select(&["."]).unwrap();
    assert_eq!(fixture.relative(files.into_iter().map(|f| f.file_path)), vec!["src/a.js"]);
}

#[test]
fn test_glob_naming_dot_directory_includes_it() {
    let fixture = Fixture::new();
    fixture.write_json(".stratarc.json", json!({}));
    fixture.write(".storybook/main.js", "");

    let engine = fixture.engine();
    let files = engine.selector().select(&[".storybook/*.js"]).unwrap();
    assert_eq!(
        fixture.relative(files.into_iter().map(|f| f.file_path)),
        vec![".storybook/main.js"]
    );
}

#[test]
fn test_lint_files_uses_resolved_config() {
    let fixture = Fixture::new();
    fixture.write_json(".stratarc.json", json!({ "rules": { "semi": "error" } }));
    fixture.write_json("lax/.stratarc.json", json!({ "rules": { "semi": "off" } }));
    fixture.write("a.js", "a");
    fixture.write("lax/b.js", "b");

    let report = fixture.engine().lint_files(&["."], &RuleEcho::default()).unwrap();
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.error_count, 1);
    assert!(report.results[1].messages.is_empty());
}

#[test]
fn test_config_error_aborts_run() {
    let fixture = Fixture::new();
    fixture.write_json(".stratarc.json", json!({ "extends": "missing" }));
    fixture.write("a.js", "a");

    let linter = RuleEcho::default();
    let error = fixture.engine().lint_files(&["a.js"], &linter).unwrap_err();
    assert_eq!(error.message_template(), Some("extend-config-missing"));
    assert_eq!(linter.calls(), 0);
}

#[test]
fn test_cache_invalidated_by_rule_severity_change() {
    let fixture = Fixture::new();
    fixture.write_json(".stratarc.json", json!({ "rules": { "semi": "warn" } }));
    fixture.write("a.js", "a");

    let mut options = fixture.options();
    options.cache_enabled = true;
    let linter = RuleEcho::default();

    let first = LintEngine::new(options.clone()).unwrap().lint_files(&["."], &linter).unwrap();
    assert_eq!(first.warning_count, 1);
    assert_eq!(linter.calls(), 1);

    let cached = LintEngine::new(options.clone()).unwrap().lint_files(&["."], &linter).unwrap();
    assert_eq!(linter.calls(), 1);
    assert_eq!(cached.results, first.results);

    fixture.write_json(".stratarc.json", json!({ "rules": { "semi": "error" } }));
    let relinted = LintEngine::new(options).unwrap().lint_files(&["."], &linter).unwrap();
    assert_eq!(linter.calls(), 2);
    assert_eq!(relinted.error_count, 1);
    assert_eq!(relinted.warning_count, 0);
}

#[test]
fn test_content_strategy_detects_edits() {
    let fixture = Fixture::new();
    fixture.write_json(".stratarc.json", json!({ "rules": { "semi": "warn" } }));
    fixture.write("a.js", "one");

    let mut options = fixture.options();
    options.cache_enabled = true;
    options.cache_strategy = CacheStrategy::Content;
    let linter = RuleEcho::default();

    LintEngine::new(options.clone()).unwrap().lint_files(&["a.js"], &linter).unwrap();
    fixture.write("a.js", "two");
    LintEngine::new(options).unwrap().lint_files(&["a.js"], &linter).unwrap();
    assert_eq!(linter.calls(), 2);
}

#[test]
fn test_cache_prunes_deleted_files() {
    let fixture = Fixture::new();
    fixture.write_json(".stratarc.json", json!({ "rules": { "semi": "warn" } }));
    fixture.write("src/a.js", "a");
    fixture.write("src/b.js", "b");
    fixture.write("lib/c.js", "c");

    let mut options = fixture.options();
    options.cache_enabled = true;
    let linter = RuleEcho::default();

    LintEngine::new(options.clone()).unwrap().lint_files(&["."], &linter).unwrap();
    let cache_path = fixture.path(".stratacache");
    assert_eq!(LintResultCache::load(&cache_path, CacheStrategy::Metadata).len(), 3);

    fs::remove_file(fixture.path("src/b.js")).unwrap();
    fs::remove_file(fixture.path("lib/c.js")).unwrap();
    fixture.write("lib/d.js", "d");
    LintEngine::new(options).unwrap().lint_files(&["src"], &linter).unwrap();

    // lib was not scanned, so its stale entry survives
    let cache = LintResultCache::load(&cache_path, CacheStrategy::Metadata);
    assert_eq!(cache.len(), 2);
    let stats = LintResultCache::stats(&cache_path);
    assert!(stats.exists);
    assert_eq!(stats.entries, 2);
}

#[test]
fn test_disabling_cache_deletes_file() {
    let fixture = Fixture::new();
    fixture.write_json(".stratarc.json", json!({}));
    fixture.write("a.js", "a");

    let mut options = fixture.options();
    options.cache_enabled = true;
    options.cache_location = Some("cache/".into());
    LintEngine::new(options.clone()).unwrap().lint_files(&["a.js"], &RuleEcho::default()).unwrap();

    let engine_cache = LintEngine::new(options.clone()).unwrap().cache_path().to_path_buf();
    assert!(engine_cache.starts_with(fixture.path("cache")));
    assert!(engine_cache.exists());

    options.cache_enabled = false;
    LintEngine::new(options).unwrap();
    assert!(!engine_cache.exists());
}

#[test]
fn test_explicit_ignored_files_warn() {
    let fixture = Fixture::new();
    fixture.write_json(".stratarc.json", json!({ "ignorePatterns": "gen/" }));
    fixture.write("gen/a.js", "");
    fixture.write("b.js", "");

    let report = fixture
        .engine()
        .lint_files(&["gen/a.js", "b.js"], &RuleEcho::default())
        .unwrap();
    assert_eq!(report.results.len(), 2);
    assert_eq!(
        report.results[0].messages[0].message,
        "File ignored because of a matching ignore pattern. Use \"--no-ignore\" to override."
    );
    assert_eq!(report.warning_count, 1);
}

#[test]
fn test_no_ignore_lints_explicit_files() {
    let fixture = Fixture::new();
    fixture.write_json(".stratarc.json", json!({ "ignorePatterns": "gen/", "rules": { "semi": 2 } }));
    fixture.write("gen/a.js", "");

    let mut options = fixture.options();
    options.ignore = false;
    let report = LintEngine::new(options)
        .unwrap()
        .lint_files(&["gen/a.js"], &RuleEcho::default())
        .unwrap();
    assert_eq!(report.error_count, 1);
}

#[test]
fn test_calculate_config_for_file() {
    let fixture = Fixture::new();
    fixture.write_json(".stratarc.json", json!({ "rules": { "semi": ["error", "never"] } }));

    let engine = fixture.engine();
    let config = engine.calculate_config_for_file(&fixture.path("a.js")).unwrap();
    let value = serde_json::to_value(&*config).unwrap();
    assert_eq!(value["rules"]["semi"], json!(["error", "never"]));
    assert!(!engine.is_path_ignored(&fixture.path("a.js")).unwrap());
}
