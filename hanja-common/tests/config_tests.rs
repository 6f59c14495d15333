//! Tests for configuration file resolution
//!
//! These touch the process environment (`HANJA_CONFIG`) and therefore run
//! serially.

use hanja_common::config::{ErrorMode, PipelineConfig, SourceKind, CONFIG_ENV_VAR};
use serial_test::serial;
use std::io::Write;
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
#[serial]
fn test_explicit_path_wins_over_env() {
    let dir = TempDir::new().unwrap();
    let explicit = write_config(&dir, "explicit.toml", "batch_size = 7\n");
    let from_env = write_config(&dir, "env.toml", "batch_size = 9\n");

    std::env::set_var(CONFIG_ENV_VAR, &from_env);
    let config = PipelineConfig::load(Some(&explicit)).unwrap();
    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.batch_size, 7);
}

#[test]
#[serial]
fn test_env_path_used_when_no_explicit_path() {
    let dir = TempDir::new().unwrap();
    let from_env = write_config(
        &dir,
        "env.toml",
        r#"
        error_mode = "continue"

        [[sources]]
        name = "local"
        kind = "json_file"
        path = "/data/local.json"
        mechanism = "expanded"
        priority = 3
        "#,
    );

    std::env::set_var(CONFIG_ENV_VAR, &from_env);
    let config = PipelineConfig::load(None).unwrap();
    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.error_mode, ErrorMode::Continue);
    assert_eq!(config.sources.len(), 1);
    assert_eq!(config.sources[0].kind, SourceKind::JsonFile);
    assert_eq!(config.sources[0].mechanism, "expanded");
    assert_eq!(config.sources[0].priority, 3);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");

    let err = PipelineConfig::load(Some(&missing)).unwrap_err();
    assert!(matches!(err, hanja_common::Error::Config(_)));
}

#[test]
#[serial]
fn test_invalid_ruleset_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "bad.toml",
        r#"
        [ruleset]
        version = ""
        "#,
    );

    let err = PipelineConfig::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("ruleset.version"));
}
