//! Integration tests for the merged configuration over real files.
//!
//! These tests cover precedence, provenance, staged writes and the save
//! protocol across an env file and a YAML file.

use confetti::config::{Config, Filter, RegisteredSource, Source};
use confetti::error::ErrorCode;
use confetti::sources::{EnvFileSource, MemorySource, StructuredFileSource};
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to write an env file and a YAML file that share the key `LOG_LEVEL`.
fn setup_files(temp: &TempDir) -> (PathBuf, PathBuf) {
    let env_path = temp.path().join(".env");
    std::fs::write(&env_path, "APP_NAME=demo\nLOG_LEVEL=info\n").unwrap();

    let yaml_path = temp.path().join("app.yaml");
    std::fs::write(
        &yaml_path,
        "LOG_LEVEL: debug\ndatabase:\n  host: localhost\n  port: 5432\nfeatures:\n  beta: false\n",
    )
    .unwrap();
    (env_path, yaml_path)
}

/// Env file first (lowest precedence), YAML last.
fn setup_config(env_path: &PathBuf, yaml_path: &PathBuf) -> Config {
    Config::new(vec![
        RegisteredSource::new(EnvFileSource::new(env_path)),
        RegisteredSource::new(StructuredFileSource::yaml(yaml_path)),
    ])
}

#[test]
fn later_source_wins_and_is_recorded() {
    let temp = TempDir::new().unwrap();
    let (env_path, yaml_path) = setup_files(&temp);
    let mut config = setup_config(&env_path, &yaml_path);

    assert_eq!(config.get("LOG_LEVEL").unwrap(), Some(json!("debug")));
    assert_eq!(config.get("APP_NAME").unwrap(), Some(json!("demo")));
    assert_eq!(config.get("database.host").unwrap(), Some(json!("localhost")));
    assert_eq!(config.get("database.port").unwrap(), Some(json!(5432)));

    let record = config.provenance("LOG_LEVEL").unwrap().unwrap();
    assert_eq!(record.source_id, StructuredFileSource::yaml(&yaml_path).id());
    assert_eq!(record.source_key, "LOG_LEVEL");

    let record = config.provenance("APP_NAME").unwrap().unwrap();
    assert_eq!(record.source_id, EnvFileSource::new(&env_path).id());
}

#[test]
fn set_and_save_routes_to_owning_file() {
    let temp = TempDir::new().unwrap();
    let (env_path, yaml_path) = setup_files(&temp);
    let mut config = setup_config(&env_path, &yaml_path);

    config.set("database.port", 6543, None).unwrap();
    config.set("APP_NAME", "renamed", None).unwrap();
    // Nothing on disk changes before save
    assert!(std::fs::read_to_string(&yaml_path).unwrap().contains("5432"));

    config.save().unwrap();
    assert!(!config.has_pending_changes());

    let yaml = std::fs::read_to_string(&yaml_path).unwrap();
    assert!(yaml.contains("6543"));
    let env = std::fs::read_to_string(&env_path).unwrap();
    assert!(env.contains("APP_NAME=renamed"));

    // A fresh config over the same files sees the saved values
    let mut reopened = setup_config(&env_path, &yaml_path);
    assert_eq!(reopened.get("database.port").unwrap(), Some(json!(6543)));
    assert_eq!(reopened.get("APP_NAME").unwrap(), Some(json!("renamed")));
}

#[test]
fn new_key_goes_to_first_source_and_gains_provenance_after_save() {
    let temp = TempDir::new().unwrap();
    let (env_path, yaml_path) = setup_files(&temp);
    let mut config = setup_config(&env_path, &yaml_path);

    config.set("NEW_FLAG", "on", None).unwrap();
    assert!(config.provenance("NEW_FLAG").unwrap().is_none());

    config.save().unwrap();
    let record = config.provenance("NEW_FLAG").unwrap().unwrap();
    assert_eq!(record.source_id, EnvFileSource::new(&env_path).id());
    assert!(std::fs::read_to_string(&env_path).unwrap().contains("NEW_FLAG=on"));
}

#[test]
fn unset_then_save_removes_key_and_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let (env_path, yaml_path) = setup_files(&temp);
    let mut config = setup_config(&env_path, &yaml_path);

    config.unset("features.beta").unwrap();
    config.save().unwrap();
    assert_eq!(config.get("features.beta").unwrap(), None);

    // Second unset has no provenance to route to and stages nothing
    config.unset("features.beta").unwrap();
    assert!(!config.has_pending_changes());
    config.save().unwrap();
    assert_eq!(config.get("features.beta").unwrap(), None);
}

#[test]
fn unset_uncovers_lower_precedence_value() {
    let temp = TempDir::new().unwrap();
    let (env_path, yaml_path) = setup_files(&temp);
    let mut config = setup_config(&env_path, &yaml_path);

    config.unset("LOG_LEVEL").unwrap();
    assert_eq!(config.get("LOG_LEVEL").unwrap(), None);

    config.save().unwrap();
    assert_eq!(config.get("LOG_LEVEL").unwrap(), Some(json!("info")));
    assert!(!std::fs::read_to_string(&yaml_path).unwrap().contains("LOG_LEVEL"));
}

#[test]
fn read_only_target_fails_save_and_keeps_staged_changes() {
    let temp = TempDir::new().unwrap();
    let (env_path, yaml_path) = setup_files(&temp);
    let mut config = Config::new(vec![
        RegisteredSource::new(EnvFileSource::new(&env_path)),
        RegisteredSource::new(StructuredFileSource::yaml(&yaml_path)).read_only(),
    ]);

    config.set("database.host", "changed", None).unwrap();
    let err = config.save().unwrap_err();
    assert_eq!(err.code(), ErrorCode::PermissionDenied);
    assert_eq!(config.staged().len(), 1);
    assert!(std::fs::read_to_string(&yaml_path).unwrap().contains("localhost"));
}

#[test]
fn earlier_groups_stay_saved_when_a_later_group_fails() {
    let writable = MemorySource::new("writable");
    let store = writable.store();
    let mut config = Config::new(vec![
        RegisteredSource::new(writable),
        RegisteredSource::new(MemorySource::new("locked").with_value("K", json!("v"))).read_only(),
    ]);

    config.set("A", "1", Some("writable")).unwrap();
    config.set("K", "changed", None).unwrap();
    let err = config.save().unwrap_err();
    assert_eq!(err.code(), ErrorCode::PermissionDenied);

    assert_eq!(store.lock().unwrap().get("A"), Some(&json!("1")));
    assert_eq!(config.staged().len(), 2);
}

#[test]
fn filtered_source_only_contributes_matching_keys() {
    let temp = TempDir::new().unwrap();
    let (env_path, yaml_path) = setup_files(&temp);
    let mut config = Config::new(vec![
        RegisteredSource::new(EnvFileSource::new(&env_path)),
        RegisteredSource::new(StructuredFileSource::yaml(&yaml_path))
            .with_filter(Filter::new().with_include_regex("^features").unwrap()),
    ]);

    // The YAML log level is filtered out, so the env value shows through
    assert_eq!(config.get("LOG_LEVEL").unwrap(), Some(json!("info")));
    assert_eq!(config.get("database.port").unwrap(), None);
    assert_eq!(config.get("features.beta").unwrap(), Some(json!(false)));
}

#[test]
fn depth_limit_keeps_subtree_as_json_text() {
    let temp = TempDir::new().unwrap();
    let (_, yaml_path) = setup_files(&temp);
    let mut config = Config::new(vec![
        RegisteredSource::new(StructuredFileSource::yaml(&yaml_path)).with_depth(0),
    ]);

    assert_eq!(
        config.get("database").unwrap(),
        Some(json!(r#"{"host":"localhost","port":5432}"#))
    );
    assert_eq!(config.get("database.host").unwrap(), None);
}

#[test]
fn reload_picks_up_external_edits() {
    let temp = TempDir::new().unwrap();
    let (env_path, yaml_path) = setup_files(&temp);
    let mut config = setup_config(&env_path, &yaml_path);
    assert_eq!(config.get("APP_NAME").unwrap(), Some(json!("demo")));

    std::fs::write(&env_path, "APP_NAME=edited\n").unwrap();
    config.reload().unwrap();
    assert_eq!(config.get("APP_NAME").unwrap(), Some(json!("edited")));
}

#[test]
fn writes_fail_without_sources() {
    let mut config = Config::new(Vec::new());
    assert!(config.values().unwrap().is_empty());
    let err = config.set("K", "v", None).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Configuration);
}

#[test]
fn env_and_structured_end_to_end() {
    let temp = TempDir::new().unwrap();
    let env_path = temp.path().join("app.env");
    std::fs::write(&env_path, "PORT=8080\n").unwrap();
    let yaml_path = temp.path().join("settings.yaml");
    std::fs::write(&yaml_path, "database:\n  host: localhost\n").unwrap();
    let yaml_before = std::fs::read_to_string(&yaml_path).unwrap();

    let mut config = setup_config(&env_path, &yaml_path);
    assert_eq!(config.get("database.host").unwrap(), Some(json!("localhost")));

    config.set("PORT", "9090", None).unwrap();
    config.save().unwrap();

    assert_eq!(std::fs::read_to_string(&env_path).unwrap(), "PORT=9090\n");
    assert_eq!(std::fs::read_to_string(&yaml_path).unwrap(), yaml_before);
    assert_eq!(config.get("PORT").unwrap(), Some(json!("9090")));
    assert_eq!(
        config.provenance("PORT").unwrap().unwrap().source_id,
        EnvFileSource::new(&env_path).id()
    );
}

#[test]
fn special_characters_survive_save_and_reload() {
    let temp = TempDir::new().unwrap();
    let (env_path, yaml_path) = setup_files(&temp);
    let mut config = setup_config(&env_path, &yaml_path);

    config.set("PASS", "pa$zzword", None).unwrap();
    config.set("WINPATH", "C:\\new dir", None).unwrap();
    config.save().unwrap();
    config.reload().unwrap();

    assert_eq!(config.get("PASS").unwrap(), Some(json!("pa$zzword")));
    assert_eq!(config.get("WINPATH").unwrap(), Some(json!("C:\\new dir")));
}

#[test]
fn dotted_key_routed_to_env_file_fails_save() {
    let temp = TempDir::new().unwrap();
    let env_path = temp.path().join("app.env");
    std::fs::write(&env_path, "PORT=8080\n").unwrap();
    let yaml_path = temp.path().join("settings.yaml");
    std::fs::write(&yaml_path, "database:\n  host: localhost\n").unwrap();
    let mut config = setup_config(&env_path, &yaml_path);

    // A new key with no hint goes to the first source, the env file
    config.set("feature.flag", "on", None).unwrap();
    let err = config.save().unwrap_err();
    assert_eq!(err.code(), ErrorCode::SourceFormat);

    assert_eq!(std::fs::read_to_string(&env_path).unwrap(), "PORT=8080\n");
    assert_eq!(config.staged().len(), 1);
    assert!(config.has_pending_changes());
}
