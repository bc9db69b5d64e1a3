//! Integration tests for the source contract across every file adapter.
//!
//! Each adapter must only change its backing file on save, refresh its cache
//! after saving, and stage removal of every key on clear.

use confetti::config::{Config, RegisteredSource, Source};
use confetti::sources::{EnvFileSource, IniFileSource, MemorySource, StructuredFileSource};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

/// Helper to build one adapter of each file kind over fresh files in `dir`.
fn file_sources(dir: &Path) -> Vec<Box<dyn Source>> {
    std::fs::write(dir.join("app.env"), "SEED=1\n").unwrap();
    std::fs::write(dir.join("app.yaml"), "SEED: '1'\n").unwrap();
    std::fs::write(dir.join("app.json"), "{\"SEED\": \"1\"}").unwrap();
    std::fs::write(dir.join("app.ini"), "SEED = 1\n").unwrap();
    vec![
        Box::new(EnvFileSource::new(dir.join("app.env"))),
        Box::new(StructuredFileSource::yaml(dir.join("app.yaml"))),
        Box::new(StructuredFileSource::json(dir.join("app.json"))),
        Box::new(IniFileSource::new(dir.join("app.ini"))),
    ]
}

#[test]
fn every_adapter_loads_the_seed_value() {
    let temp = TempDir::new().unwrap();
    for mut source in file_sources(temp.path()) {
        let loaded = source.load(None, None).unwrap();
        // INI option names are lower-cased
        let seed = loaded
            .get("SEED")
            .or_else(|| loaded.get("seed"))
            .cloned();
        assert_eq!(seed, Some(json!("1")), "{}", source.name());
    }
}

#[test]
fn staged_writes_touch_disk_only_on_save() {
    let temp = TempDir::new().unwrap();
    for mut source in file_sources(temp.path()) {
        source.load(None, None).unwrap();
        source.set("added", json!("yes"));
        assert!(!source.exists("added"), "{}", source.name());

        source.save().unwrap();
        assert_eq!(source.get("added"), Some(json!("yes")), "{}", source.name());
        assert!(!source.cache().has_staged(), "{}", source.name());
    }
}

#[test]
fn clear_then_save_empties_every_adapter() {
    let temp = TempDir::new().unwrap();
    for mut source in file_sources(temp.path()) {
        source.load(None, None).unwrap();
        assert!(source.size() > 0, "{}", source.name());
        source.clear();
        source.save().unwrap();
        assert_eq!(source.size(), 0, "{}", source.name());
    }
}

#[test]
fn ini_sections_merge_with_other_sources() {
    let temp = TempDir::new().unwrap();
    let ini_path = temp.path().join("settings.ini");
    std::fs::write(&ini_path, "[server]\nport = 8080\nhost = 0.0.0.0\n").unwrap();

    let defaults = MemorySource::new("defaults")
        .with_value("server.port", json!(80))
        .with_value("server.workers", json!(2));
    let mut config = Config::new(vec![
        RegisteredSource::new(defaults),
        RegisteredSource::new(IniFileSource::new(&ini_path)),
    ]);

    assert_eq!(config.get("server.port").unwrap(), Some(json!("8080")));
    assert_eq!(config.get("server.workers").unwrap(), Some(json!(2)));

    config.set("server.port", "9000", None).unwrap();
    config.save().unwrap();
    let written = std::fs::read_to_string(&ini_path).unwrap();
    assert!(written.contains("[server]\nport = 9000\n"));
}

#[test]
fn env_file_expands_earlier_keys_without_touching_process_env() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".env");
    std::fs::write(
        &path,
        "CONFETTI_TEST_BASE=/srv/app\nCONFETTI_TEST_DATA=${CONFETTI_TEST_BASE}/data\n",
    )
    .unwrap();

    let mut source = EnvFileSource::new(&path);
    let loaded = source.load(None, None).unwrap();
    assert_eq!(loaded["CONFETTI_TEST_DATA"], json!("/srv/app/data"));
    assert!(std::env::var("CONFETTI_TEST_BASE").is_err());
}
