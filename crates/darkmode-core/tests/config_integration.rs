//! Integration tests for config parsing against the real config.toml.

use std::fs;
use std::path::PathBuf;

use darkmode_core::config::DEFAULT_CONFIG_TOML;
use darkmode_core::{Config, Error};

fn project_root() -> PathBuf {
    // Navigate from crates/darkmode-core/ up to project root
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent() // crates/
        .unwrap()
        .parent() // darkmode/
        .unwrap()
        .to_path_buf()
}

#[test]
fn test_load_real_config() {
    let config_path = project_root().join("config.toml");
    let config = Config::load(&config_path).expect("Failed to load config.toml");

    assert_eq!(config.store.path, "", "Default storage location expected");
    assert!(config.control.provision_on_missing_agent);
}

#[test]
fn test_real_config_validates() {
    let config_path = project_root().join("config.toml");
    let config = Config::load(&config_path).unwrap();

    config.validate().expect("Real config.toml should be valid");
    assert!(config.warnings().is_empty());
}

#[test]
fn test_real_config_is_embedded_default() {
    let on_disk = fs::read_to_string(project_root().join("config.toml")).unwrap();
    assert_eq!(on_disk, DEFAULT_CONFIG_TOML);
}

#[test]
fn test_real_config_documents_every_key() {
    // Every key the schema knows should appear in the example config.
    for key in ["[store]", "path", "max_page_states", "[control]", "provision_on_missing_agent"] {
        assert!(
            DEFAULT_CONFIG_TOML.contains(key),
            "config.toml should document {key}"
        );
    }
}

#[test]
fn test_find_and_load_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
        [store]
        path = "/tmp/darkmode-test/storage.json"
        max_page_states = 250
        "#,
    )
    .unwrap();

    let result = Config::find_and_load(Some(&path)).unwrap();
    assert_eq!(result.source.as_deref(), Some(path.as_path()));
    assert!(!result.used_defaults);

    let config = result.config;
    assert_eq!(config.store.max_page_states, 250);
    assert_eq!(
        config.store_path(),
        PathBuf::from("/tmp/darkmode-test/storage.json")
    );
    // Not in the user file, inherited from the embedded default
    assert!(config.control.provision_on_missing_agent);
}

#[test]
fn test_find_and_load_explicit_path_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.toml");

    let err = Config::find_and_load(Some(&path)).unwrap_err();
    assert!(matches!(err, Error::ConfigNotFound(_)));
}

#[test]
fn test_find_and_load_explicit_path_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[control]\nprovision = true\n").unwrap();

    let err = Config::find_and_load(Some(&path)).unwrap_err();
    assert!(matches!(err, Error::TomlDe(_)));
    assert!(err.to_string().contains("provision"));
}
