//! Config file loading: defaults, overrides, and error messages.

use std::fs;

use assert_fs::prelude::*;
use storewatch_core::{config, paths, ConfigError, WatchConfig};

#[test]
fn missing_home_config_falls_back_to_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let loaded = config::load_at(home.path()).expect("load");
    assert_eq!(loaded, WatchConfig::default());
}

#[test]
fn home_config_overrides_selected_fields() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = paths::config_path_at(home.path());
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(&path, "event_name: store_changed\nsettle_ms: 10\n").expect("write");

    let loaded = config::load_at(home.path()).expect("load");
    assert_eq!(loaded.event_name, "store_changed");
    assert_eq!(loaded.settle_ms, 10);
    assert_eq!(loaded.channel_capacity, WatchConfig::default().channel_capacity);
}

#[test]
fn explicit_missing_file_is_not_found() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load(Some(&dir.path().join("absent.yaml"))).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
}

#[test]
fn empty_file_yields_defaults() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("empty.yaml");
    file.touch().expect("touch");
    assert_eq!(config::load_from(file.path()).expect("load"), WatchConfig::default());
}

#[test]
fn corrupt_yaml_names_the_file() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("broken.yaml");
    file.write_str("settle_ms: [unclosed").expect("write");

    let err = config::load_from(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("broken.yaml"));
}

#[test]
fn empty_journal_suffix_fails_validation() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str("journal_suffix: \"\"\n").expect("write");

    let err = config::load_from(file.path()).unwrap_err();
    assert!(
        matches!(err, ConfigError::Invalid { field: "journal_suffix", .. }),
        "got: {err}"
    );
}
