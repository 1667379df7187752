// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration loading

use camera3a::{AaaError, Config};

#[test]
fn test_config_default_thresholds() {
    let config = Config::default();
    assert_eq!(config.frame_sync.min_delta_us, 20_000);
    assert_eq!(config.frame_sync.max_delta_us, 200_000);
    assert_eq!(config.convergence.min_statistics_cycles, 6);
    assert_eq!(config.flash.timeout_frames, 5);
    assert_eq!(config.default_exposure_delay_frames, 2);
}

#[test]
fn test_config_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.convergence.min_statistics_cycles = 0;
    config.drop_initial_statistics = 3;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_or_default(Some(&dir.path().join("absent.json"))).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        Config::load_or_default(Some(&path)),
        Err(AaaError::Config(_))
    ));
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "frame_sync": { "min_delta_us": 50000, "max_delta_us": 10000 } }"#,
    )
    .unwrap();
    assert!(matches!(Config::load(&path), Err(AaaError::Config(_))));
}
