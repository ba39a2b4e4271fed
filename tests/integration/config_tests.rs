use super::fixtures::{clear_env, ENV_MUTEX};
use clap::Parser;
use imgprint::cli::Cli;
use imgprint::config::{CacheMode, Colorspace, ConfigError, Settings, SettingsOverrides, SquareMode};
use imgprint::error::ExitCode;
use imgprint::run_app;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_file_values() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
colorspace = "rgb12"
size = 8
square_mode = "stretch"
threshold = 97.5
cache_mode = "read-only"
"#,
    )
    .unwrap();

    let settings = Settings::load(Some(&path), &SettingsOverrides::default()).unwrap();
    assert_eq!(settings.colorspace, Colorspace::Rgb12);
    assert_eq!(settings.size, 8);
    assert_eq!(settings.square_mode, SquareMode::Stretch);
    assert_eq!(settings.threshold, 97.5);
    assert_eq!(settings.cache_mode, CacheMode::ReadOnly);
    assert_eq!(settings.quick_resize, 0);
    assert_eq!(settings.jobs, Settings::default().jobs);
}

#[test]
fn test_layer_precedence() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "size = 8\nthreshold = 80.0\n").unwrap();

    std::env::set_var("IMGPRINT_SIZE", "12");
    let from_env = Settings::load(Some(&path), &SettingsOverrides::default()).unwrap();
    assert_eq!(from_env.size, 12);
    assert_eq!(from_env.threshold, 80.0);

    let overrides = SettingsOverrides {
        size: Some(24),
        ..SettingsOverrides::default()
    };
    let from_flags = Settings::load(Some(&path), &overrides).unwrap();
    assert_eq!(from_flags.size, 24);
    assert_eq!(from_flags.threshold, 80.0);

    clear_env();
}

#[test]
fn test_env_cache_mode() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "").unwrap();

    std::env::set_var("IMGPRINT_CACHE_MODE", "disabled");
    let settings = Settings::load(Some(&path), &SettingsOverrides::default()).unwrap();
    assert_eq!(settings.cache_mode, CacheMode::Disabled);
    assert_eq!(settings.cache_location().unwrap(), None);

    clear_env();
}

#[test]
fn test_invalid_values_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");

    fs::write(&path, "colorspace = \"rgb24\"\n").unwrap();
    let err = Settings::load(Some(&path), &SettingsOverrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::Extract(_)));

    fs::write(&path, "threshold = 101.0\n").unwrap();
    let err = Settings::load(Some(&path), &SettingsOverrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidThreshold(_)));

    fs::write(&path, "").unwrap();
    let overrides = SettingsOverrides {
        size: Some(0),
        ..SettingsOverrides::default()
    };
    let err = Settings::load(Some(&path), &overrides).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSize(0)));
}

#[test]
fn test_missing_explicit_config_file() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = Settings::load(Some(&path), &SettingsOverrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingConfigFile(p) if p == path));
}

#[test]
fn test_cache_file_name_keys_on_shape() {
    let base = Settings::default();
    let other_size = Settings {
        size: 8,
        ..Settings::default()
    };
    let other_threshold = Settings {
        threshold: 50.0,
        ..Settings::default()
    };
    assert_ne!(base.cache_file_name(), other_size.cache_file_name());
    assert_eq!(base.cache_file_name(), other_threshold.cache_file_name());
}

#[test]
fn test_run_app_config_error_exit_code() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "").unwrap();

    let cli = Cli::try_parse_from([
        "imgprint",
        "--quiet",
        "fingerprint",
        "a.png",
        "--size",
        "0",
        "--config",
        config.to_str().unwrap(),
    ])
    .unwrap();
    let err = run_app(cli).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::ConfigError);
}

#[test]
fn test_run_app_corrupt_cache_exit_code() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "").unwrap();
    let cache = dir.path().join("bad.cache");
    fs::write(&cache, "this is not a cache record\n").unwrap();

    let cli = Cli::try_parse_from([
        "imgprint",
        "--quiet",
        "fingerprint",
        "a.png",
        "--cache-file",
        cache.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ])
    .unwrap();
    let err = run_app(cli).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::CacheError);
}
