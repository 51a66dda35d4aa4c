//! Tests for the configuration system: validation, environment parsing and
//! file persistence.

use super::*;
use crate::error::ZiporaError;
use std::env;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_defaults_and_presets_are_valid() {
    assert!(PlatformConfig::default().validate().is_ok());
    assert!(PlatformConfig::scalar_preset().validate().is_ok());
    assert!(PlatformConfig::diagnostic_preset().validate().is_ok());

    assert!(PlatformConfig::scalar_preset().disable_cpu_detection);
    assert!(!PlatformConfig::default().disable_cpu_detection);
    assert!(PlatformConfig::diagnostic_preset().log_capabilities);
}

#[test]
fn test_validation_rejects_bad_prefix() {
    let mut config = PlatformConfig::default();
    config.worker_name_prefix.clear();
    assert!(matches!(config.validate(), Err(ZiporaError::Configuration { .. })));

    config.worker_name_prefix = "bad\0name".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_from_env_with_prefix() {
    // unique prefix so parallel tests never see these variables
    let prefix = "ZPLAT_TEST_ENV_";
    env::set_var(format!("{}CPU_DISABLE_DETECTION", prefix), "yes");
    env::set_var(format!("{}CPU_LOG_CAPABILITIES", prefix), "0");
    env::set_var(format!("{}THREAD_WORKER_PREFIX", prefix), "zstdmt");

    let config = PlatformConfig::from_env_with_prefix(prefix).unwrap();
    assert!(config.disable_cpu_detection);
    assert!(!config.log_capabilities);
    assert_eq!(config.worker_name_prefix, "zstdmt");

    env::remove_var(format!("{}CPU_DISABLE_DETECTION", prefix));
    env::remove_var(format!("{}CPU_LOG_CAPABILITIES", prefix));
    env::remove_var(format!("{}THREAD_WORKER_PREFIX", prefix));
}

#[test]
fn test_from_env_unset_uses_defaults() {
    let config = PlatformConfig::from_env_with_prefix("ZPLAT_TEST_UNSET_").unwrap();
    assert_eq!(config, PlatformConfig::default());
}

#[test]
fn test_parse_env_helpers() {
    env::set_var("ZPLAT_TEST_BOOL_ON", "On");
    env::set_var("ZPLAT_TEST_BOOL_OFF", "nope");
    env::set_var("ZPLAT_TEST_NUM", "17");
    env::set_var("ZPLAT_TEST_NUM_BAD", "seventeen");

    assert!(parse_env_bool("ZPLAT_TEST_BOOL_ON", false));
    assert!(!parse_env_bool("ZPLAT_TEST_BOOL_OFF", true));
    assert!(parse_env_bool("ZPLAT_TEST_BOOL_MISSING", true));
    assert_eq!(parse_env_var("ZPLAT_TEST_NUM", 3usize), 17);
    assert_eq!(parse_env_var("ZPLAT_TEST_NUM_BAD", 3usize), 3);

    for var in [
        "ZPLAT_TEST_BOOL_ON",
        "ZPLAT_TEST_BOOL_OFF",
        "ZPLAT_TEST_NUM",
        "ZPLAT_TEST_NUM_BAD",
    ] {
        env::remove_var(var);
    }
}

#[test]
fn test_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("platform.json");

    let config = PlatformConfig {
        disable_cpu_detection: true,
        log_capabilities: true,
        worker_name_prefix: "compress".to_string(),
    };
    config.save_to_file(&path).unwrap();
    let loaded = PlatformConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_load_partial_file_fills_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("partial.json");
    fs::write(&path, r#"{ "log_capabilities": true }"#).unwrap();

    let loaded = PlatformConfig::load_from_file(&path).unwrap();
    assert!(loaded.log_capabilities);
    assert_eq!(loaded.worker_name_prefix, "zipora-worker");
}

#[test]
fn test_load_invalid_files() {
    let dir = tempdir().unwrap();

    let garbage = dir.path().join("garbage.json");
    fs::write(&garbage, "not json").unwrap();
    assert!(matches!(
        PlatformConfig::load_from_file(&garbage),
        Err(ZiporaError::Configuration { .. })
    ));

    let invalid = dir.path().join("invalid.json");
    fs::write(&invalid, r#"{ "worker_name_prefix": "" }"#).unwrap();
    assert!(PlatformConfig::load_from_file(&invalid).is_err());

    let missing = PlatformConfig::load_from_file(dir.path().join("missing.json"));
    match missing {
        Err(ZiporaError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_save_into_missing_directory_is_io_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("platform.json");
    let err = PlatformConfig::default().save_to_file(&path).unwrap_err();
    assert_eq!(err.category(), "io");
    assert!(err.is_recoverable());
}
