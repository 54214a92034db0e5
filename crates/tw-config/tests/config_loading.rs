//! File-based config loading tests (no mocks).

use std::io::Write;

use tw_config::{load_config, ConfigError, EngineConfig};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file.flush().expect("flush config");
    file
}

#[test]
fn loads_full_config_file() {
    let file = write_config(
        r#"{
            "windows": { "short_secs": 900, "long_secs": 43200 },
            "gate": { "min_relative_change": 0.15, "volatility_multiplier": 2.0 },
            "feedback": {
                "batch_size": 20,
                "desensitize_factor": 1.2,
                "sensitize_factor": 0.8,
                "high_false_positive_rate": 0.3,
                "low_false_positive_rate": 0.02
            },
            "ingest": { "queue_capacity": 64, "batch_size": 8, "batch_timeout_ms": 100 },
            "update_policy": { "check_every_points": 5, "check_every_secs": 10 }
        }"#,
    );

    let config = load_config(file.path()).expect("config should load");
    assert_eq!(config.windows.short_secs, 900);
    assert!((config.gate.min_relative_change - 0.15).abs() < 1e-12);
    assert_eq!(config.feedback.batch_size, 20);
    assert_eq!(config.ingest.queue_capacity, 64);
    assert_eq!(config.update_policy.check_every_points, 5);
}

#[test]
fn partial_file_keeps_defaults() {
    let file = write_config(r#"{ "ingest": { "queue_capacity": 16, "batch_size": 4, "batch_timeout_ms": 50 } }"#);
    let config = load_config(file.path()).expect("config should load");
    assert_eq!(config.ingest.queue_capacity, 16);

    let defaults = EngineConfig::default();
    assert_eq!(config.windows.short_secs, defaults.windows.short_secs);
    assert_eq!(config.feedback.batch_size, defaults.feedback.batch_size);
}

#[test]
fn missing_file_is_not_found() {
    let err = load_config(std::path::Path::new("/nonexistent/engine.json")).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }));
}

#[test]
fn malformed_json_is_parse_error() {
    let file = write_config("{ not json");
    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn semantic_violation_is_validation_error() {
    let file = write_config(r#"{ "windows": { "short_secs": 86400, "long_secs": 1800 } }"#);
    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}
