use std::io::Write;

use crate::config::LogConfig;
use crate::error::LogError;
use crate::log::LogOptions;
use crate::traversal::{DEFAULT_CONCURRENCY, SignaturePolicy};

#[test]
fn test_parse_full_config() {
    let config = LogConfig::from_toml(
        r#"
        [log]
        id = "events"
        max_length = 1000
        pointer_count = 16

        [traversal]
        length = 50
        concurrency = 32
        signatures = "tolerate"

        [join]
        concurrency = 8
        "#,
    )
    .unwrap();

    assert_eq!(config.log.id.as_deref(), Some("events"));
    assert_eq!(config.log.max_length, Some(1000));
    assert_eq!(config.log.pointer_count, 16);
    assert_eq!(config.traversal.length, Some(50));
    assert_eq!(config.traversal.concurrency, 32);
    assert_eq!(config.traversal.signatures, SignaturePolicy::Tolerate);
    assert_eq!(config.join.concurrency, 8);
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = LogConfig::from_toml("").unwrap();

    assert!(config.log.id.is_none());
    assert!(config.log.max_length.is_none());
    assert_eq!(config.log.pointer_count, 1);
    assert!(config.traversal.length.is_none());
    assert_eq!(config.traversal.concurrency, DEFAULT_CONCURRENCY);
    assert_eq!(config.traversal.signatures, SignaturePolicy::Enforce);
    assert_eq!(config.join.concurrency, DEFAULT_CONCURRENCY);
}

#[test]
fn test_partial_section_keeps_other_defaults() {
    let config = LogConfig::from_toml("[log]\nid = \"partial\"\n").unwrap();
    assert_eq!(config.log.id.as_deref(), Some("partial"));
    assert_eq!(config.log.pointer_count, 1);
    assert_eq!(config.join.concurrency, DEFAULT_CONCURRENCY);
}

#[test]
fn test_invalid_config_is_error() {
    let bad_policy = LogConfig::from_toml("[traversal]\nsignatures = \"sometimes\"\n");
    assert!(matches!(bad_policy, Err(LogError::Config(_))));

    let bad_type = LogConfig::from_toml("[log]\npointer_count = \"many\"\n");
    assert!(matches!(bad_type, Err(LogError::Config(_))));

    let bad_syntax = LogConfig::from_toml("[log");
    assert!(matches!(bad_syntax, Err(LogError::Config(_))));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[join]\nconcurrency = 4").unwrap();

    let config = LogConfig::load(file.path()).unwrap();
    assert_eq!(config.join.concurrency, 4);
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = LogConfig::load(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(LogError::Config(msg)) if msg.contains("absent.toml")));
}

#[test]
fn test_log_options_from_config() {
    let config = LogConfig::from_toml(
        "[log]\nid = \"events\"\nmax_length = 50\npointer_count = 8\n\n[join]\nconcurrency = 0\n",
    )
    .unwrap();
    let options = LogOptions::from_config(&config);

    assert_eq!(options.log_id.as_deref(), Some("events"));
    assert_eq!(options.join_concurrency, 1);
    assert_eq!(options.pointer_count, 8);
    assert_eq!(options.max_length, Some(50));

    let defaults = LogOptions::from_config(&LogConfig::default());
    assert_eq!(defaults.pointer_count, 1);
    assert!(defaults.max_length.is_none());
    assert!(options.entries.is_empty());
    assert!(options.heads.is_none());
}
