//! Tests for layered configuration loading.

use super::*;
use serial_test::serial;
use std::path::PathBuf;

fn write_yaml(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("esign-relay-{}-{name}.yaml", std::process::id()));
    std::fs::write(&path, contents).expect("temp file writable");
    path
}

fn clear_env() {
    for key in [
        "ESR__SERVER__PORT",
        "ESR__RELAY__MAX_ATTEMPTS",
        "ESR__RELAY__DOWNSTREAM_URL",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_no_sources_yields_defaults() {
    clear_env();

    let config = load_config(None).expect("defaults load");

    assert_eq!(config.server.port, 8080);
    assert_eq!(config.relay.max_attempts, 3);
    assert!(config.relay.downstream_url.is_none());
}

#[test]
#[serial]
fn test_explicit_file_is_applied() {
    clear_env();
    let path = write_yaml(
        "explicit",
        "server:\n  port: 9100\nrelay:\n  downstream_url: https://script.example/exec\n  jitter_max_ms: 400\n",
    );

    let config = load_config(Some(path.to_string_lossy().into_owned())).expect("file loads");

    assert_eq!(config.server.port, 9100);
    assert_eq!(
        config.relay.downstream_url.as_deref(),
        Some("https://script.example/exec")
    );
    assert_eq!(config.relay.jitter_max_ms, 400);
    assert_eq!(config.relay.jitter_min_ms, 80);

    std::fs::remove_file(path).ok();
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    clear_env();
    let path = write_yaml("override", "server:\n  port: 9100\n");
    std::env::set_var("ESR__SERVER__PORT", "9200");
    std::env::set_var("ESR__RELAY__MAX_ATTEMPTS", "5");

    let config = load_config(Some(path.to_string_lossy().into_owned())).expect("loads");

    assert_eq!(config.server.port, 9200);
    assert_eq!(config.relay.max_attempts, 5);

    clear_env();
    std::fs::remove_file(path).ok();
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_env();

    let result = load_config(Some("/nonexistent/esign-relay/service".to_string()));

    assert!(matches!(result, Err(ConfigError::Loading { .. })));
}

#[test]
#[serial]
fn test_malformed_value_is_an_error() {
    clear_env();
    std::env::set_var("ESR__SERVER__PORT", "not-a-port");

    let result = load_config(None);

    assert!(result.is_err());
    clear_env();
}

#[test]
fn test_default_filter_uses_level_for_own_crates() {
    let filter = default_filter("debug");

    assert!(filter.contains("esign_relay_core=debug"));
    assert!(filter.contains("esign_relay_api=debug"));
    assert!(filter.contains("tower_http=debug"));
}
