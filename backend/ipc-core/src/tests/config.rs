// Unit tests for IpcConfig load/save/validate

use crate::config::{DEFAULT_PORT, IpcConfig};
use crate::error::config::ConfigError;

use std::time::Duration;

use tempfile::TempDir;

/// **VALUE**: Verifies a fresh install runs on defaults.
///
/// **WHY THIS MATTERS**: The hub and every UI process must agree on the address
/// before anyone has written a config file.
///
/// **BUG THIS CATCHES**: Would catch a missing file being reported as an error.
#[test]
fn given_missing_config_file_when_load_then_returns_defaults() {
    // GIVEN: An empty config directory
    let dir = TempDir::new().expect("temp dir");

    // WHEN: Loading
    let config = IpcConfig::load(dir.path()).expect("defaults");

    // THEN: Defaults are used
    assert_eq!(config, IpcConfig::default());
    assert_eq!(config.transport.port, DEFAULT_PORT);
    assert_eq!(config.requests.timeout_ms, None);
    assert!(!config.server.forward_client_actions);
}

/// **VALUE**: Verifies saved settings load back unchanged.
///
/// **BUG THIS CATCHES**: Would catch a field missing from serialization or a
/// leftover temp file shadowing the real one.
#[test]
fn given_saved_config_when_load_then_returns_same_values() {
    // GIVEN: A customized config saved to disk
    let dir = TempDir::new().expect("temp dir");
    let mut config = IpcConfig::default();
    config.transport.port = 20001;
    config.requests = config.requests.with_timeout(Duration::from_secs(5));
    config.server.forward_client_actions = true;
    config.save(dir.path()).expect("save");

    // WHEN: Loading it back
    let loaded = IpcConfig::load(dir.path()).expect("load");

    // THEN: Every value survived
    assert_eq!(loaded, config);
    assert_eq!(loaded.requests.timeout(), Some(Duration::from_secs(5)));
    assert!(!dir.path().join("ipc.json.tmp").exists());
}

/// **VALUE**: Verifies partial files fill in defaults.
///
/// **WHY THIS MATTERS**: Users edit this file by hand and often set one value.
///
/// **BUG THIS CATCHES**: Would catch a missing `#[serde(default)]` on a section.
#[test]
fn given_partial_config_when_load_then_missing_fields_use_defaults() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join("ipc.json"),
        r#"{ "transport": { "port": 20002 } }"#,
    )
    .expect("write");

    let config = IpcConfig::load(dir.path()).expect("load");

    assert_eq!(config.transport.port, 20002);
    assert_eq!(config.transport.host, "127.0.0.1");
    assert_eq!(config.version, 1);
}

/// **VALUE**: Verifies a corrupt file is an error rather than silent defaults.
///
/// **BUG THIS CATCHES**: Would catch parse failures being swallowed.
#[test]
fn given_corrupt_config_when_load_then_returns_parse_error() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("ipc.json"), "{ not json").expect("write");

    let result = IpcConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

/// **VALUE**: Verifies the hub can only be configured onto loopback.
///
/// **WHY THIS MATTERS**: The protocol has no authentication; exposing it on the
/// network would let anyone dispatch actions.
///
/// **BUG THIS CATCHES**: Would catch the loopback check being skipped.
#[test]
fn given_non_loopback_host_when_validate_then_rejected() {
    let mut config = IpcConfig::default();
    config.transport.host = String::from("0.0.0.0");
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError { .. })
    ));

    config.transport.host = String::from("localhost");
    assert!(config.validate().is_ok());

    config.transport.host = String::from("::1");
    assert!(config.validate().is_ok());
}

/// **VALUE**: Verifies out-of-range values are rejected.
///
/// **BUG THIS CATCHES**: Would catch a zero timeout (every request instantly
/// failing) or an unknown future version being accepted.
#[test]
fn given_invalid_values_when_validate_then_rejected() {
    let mut zero_timeout = IpcConfig::default();
    zero_timeout.requests.timeout_ms = Some(0);
    assert!(zero_timeout.validate().is_err());

    let mut future_version = IpcConfig::default();
    future_version.version = 99;
    assert!(future_version.validate().is_err());
}
