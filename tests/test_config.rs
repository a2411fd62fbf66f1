//! Configuration loading through the full pipeline from files on disk.

use std::path::PathBuf;
use std::time::Duration;

use ackline::config::{ConfigLimits, ConfigLoader, StoreKind, TransportKind};
use ackline::error::{AcklineError, ConfigError, ExitCode};

fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("alarm.yaml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn full_config_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        r#"
alarm:
  message: "Boiler pressure alarm"
  dispatch_delayed_tiers: false
timing:
  tick: 1s
  poll_interval: 6s
  dispatch_timeout: 500ms
recipients:
  - { id: "+44 7700 900001", name: "Supervisor 1", activation_delay: 0 }
  - { id: "+447700900002", name: "Supervisor 2", activation_delay: 120 }
transport:
  kind: twilio
  account_sid: ${ACKLINE_IT_SID:-AC123}
  auth_token: ${ACKLINE_IT_TOKEN:-secret}
  from: "+15005550006"
store:
  kind: file
  path: replies.jsonl
server:
  bind: ":9090"
"#,
    );

    let result = ConfigLoader::with_defaults().load(&path).unwrap();
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);

    let config = result.config;
    assert_eq!(config.transport.kind, TransportKind::Twilio);
    assert_eq!(config.transport.account_sid.as_deref(), Some("AC123"));
    assert_eq!(config.store.kind, StoreKind::File);
    assert_eq!(config.timing.dispatch_timeout, Duration::from_millis(500));

    let options = config.controller_options();
    assert_eq!(options.message, "Boiler pressure alarm");
    assert!(!options.dispatch_delayed_tiers);
    assert_eq!(options.recipients[0].id.as_str(), "+447700900001");
    assert_eq!(options.recipients[1].activation_delay_secs, 120);
}

#[test]
fn unset_variable_surfaces_as_warning_then_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        r#"
recipients:
  - { id: "+1", name: a }
transport:
  account_sid: "${ACKLINE_IT_UNSET_SID_9F2}"
  auth_token: t
  from: "+2"
"#,
    );

    let err = ConfigLoader::with_defaults().load(&path).unwrap_err();
    let ConfigError::ValidationError { errors, .. } = &err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(errors[0].path, "transport.account_sid");

    let exit = AcklineError::from(err).exit_code();
    assert_eq!(exit, ExitCode::CONFIG_ERROR);
}

#[test]
fn required_variable_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "recipients: [{ id: '+1' }]\ntransport:\n  auth_token: ${ACKLINE_IT_TOKEN_9F2:?token required}\n",
    );
    let err = ConfigLoader::with_defaults().load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::EnvVarNotSet { ref var, .. } if var == "ACKLINE_IT_TOKEN_9F2"));
}

#[test]
fn bom_is_stripped() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "\u{feff}recipients: [{ id: '+1', name: a }]\ntransport: { kind: log }\n",
    );
    assert!(ConfigLoader::with_defaults().load(&path).is_ok());
}

#[test]
fn parse_errors_carry_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "recipients:\n  - id: [unterminated\n");
    let err = ConfigLoader::with_defaults().load(&path).unwrap_err();
    match &err {
        ConfigError::ParseError { line, .. } => assert!(line.is_some()),
        other => panic!("expected parse error, got {other:?}"),
    }
    assert_eq!(AcklineError::from(err).exit_code(), ExitCode::CONFIG_ERROR);
}

#[test]
fn oversized_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, &format!("# {}\n", "x".repeat(256)));
    let loader = ConfigLoader::new(ConfigLimits {
        max_config_size: 128,
    });
    assert!(matches!(
        loader.load(&path).unwrap_err(),
        ConfigError::InvalidValue { .. }
    ));
}

#[test]
fn missing_file() {
    let err = ConfigLoader::with_defaults()
        .load(std::path::Path::new("/nonexistent/alarm.yaml"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingFile { .. }));
}
