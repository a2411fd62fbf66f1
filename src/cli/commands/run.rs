//! `run` command
//!
//! Wires configuration, transport, store, controller and HTTP server
//! together and runs until the cancellation token fires.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::cli::args::RunArgs;
use crate::config::{AlarmConfig, ConfigLoader, StoreConfig, StoreKind, TransportKind};
use crate::error::{AcklineError, ConfigError};
use crate::escalation::EscalationController;
use crate::http::{self, AppState, parse_bind_addr};
use crate::observability::{Event, EventEmitter};
use crate::store::{FileStore, MemoryStore, Store};
use crate::transport::twilio::DEFAULT_API_BASE;
use crate::transport::{LogTransport, Transport, TwilioConfig, TwilioTransport};

/// Start the alarm service.
///
/// # Errors
///
/// Returns a configuration error if the file fails to load or the twilio
/// credentials are missing, or an I/O error if the HTTP address cannot be
/// bound or the events file cannot be created.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), AcklineError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    tracing::info!(config = %args.config.display(), "loading configuration");
    let load_result = ConfigLoader::with_defaults().load(&args.config)?;
    for warning in &load_result.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    let config = load_result.config;

    let transport = build_transport(&config, args.dry_run)?;
    let store = build_store(&config.store)?;
    let events = Arc::new(match args.events_file {
        Some(ref path) => EventEmitter::from_file(path)?,
        None => EventEmitter::stderr(),
    });

    let controller = EscalationController::new(
        config.controller_options(),
        transport,
        Arc::clone(&store),
        Arc::clone(&events),
    );

    let bind = parse_bind_addr(args.bind.as_deref().unwrap_or(&config.server.bind))?;
    let state = Arc::new(AppState {
        controller: controller.clone(),
        store,
        reply_message: config.server.reply_message.clone(),
    });
    let (server, bound_addr) = http::serve(&bind, state, cancel.clone()).await?;

    tracing::info!(
        %bound_addr,
        transport = %controller.transport_type(),
        recipients = config.recipients.len(),
        "ackline listening"
    );
    events.emit(Event::ServiceStarted {
        timestamp: Utc::now(),
        bind: bound_addr.to_string(),
        transport: controller.transport_type().to_string(),
        recipients: config.recipients.len(),
    });

    if args.trigger {
        match controller.trigger().await {
            Ok(report) => tracing::info!(
                sent = report.succeeded(),
                total = report.outcomes.len(),
                "initial tier dispatched"
            ),
            Err(e) => tracing::warn!(error = %e, "startup trigger failed"),
        }
    }

    cancel.cancelled().await;

    controller.shutdown();
    if let Err(e) = server.await {
        tracing::debug!(error = %e, "HTTP server task ended abnormally");
    }
    events.emit(Event::ServiceStopped {
        timestamp: Utc::now(),
        reason: "shutdown requested".to_string(),
    });
    events.flush();
    Ok(())
}

/// Builds the outbound transport.
///
/// `dry_run` forces the log transport regardless of configuration.
///
/// # Errors
///
/// Returns [`ConfigError::MissingCredentials`] when the twilio transport is
/// selected without complete credentials.
pub fn build_transport(
    config: &AlarmConfig,
    dry_run: bool,
) -> Result<Arc<dyn Transport>, ConfigError> {
    if dry_run || config.transport.kind == TransportKind::Log {
        if dry_run {
            tracing::info!("dry run: alerts will be logged, not sent");
        }
        return Ok(Arc::new(LogTransport::new()));
    }

    let t = &config.transport;
    let twilio = TwilioTransport::new(TwilioConfig {
        account_sid: t.account_sid.clone().unwrap_or_default(),
        auth_token: t.auth_token.clone().unwrap_or_default(),
        from: t.from.clone().unwrap_or_default(),
        api_base: t
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        timeout: config.timing.dispatch_timeout,
    })?;
    tracing::debug!(endpoint = twilio.endpoint(), "twilio transport ready");
    Ok(Arc::new(twilio))
}

/// Builds the acknowledgment store.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when the file store has no path.
pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn Store>, ConfigError> {
    match config.kind {
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreKind::File => {
            let path = config.path.clone().ok_or_else(|| ConfigError::InvalidValue {
                field: "store.path".to_string(),
                value: String::new(),
                expected: "a file path for the file store".to_string(),
            })?;
            tracing::info!(path = %path.display(), "using file store");
            Ok(Arc::new(FileStore::new(path)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportType;

    fn parse(yaml: &str) -> AlarmConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_dry_run_overrides_twilio() {
        let config = parse("recipients: [{ id: '+1555' }]\n");
        let transport = build_transport(&config, true).unwrap();
        assert_eq!(transport.transport_type(), TransportType::Log);
    }

    #[test]
    fn test_twilio_without_credentials_is_fatal() {
        let config = parse("recipients: [{ id: '+1555' }]\n");
        let Err(err) = build_transport(&config, false) else {
            panic!("expected error");
        };
        assert!(matches!(err, ConfigError::MissingCredentials { .. }));
    }

    #[test]
    fn test_twilio_with_credentials() {
        let config = parse(
            "recipients: [{ id: '+1555' }]\n\
             transport: { account_sid: AC1, auth_token: t, from: '+1000' }\n",
        );
        let transport = build_transport(&config, false).unwrap();
        assert_eq!(transport.transport_type(), TransportType::Twilio);
    }

    #[test]
    fn test_file_store_requires_path() {
        let config = StoreConfig {
            kind: StoreKind::File,
            path: None,
        };
        assert!(build_store(&config).is_err());
        assert!(build_store(&StoreConfig::default()).is_ok());
    }
}
