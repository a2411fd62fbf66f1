//! Metrics collection for `ackline`.
//!
//! Provides Prometheus-compatible metrics with fixed label sets and typed
//! convenience functions for recording measurements. Recipient addresses
//! are never used as label values.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::AcklineError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Why an inbound event was dropped before reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Event predates the current episode.
    PreEpisode,
    /// Event id already processed.
    Duplicate,
    /// Acknowledgment from an unregistered address.
    UnknownRecipient,
    /// Stored record failed validation.
    Malformed,
}

impl DiscardReason {
    const fn as_label(self) -> &'static str {
        match self {
            Self::PreEpisode => "pre_episode",
            Self::Duplicate => "duplicate",
            Self::UnknownRecipient => "unknown_recipient",
            Self::Malformed => "malformed",
        }
    }
}

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `AcklineError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), AcklineError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| AcklineError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "ackline_dispatch_total",
        "Alert dispatches by outcome (sent, failed)"
    );
    describe_histogram!(
        "ackline_dispatch_duration_ms",
        "Alert dispatch duration in milliseconds"
    );
    describe_counter!(
        "ackline_acknowledgments_total",
        "Recipients that moved to acknowledged"
    );
    describe_counter!(
        "ackline_replies_total",
        "Non-acknowledgment replies surfaced as transient messages"
    );
    describe_counter!(
        "ackline_polls_total",
        "Acknowledgment store polls by result (ok, error, stale)"
    );
    describe_counter!(
        "ackline_events_discarded_total",
        "Inbound events dropped before reconciliation, by reason"
    );
    describe_counter!(
        "ackline_inbound_sms_total",
        "Inbound webhook deliveries by result (stored, rejected, error)"
    );
    describe_gauge!(
        "ackline_alarm_triggered",
        "1 while an episode is running, 0 when idle"
    );
    describe_gauge!(
        "ackline_recipients_active",
        "Recipients active in the current episode"
    );
}

/// Records one finished alert dispatch.
pub fn record_dispatch(success: bool, duration: Duration) {
    let outcome = if success { "sent" } else { "failed" };
    counter!("ackline_dispatch_total", "outcome" => outcome).increment(1);
    histogram!("ackline_dispatch_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

/// Records recipients that acknowledged during one poll.
pub fn record_acknowledgments(count: usize) {
    counter!("ackline_acknowledgments_total").increment(count as u64);
}

/// Records replies surfaced as transient messages.
pub fn record_replies(count: usize) {
    counter!("ackline_replies_total").increment(count as u64);
}

/// Poll result label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    /// Events fetched and applied.
    Ok,
    /// Fetch failed or timed out.
    Error,
    /// Result arrived after the episode ended.
    Stale,
}

/// Records one poll cycle.
pub fn record_poll(result: PollResult) {
    let label = match result {
        PollResult::Ok => "ok",
        PollResult::Error => "error",
        PollResult::Stale => "stale",
    };
    counter!("ackline_polls_total", "result" => label).increment(1);
}

/// Records events dropped before reconciliation.
pub fn record_discarded(reason: DiscardReason, count: usize) {
    if count == 0 {
        return;
    }
    counter!("ackline_events_discarded_total", "reason" => reason.as_label())
        .increment(count as u64);
}

/// Records one inbound webhook delivery.
pub fn record_inbound(result: &'static str) {
    counter!("ackline_inbound_sms_total", "result" => result).increment(1);
}

/// Sets the alarm gauge.
pub fn set_alarm_triggered(triggered: bool) {
    gauge!("ackline_alarm_triggered").set(if triggered { 1.0 } else { 0.0 });
}

/// Sets the active recipient gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_recipients_active(count: usize) {
    gauge!("ackline_recipients_active").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discard_labels_are_fixed() {
        assert_eq!(DiscardReason::PreEpisode.as_label(), "pre_episode");
        assert_eq!(DiscardReason::Duplicate.as_label(), "duplicate");
        assert_eq!(DiscardReason::UnknownRecipient.as_label(), "unknown_recipient");
        assert_eq!(DiscardReason::Malformed.as_label(), "malformed");
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_dispatch(true, Duration::from_millis(12));
        record_dispatch(false, Duration::from_secs(10));
        record_acknowledgments(2);
        record_replies(1);
        record_poll(PollResult::Ok);
        record_poll(PollResult::Error);
        record_poll(PollResult::Stale);
        record_discarded(DiscardReason::PreEpisode, 3);
        record_discarded(DiscardReason::Duplicate, 0);
        record_inbound("stored");
        set_alarm_triggered(true);
        set_recipients_active(4);
    }
}
