//! Configuration schema types.
//!
//! These types are deserialized from the YAML alarm configuration file.
//! Durations are humantime strings (`1s`, `500ms`, `2m`).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::escalation::{ControllerOptions, EscalationTiming, RecipientSpec};
use crate::event::RecipientId;

/// Default alert body.
pub const DEFAULT_ALARM_MESSAGE: &str =
    "Alarm Triggered. Reply 'YES' to acknowledge you have read this message.";

/// Default TwiML reply to inbound SMS.
pub const DEFAULT_REPLY_MESSAGE: &str = "Thank you for your response.";

/// Default HTTP bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

// ============================================================================
// Root
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlarmConfig {
    /// Alert content and escalation policy.
    #[serde(default)]
    pub alarm: AlarmSection,

    /// Cadences and timeouts.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Recipients in display order.
    #[serde(default)]
    pub recipients: Vec<RecipientConfig>,

    /// Outbound SMS provider.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Acknowledgment store backend.
    #[serde(default)]
    pub store: StoreConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerSection,
}

impl AlarmConfig {
    /// Builds controller options from this configuration.
    #[must_use]
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            recipients: self.recipients.iter().map(RecipientConfig::to_spec).collect(),
            message: self.alarm.message.clone(),
            timing: self.timing.into(),
            dispatch_delayed_tiers: self.alarm.dispatch_delayed_tiers,
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// `alarm:` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlarmSection {
    /// Alert body sent to every recipient.
    #[serde(default = "default_alarm_message")]
    pub message: String,

    /// Message delayed tiers when they activate.
    #[serde(default = "default_true")]
    pub dispatch_delayed_tiers: bool,
}

impl Default for AlarmSection {
    fn default() -> Self {
        Self {
            message: default_alarm_message(),
            dispatch_delayed_tiers: true,
        }
    }
}

/// `timing:` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TimingConfig {
    /// Elapsed-counter resolution.
    #[serde(deserialize_with = "deserialize_duration")]
    pub tick: Duration,
    /// Delay before the first poll.
    #[serde(deserialize_with = "deserialize_duration")]
    pub poll_initial_delay: Duration,
    /// Interval between polls.
    #[serde(deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,
    /// Transient message display window.
    #[serde(deserialize_with = "deserialize_duration")]
    pub transient_display: Duration,
    /// Upper bound for one alert send.
    #[serde(deserialize_with = "deserialize_duration")]
    pub dispatch_timeout: Duration,
    /// Upper bound for one store read.
    #[serde(deserialize_with = "deserialize_duration")]
    pub poll_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let t = EscalationTiming::default();
        Self {
            tick: t.tick,
            poll_initial_delay: t.poll_initial_delay,
            poll_interval: t.poll_interval,
            transient_display: t.transient_display,
            dispatch_timeout: t.dispatch_timeout,
            poll_timeout: t.poll_timeout,
        }
    }
}

impl From<TimingConfig> for EscalationTiming {
    fn from(t: TimingConfig) -> Self {
        Self {
            tick: t.tick,
            poll_initial_delay: t.poll_initial_delay,
            poll_interval: t.poll_interval,
            transient_display: t.transient_display,
            dispatch_timeout: t.dispatch_timeout,
            poll_timeout: t.poll_timeout,
        }
    }
}

/// One `recipients:` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipientConfig {
    /// Contact address (whitespace is ignored).
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Seconds after trigger before this recipient is activated.
    #[serde(default)]
    pub activation_delay: u64,
}

impl RecipientConfig {
    /// Converts to the registry's static recipient form.
    #[must_use]
    pub fn to_spec(&self) -> RecipientSpec {
        RecipientSpec {
            id: RecipientId::new(&self.id),
            name: self.name.clone(),
            activation_delay_secs: self.activation_delay,
        }
    }
}

/// Outbound transport kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Twilio REST API.
    #[default]
    Twilio,
    /// Log only.
    Log,
}

/// `transport:` section.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Provider.
    #[serde(default)]
    pub kind: TransportKind,
    /// Twilio account SID.
    #[serde(default)]
    pub account_sid: Option<String>,
    /// Twilio auth token.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Sending number.
    #[serde(default)]
    pub from: Option<String>,
    /// API origin override.
    #[serde(default)]
    pub api_base: Option<String>,
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("kind", &self.kind)
            .field("account_sid", &self.account_sid)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Store backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Process memory.
    #[default]
    Memory,
    /// JSONL file.
    File,
}

/// `store:` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Backend.
    #[serde(default)]
    pub kind: StoreKind,
    /// File path for the `file` backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// `server:` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Listen address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// TwiML reply text.
    #[serde(default = "default_reply_message")]
    pub reply_message: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            reply_message: default_reply_message(),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn default_alarm_message() -> String {
    DEFAULT_ALARM_MESSAGE.to_string()
}

fn default_reply_message() -> String {
    DEFAULT_REPLY_MESSAGE.to_string()
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

const fn default_true() -> bool {
    true
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let yaml = r#"
recipients:
  - id: "+1 555 0100"
    name: Supervisor
"#;
        let config: AlarmConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.alarm.message, DEFAULT_ALARM_MESSAGE);
        assert!(config.alarm.dispatch_delayed_tiers);
        assert_eq!(config.timing, TimingConfig::default());
        assert_eq!(config.transport.kind, TransportKind::Twilio);
        assert_eq!(config.store.kind, StoreKind::Memory);
        assert_eq!(config.server.bind, DEFAULT_BIND);

        let options = config.controller_options();
        assert_eq!(options.recipients[0].id.as_str(), "+15550100");
        assert_eq!(options.recipients[0].activation_delay_secs, 0);
    }

    #[test]
    fn test_humantime_durations() {
        let yaml = "tick: 500ms\npoll_interval: 2m\n";
        let timing: TimingConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(timing.tick, Duration::from_millis(500));
        assert_eq!(timing.poll_interval, Duration::from_secs(120));
        assert_eq!(timing.poll_initial_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let result = serde_yaml::from_str::<TimingConfig>("tick: soon\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result = serde_yaml::from_str::<AlarmConfig>("alarm:\n  mesage: typo\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_transport_debug_redacts_token() {
        let config = TransportConfig {
            auth_token: Some("hunter2".to_string()),
            ..TransportConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
