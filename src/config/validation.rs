//! Configuration validation.
//!
//! Runs on the deserialized [`AlarmConfig`] and collects every issue
//! rather than stopping at the first one.

use std::collections::HashSet;
use std::time::Duration;

use crate::config::schema::{AlarmConfig, StoreKind, TransportKind};
use crate::error::{Severity, ValidationIssue};
use crate::event::RecipientId;

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns the result.
    pub fn validate(&mut self, config: &AlarmConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_alarm(config);
        self.validate_recipients(config);
        self.validate_timing(config);
        self.validate_transport(config);
        self.validate_store(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Sections
    // ========================================================================

    fn validate_alarm(&mut self, config: &AlarmConfig) {
        if config.alarm.message.trim().is_empty() {
            self.add_error("alarm.message", "alarm message cannot be empty");
        }
    }

    fn validate_recipients(&mut self, config: &AlarmConfig) {
        if config.recipients.is_empty() {
            self.add_error("recipients", "at least one recipient is required");
            return;
        }

        let mut seen = HashSet::new();
        for (i, recipient) in config.recipients.iter().enumerate() {
            let id = RecipientId::new(&recipient.id);
            if id.is_empty() {
                self.add_error(&format!("recipients[{i}].id"), "recipient id cannot be empty");
            } else if !seen.insert(id.clone()) {
                self.add_error(
                    &format!("recipients[{i}].id"),
                    &format!("duplicate recipient id '{id}'"),
                );
            }
            if recipient.name.trim().is_empty() {
                self.add_warning(&format!("recipients[{i}].name"), "recipient has no name");
            }
        }

        if !config.recipients.iter().any(|r| r.activation_delay == 0) {
            self.add_warning(
                "recipients",
                "no recipient has activation_delay 0; nothing is dispatched at trigger",
            );
        }
    }

    fn validate_timing(&mut self, config: &AlarmConfig) {
        let t = &config.timing;
        let fields: [(&str, Duration); 6] = [
            ("timing.tick", t.tick),
            ("timing.poll_initial_delay", t.poll_initial_delay),
            ("timing.poll_interval", t.poll_interval),
            ("timing.transient_display", t.transient_display),
            ("timing.dispatch_timeout", t.dispatch_timeout),
            ("timing.poll_timeout", t.poll_timeout),
        ];
        for (path, value) in fields {
            if value.is_zero() {
                self.add_error(path, "duration must be greater than zero");
            }
        }

        if t.poll_timeout > t.poll_interval {
            self.add_warning(
                "timing.poll_timeout",
                "poll_timeout exceeds poll_interval; slow polls will delay the next cycle",
            );
        }
    }

    fn validate_transport(&mut self, config: &AlarmConfig) {
        if config.transport.kind != TransportKind::Twilio {
            return;
        }
        let transport = &config.transport;
        for (path, value) in [
            ("transport.account_sid", &transport.account_sid),
            ("transport.auth_token", &transport.auth_token),
            ("transport.from", &transport.from),
        ] {
            if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                self.add_error(path, "required for the twilio transport");
            }
        }
    }

    fn validate_store(&mut self, config: &AlarmConfig) {
        if config.store.kind == StoreKind::File && config.store.path.is_none() {
            self.add_error("store.path", "required for the file store");
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}
