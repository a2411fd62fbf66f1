//! Error types for `ackline`
//!
//! One enum per failure domain, aggregated into [`AcklineError`] for the
//! CLI. Only configuration errors are fatal to the escalation controller;
//! transport, store and malformed-event errors are absorbed at the point of
//! the asynchronous call, logged, and converted into per-recipient outcomes
//! or skipped poll cycles.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `ackline` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure, missing credentials)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, bind failure)
    pub const IO_ERROR: i32 = 3;

    /// Outbound transport error
    pub const TRANSPORT_ERROR: i32 = 4;

    /// Acknowledgment store error
    pub const STORE_ERROR: i32 = 5;

    /// Escalation state machine error
    pub const ESCALATION_ERROR: i32 = 6;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `ackline` operations.
#[derive(Debug, Error)]
pub enum AcklineError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Outbound transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Acknowledgment store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Escalation state machine error
    #[error(transparent)]
    Escalation(#[from] EscalationError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AcklineError {
    /// Returns the process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) => ExitCode::CONFIG_ERROR,
            Self::Transport(_) => ExitCode::TRANSPORT_ERROR,
            Self::Store(_) => ExitCode::STORE_ERROR,
            Self::Escalation(_) => ExitCode::ESCALATION_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", summarize(errors))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set ({location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Message supplied with the `${VAR:?message}` reference
        location: String,
    },

    /// Transport credentials are missing; the controller must never start.
    #[error("missing transport credential '{field}'")]
    MissingCredentials {
        /// Name of the missing credential field
        field: &'static str,
    },
}

fn summarize(errors: &[ValidationIssue]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "recipients[2].id")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the configuration from being used
    Error,
    /// Reported but does not prevent loading
    Warning,
}

// ============================================================================
// Transport Errors
// ============================================================================

/// Failure to dispatch one alert to one recipient.
///
/// Always scoped to a single send; never fatal to the episode.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network or client-level failure
    #[error("request failed: {0}")]
    Http(String),

    /// Provider answered with a non-success status
    #[error("provider returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// The send did not complete within the dispatch timeout
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The provider accepted the request but the response could not be read
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// Store Errors
// ============================================================================

/// Acknowledgment store read/append failures.
///
/// A failed read skips one poll cycle; the next scheduled poll retries.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized
    #[error("store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The read did not complete within the poll timeout
    #[error("store read timed out after {0:?}")]
    Timeout(std::time::Duration),
}

// ============================================================================
// Event Errors
// ============================================================================

/// An inbound acknowledgment record that cannot be attributed to anyone.
///
/// Rejected at the ingestion boundary; inside a batch only the offending
/// record is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEventError {
    /// Sender address missing or blank
    #[error("malformed event: missing recipient id")]
    MissingRecipient,

    /// Reply text missing
    #[error("malformed event: missing text")]
    MissingText,
}

// ============================================================================
// Escalation Errors
// ============================================================================

/// Escalation state machine errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscalationError {
    /// `trigger()` called while an episode is already running
    #[error("alarm is already triggered")]
    AlreadyTriggered,

    /// Operation requires a running episode
    #[error("alarm is not triggered")]
    NotTriggered,

    /// Operation named a recipient absent from the registry
    #[error("unknown recipient: {0}")]
    UnknownRecipient(String),

    /// A poll or dispatch result arrived for an episode that has ended.
    ///
    /// Expected under concurrent cancellation; callers discard it quietly.
    #[error("result belongs to stale episode {0}")]
    StaleEpisode(uuid::Uuid),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `ackline` operations.
pub type Result<T> = std::result::Result<T, AcklineError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::SUCCESS, 0);
        assert_eq!(ExitCode::ERROR, 1);
        assert_eq!(ExitCode::CONFIG_ERROR, 2);
        assert_eq!(ExitCode::IO_ERROR, 3);
        assert_eq!(ExitCode::TRANSPORT_ERROR, 4);
        assert_eq!(ExitCode::STORE_ERROR, 5);
        assert_eq!(ExitCode::ESCALATION_ERROR, 6);
        assert_eq!(ExitCode::USAGE_ERROR, 64);
        assert_eq!(ExitCode::INTERRUPTED, 130);
        assert_eq!(ExitCode::TERMINATED, 143);
    }

    #[test]
    fn test_exit_code_mapping() {
        let cases: Vec<(AcklineError, i32)> = vec![
            (
                ConfigError::MissingFile {
                    path: PathBuf::from("/x"),
                }
                .into(),
                ExitCode::CONFIG_ERROR,
            ),
            (
                ConfigError::MissingCredentials {
                    field: "auth_token",
                }
                .into(),
                ExitCode::CONFIG_ERROR,
            ),
            (
                TransportError::Http("x".into()).into(),
                ExitCode::TRANSPORT_ERROR,
            ),
            (
                StoreError::Timeout(std::time::Duration::from_secs(5)).into(),
                ExitCode::STORE_ERROR,
            ),
            (
                EscalationError::AlreadyTriggered.into(),
                ExitCode::ESCALATION_ERROR,
            ),
            (
                std::io::Error::new(std::io::ErrorKind::NotFound, "x").into(),
                ExitCode::IO_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.exit_code(), expected, "Wrong exit code for {err}");
        }
    }

    #[test]
    fn test_validation_issue_display() {
        let issue = ValidationIssue {
            path: "recipients[0].id".to_string(),
            message: "duplicate recipient id".to_string(),
            severity: Severity::Error,
        };
        assert_eq!(
            issue.to_string(),
            "error: duplicate recipient id at recipients[0].id"
        );
    }

    #[test]
    fn test_validation_error_lists_issues() {
        let err = ConfigError::ValidationError {
            path: "alarm.yaml".to_string(),
            errors: vec![ValidationIssue {
                path: "recipients".to_string(),
                message: "at least one recipient is required".to_string(),
                severity: Severity::Error,
            }],
        };
        let text = err.to_string();
        assert!(text.contains("alarm.yaml"));
        assert!(text.contains("at least one recipient is required"));
    }

    #[test]
    fn test_transport_status_display() {
        let err = TransportError::Status {
            status: 401,
            body: "Authenticate".to_string(),
        };
        assert_eq!(err.to_string(), "provider returned status 401: Authenticate");
    }
}
