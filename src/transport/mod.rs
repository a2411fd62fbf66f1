//! Outbound alert transport.
//!
//! Provides the [`Transport`] trait for delivering one alert message to one
//! recipient address. The escalation controller owns retries (none) and
//! timeouts; implementations only perform a single send.

pub mod log;
pub mod twilio;

pub use log::LogTransport;
pub use twilio::{TwilioConfig, TwilioTransport};

use std::fmt;

use crate::error::TransportError;
use crate::event::RecipientId;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Provider acknowledgment of an accepted alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    /// Provider-specific diagnostic, usually the message id.
    pub diagnostic: String,
}

/// Async transport trait for sending alert messages.
///
/// Implementations are shared across the controller's spawned dispatch
/// tasks, so they must be `Send + Sync` and take `&self`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Sends `body` to `address`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the provider rejects the request or
    /// cannot be reached.
    async fn send(&self, address: &RecipientId, body: &str) -> Result<DispatchReceipt>;

    /// Returns the type of this transport for logging and metrics.
    fn transport_type(&self) -> TransportType;
}

/// Transport type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// Twilio Programmable Messaging.
    Twilio,
    /// Dry-run transport that only logs.
    Log,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Twilio => write!(f, "twilio"),
            Self::Log => write!(f, "log"),
        }
    }
}
