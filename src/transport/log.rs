//! Dry-run transport.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use super::{DispatchReceipt, Result, Transport, TransportType};
use crate::event::RecipientId;

/// Transport that logs each alert instead of sending it.
///
/// Always succeeds, returning a synthetic `dry-run-<n>` diagnostic.
#[derive(Debug, Default)]
pub struct LogTransport {
    sent: AtomicU64,
}

impl LogTransport {
    /// Creates a new dry-run transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of alerts "sent" so far.
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Transport for LogTransport {
    async fn send(&self, address: &RecipientId, body: &str) -> Result<DispatchReceipt> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        info!(recipient = %address, body, "dry-run: alert not sent");
        Ok(DispatchReceipt {
            diagnostic: format!("dry-run-{n}"),
        })
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_transport_always_succeeds() {
        let transport = LogTransport::new();
        let receipt = transport
            .send(&RecipientId::new("+1555"), "alarm")
            .await
            .unwrap();
        assert_eq!(receipt.diagnostic, "dry-run-1");
        assert_eq!(transport.sent(), 1);
        assert_eq!(transport.transport_type(), TransportType::Log);
    }
}
