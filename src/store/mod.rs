//! Acknowledgment store.
//!
//! The webhook receiver appends validated events; the escalation poll loop
//! reads them back with a `created_at >= since` filter. Stores make no
//! ordering promise, the reconciler does not need one.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::event::{AcknowledgmentEvent, RecipientId};

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable (or process-scoped) acknowledgment event storage.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Returns every event with `created_at >= since`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backing storage cannot be read.
    async fn list_events_since(&self, since: DateTime<Utc>) -> Result<Vec<AcknowledgmentEvent>>;

    /// Appends one event.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the event cannot be persisted.
    async fn append_event(&self, event: AcknowledgmentEvent) -> Result<()>;

    /// Latest event per sender, ordered by sender address.
    ///
    /// Latest means greatest `created_at`; ties keep the later-listed event.
    ///
    /// # Errors
    ///
    /// Propagates read failures from [`list_events_since`](Self::list_events_since).
    async fn latest_by_recipient(&self) -> Result<Vec<AcknowledgmentEvent>> {
        let events = self.list_events_since(DateTime::<Utc>::MIN_UTC).await?;
        Ok(latest_per_recipient(events))
    }
}

/// Reduces events to the latest one per sender, sorted by sender.
#[must_use]
pub fn latest_per_recipient(
    events: impl IntoIterator<Item = AcknowledgmentEvent>,
) -> Vec<AcknowledgmentEvent> {
    let mut latest: HashMap<RecipientId, AcknowledgmentEvent> = HashMap::new();
    for event in events {
        match latest.get(event.recipient_id()) {
            Some(current) if current.created_at() > event.created_at() => {}
            _ => {
                latest.insert(event.recipient_id().clone(), event);
            }
        }
    }
    let mut out: Vec<_> = latest.into_values().collect();
    out.sort_by(|a, b| a.recipient_id().cmp(b.recipient_id()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn latest_keeps_greatest_created_at() {
        let events = vec![
            AcknowledgmentEvent::new("B", "no", at(5)).unwrap(),
            AcknowledgmentEvent::new("A", "yes", at(3)).unwrap(),
            AcknowledgmentEvent::new("A", "maybe", at(1)).unwrap(),
        ];
        let latest = latest_per_recipient(events);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].recipient_id().as_str(), "A");
        assert_eq!(latest[0].raw_text(), "yes");
        assert_eq!(latest[1].raw_text(), "no");
    }
}
