//! In-memory store.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{Result, Store};
use crate::event::{AcknowledgmentEvent, RecipientId};

/// Process-scoped store, one event list per sender.
///
/// Lost on restart. Shared between the webhook handler and the poll loop
/// by `Arc`, never through a global.
#[derive(Debug, Default)]
pub struct MemoryStore {
    events: DashMap<RecipientId, Vec<AcknowledgmentEvent>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.iter().map(|entry| entry.value().len()).sum()
    }

    /// Returns `true` if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn list_events_since(&self, since: DateTime<Utc>) -> Result<Vec<AcknowledgmentEvent>> {
        Ok(self
            .events
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|e| e.created_at() >= since)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect())
    }

    async fn append_event(&self, event: AcknowledgmentEvent) -> Result<()> {
        self.events
            .entry(event.recipient_id().clone())
            .or_default()
            .push(event);
        Ok(())
    }
}
