//! Episode-scoped event deduplication.

use std::collections::HashSet;

use crate::event::EventId;

/// Tracks which event ids have been reconciled in the current episode.
///
/// Cleared on trigger and reset, so a reply replayed in a new episode is
/// treated as new.
#[derive(Debug, Clone, Default)]
pub struct EventDeduplicator {
    seen: HashSet<EventId>,
}

impl EventDeduplicator {
    /// Creates an empty deduplicator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `id` has already been processed.
    #[must_use]
    pub fn seen(&self, id: &EventId) -> bool {
        self.seen.contains(id)
    }

    /// Records `id` as processed. Returns `true` if it was new.
    pub fn mark_seen(&mut self, id: &EventId) -> bool {
        self.seen.insert(id.clone())
    }

    /// Forgets every id.
    pub fn clear(&mut self) {
        self.seen.clear();
    }

    /// Number of ids tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` when nothing has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RecipientId;
    use chrono::Utc;

    fn id(text: &str) -> EventId {
        EventId::derive(&RecipientId::new("+1"), Utc::now(), text)
    }

    #[test]
    fn mark_then_seen() {
        let mut dedup = EventDeduplicator::new();
        let ev = id("yes");
        assert!(!dedup.seen(&ev));
        assert!(dedup.mark_seen(&ev));
        assert!(dedup.seen(&ev));
        assert!(!dedup.mark_seen(&ev));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut dedup = EventDeduplicator::new();
        dedup.mark_seen(&id("a"));
        dedup.mark_seen(&id("b"));
        dedup.clear();
        assert!(dedup.is_empty());
    }
}
