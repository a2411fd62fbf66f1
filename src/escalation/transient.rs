//! Transient display queue for non-acknowledgment replies.
//!
//! Messages expire after a fixed display window. Expiry is evaluated
//! against deadlines on every read and on every controller tick instead of
//! arming one timer per message.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::event::{EventId, RecipientId};

/// A short-lived display of a reply that was not an acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransientMessage {
    /// Source event id.
    pub id: EventId,
    /// Raw reply text.
    pub text: String,
    /// Sender.
    pub recipient_id: RecipientId,
}

#[derive(Debug, Clone)]
struct Pending {
    message: TransientMessage,
    expires_at: Instant,
}

/// FIFO of pending transient messages with per-message expiry.
#[derive(Debug, Clone)]
pub struct TransientQueue {
    display_window: Duration,
    pending: VecDeque<Pending>,
}

impl TransientQueue {
    /// Creates a queue whose messages live for `display_window`.
    #[must_use]
    pub const fn new(display_window: Duration) -> Self {
        Self {
            display_window,
            pending: VecDeque::new(),
        }
    }

    /// Enqueues a message expiring one display window after `now`.
    pub fn push(&mut self, message: TransientMessage, now: Instant) {
        if self.pending.iter().any(|p| p.message.id == message.id) {
            return;
        }
        self.pending.push_back(Pending {
            message,
            expires_at: now + self.display_window,
        });
    }

    /// Drops expired messages. Returns how many were removed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| p.expires_at > now);
        before - self.pending.len()
    }

    /// Oldest unexpired message: the single slot shown to a viewer.
    #[must_use]
    pub fn current(&self, now: Instant) -> Option<&TransientMessage> {
        self.pending
            .iter()
            .find(|p| p.expires_at > now)
            .map(|p| &p.message)
    }

    /// Number of messages pending, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes every message.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(text: &str) -> TransientMessage {
        let recipient_id = RecipientId::new("+1");
        TransientMessage {
            id: EventId::derive(&recipient_id, Utc::now(), text),
            text: text.to_string(),
            recipient_id,
        }
    }

    #[test]
    fn current_is_oldest_first() {
        let now = Instant::now();
        let mut queue = TransientQueue::new(Duration::from_secs(4));
        queue.push(message("no"), now);
        queue.push(message("maybe"), now + Duration::from_secs(1));
        assert_eq!(queue.current(now).unwrap().text, "no");
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn messages_expire_after_display_window() {
        let now = Instant::now();
        let mut queue = TransientQueue::new(Duration::from_secs(4));
        queue.push(message("no"), now);
        queue.push(message("maybe"), now + Duration::from_secs(2));

        let later = now + Duration::from_secs(4);
        assert_eq!(queue.current(later).unwrap().text, "maybe");
        assert_eq!(queue.purge_expired(later), 1);
        assert_eq!(queue.purge_expired(now + Duration::from_secs(6)), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn duplicate_ids_are_not_queued_twice() {
        let now = Instant::now();
        let mut queue = TransientQueue::new(Duration::from_secs(4));
        let msg = message("no");
        queue.push(msg.clone(), now);
        queue.push(msg, now);
        assert_eq!(queue.len(), 1);
    }
}
