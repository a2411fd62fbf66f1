//! Read-only view of controller state for observers.

use serde::Serialize;

use crate::event::RecipientId;

use super::episode::AlarmEpisode;
use super::registry::Recipient;
use super::transient::TransientMessage;

/// Alarm lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmState {
    /// No episode running.
    #[default]
    Idle,
    /// An episode is running.
    Triggered,
}

/// Point-in-time copy of everything an observer may render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmSnapshot {
    /// Lifecycle state.
    pub state: AlarmState,
    /// Current episode, absent while idle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<AlarmEpisode>,
    /// Recipients in registry order.
    pub recipients: Vec<Recipient>,
    /// The transient message currently on display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transient: Option<TransientMessage>,
    /// Triggered, with at least one active recipient and every active
    /// recipient acknowledged.
    pub all_acknowledged: bool,
}

impl AlarmSnapshot {
    /// Returns `true` while an episode is running.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.state == AlarmState::Triggered
    }

    /// Elapsed seconds of the current episode, 0 when idle.
    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        self.episode.as_ref().map_or(0, |e| e.elapsed_seconds)
    }

    /// Looks up a recipient by id.
    #[must_use]
    pub fn recipient(&self, id: &RecipientId) -> Option<&Recipient> {
        self.recipients.iter().find(|r| &r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_snapshot_serializes_without_episode() {
        let snapshot = AlarmSnapshot::default();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "IDLE");
        assert!(json.get("episode").is_none());
        assert_eq!(json["allAcknowledged"], false);
        assert_eq!(snapshot.elapsed_seconds(), 0);
    }
}
