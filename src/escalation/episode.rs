//! Alarm episode identity and elapsed-time bookkeeping.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One trigger-to-reset lifecycle of the alarm.
///
/// `triggered_at` is the lower bound for events attributed to this
/// episode; `id` is what asynchronous completions are checked against
/// before they may mutate state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmEpisode {
    /// Unique episode id.
    pub id: Uuid,
    /// When the alarm was triggered.
    pub triggered_at: DateTime<Utc>,
    /// Whole ticks since trigger.
    pub elapsed_seconds: u64,
}

impl AlarmEpisode {
    /// Starts a new episode at `triggered_at` with a zero counter.
    #[must_use]
    pub fn start(triggered_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            triggered_at,
            elapsed_seconds: 0,
        }
    }

    /// Advances the elapsed counter by one tick and returns the new value.
    pub const fn tick(&mut self) -> u64 {
        self.elapsed_seconds = self.elapsed_seconds.saturating_add(1);
        self.elapsed_seconds
    }

    /// Returns `true` if an event created at `created_at` belongs here.
    #[must_use]
    pub fn admits(&self, created_at: DateTime<Utc>) -> bool {
        created_at >= self.triggered_at
    }
}
