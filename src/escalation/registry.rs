//! Recipient registry.
//!
//! Holds the configured recipients in insertion order along with the
//! per-episode state the controller and reconciler mutate.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::EscalationError;
use crate::event::RecipientId;

/// Acknowledgment state of a recipient within the current episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcknowledgmentState {
    /// No acknowledgment observed yet.
    #[default]
    Waiting,
    /// At least one acknowledgment observed this episode.
    Acknowledged,
}

/// Outcome of the most recent alert dispatch to a recipient.
///
/// Informational only: a failed dispatch leaves the recipient active and
/// waiting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DispatchStatus {
    /// Nothing sent this episode.
    #[default]
    NotSent,
    /// Provider accepted the alert.
    Sent {
        /// Provider diagnostic (message id).
        diagnostic: String,
    },
    /// Dispatch failed.
    Failed {
        /// Failure description.
        diagnostic: String,
    },
}

/// Static recipient configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientSpec {
    /// Contact address.
    pub id: RecipientId,
    /// Display name.
    pub name: String,
    /// Seconds after trigger at which this recipient becomes active.
    pub activation_delay_secs: u64,
}

/// A configured alert target plus its episode state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    /// Contact address; the identity used for event correlation.
    pub id: RecipientId,
    /// Display name.
    pub name: String,
    /// Activation tier in seconds.
    pub activation_delay_seconds: u64,
    /// Whether the recipient's tier has been reached this episode.
    pub is_active: bool,
    /// Acknowledgment state.
    pub acknowledgment_state: AcknowledgmentState,
    /// When the first acknowledgment was observed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Latest dispatch outcome.
    pub dispatch: DispatchStatus,
}

impl Recipient {
    fn from_spec(spec: RecipientSpec) -> Self {
        Self {
            id: spec.id,
            name: spec.name,
            activation_delay_seconds: spec.activation_delay_secs,
            is_active: false,
            acknowledgment_state: AcknowledgmentState::Waiting,
            acknowledged_at: None,
            dispatch: DispatchStatus::NotSent,
        }
    }

    /// Returns `true` once acknowledged.
    #[must_use]
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledgment_state == AcknowledgmentState::Acknowledged
    }

    fn reset(&mut self) {
        self.is_active = false;
        self.acknowledgment_state = AcknowledgmentState::Waiting;
        self.acknowledged_at = None;
        self.dispatch = DispatchStatus::NotSent;
    }
}

/// Ordered recipient collection keyed by contact address.
#[derive(Debug, Clone, Default)]
pub struct RecipientRegistry {
    recipients: Vec<Recipient>,
}

impl RecipientRegistry {
    /// Builds a registry. Later duplicates of an id are dropped.
    #[must_use]
    pub fn new(specs: impl IntoIterator<Item = RecipientSpec>) -> Self {
        let mut seen = HashSet::new();
        let recipients = specs
            .into_iter()
            .filter(|spec| seen.insert(spec.id.clone()))
            .map(Recipient::from_spec)
            .collect();
        Self { recipients }
    }

    /// Recipients in insertion order.
    #[must_use]
    pub fn list(&self) -> &[Recipient] {
        &self.recipients
    }

    /// Looks up a recipient by id.
    #[must_use]
    pub fn get(&self, id: &RecipientId) -> Option<&Recipient> {
        self.recipients.iter().find(|r| &r.id == id)
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &RecipientId) -> bool {
        self.get(id).is_some()
    }

    fn get_mut(&mut self, id: &RecipientId) -> Option<&mut Recipient> {
        self.recipients.iter_mut().find(|r| &r.id == id)
    }

    /// Activates the given recipients.
    ///
    /// Only ever moves `is_active` from `false` to `true`. Returns the ids
    /// that were newly activated, in registry order.
    ///
    /// # Errors
    ///
    /// Returns [`EscalationError::UnknownRecipient`] without mutating
    /// anything if any id is not registered.
    pub fn activate(
        &mut self,
        ids: &HashSet<RecipientId>,
    ) -> Result<Vec<RecipientId>, EscalationError> {
        if let Some(unknown) = ids.iter().find(|id| !self.contains(id)) {
            return Err(EscalationError::UnknownRecipient(unknown.to_string()));
        }

        let mut activated = Vec::new();
        for recipient in &mut self.recipients {
            if ids.contains(&recipient.id) && !recipient.is_active {
                recipient.is_active = true;
                activated.push(recipient.id.clone());
            }
        }
        Ok(activated)
    }

    /// Ids whose tier is reached at `elapsed_secs` but are not yet active.
    #[must_use]
    pub fn eligible(&self, elapsed_secs: u64) -> HashSet<RecipientId> {
        self.recipients
            .iter()
            .filter(|r| !r.is_active && r.activation_delay_seconds <= elapsed_secs)
            .map(|r| r.id.clone())
            .collect()
    }

    /// Marks a recipient acknowledged.
    ///
    /// Returns `true` only on the `Waiting -> Acknowledged` transition.
    /// Repeated calls only pull `acknowledged_at` back to the earliest
    /// time seen, so the result does not depend on call order. Unknown ids
    /// are no-ops.
    pub fn set_acknowledged(&mut self, id: &RecipientId, at: DateTime<Utc>) -> bool {
        let Some(r) = self.get_mut(id) else {
            return false;
        };
        if r.is_acknowledged() {
            r.acknowledged_at = r.acknowledged_at.map(|prev| prev.min(at)).or(Some(at));
            return false;
        }
        r.acknowledgment_state = AcknowledgmentState::Acknowledged;
        r.acknowledged_at = Some(at);
        true
    }

    /// Records a dispatch outcome. Unknown ids are ignored.
    pub fn set_dispatch(&mut self, id: &RecipientId, status: DispatchStatus) {
        if let Some(r) = self.get_mut(id) {
            r.dispatch = status;
        }
    }

    /// Returns every recipient to inactive and waiting.
    pub fn reset_all(&mut self) {
        for recipient in &mut self.recipients {
            recipient.reset();
        }
    }

    /// Number of active recipients.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.recipients.iter().filter(|r| r.is_active).count()
    }

    /// `true` iff at least one recipient is active and all active ones
    /// have acknowledged.
    #[must_use]
    pub fn all_active_acknowledged(&self) -> bool {
        let mut active = self.recipients.iter().filter(|r| r.is_active).peekable();
        active.peek().is_some() && active.all(Recipient::is_acknowledged)
    }
}
