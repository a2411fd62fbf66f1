//! Reconciles batches of acknowledgment events into recipient state.
//!
//! The reconciler is order-independent: deduplication makes a batch and
//! any permutation of it converge to the same registry state.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::event::{AcknowledgmentEvent, RecipientId};

use super::dedup::EventDeduplicator;
use super::registry::RecipientRegistry;
use super::transient::TransientMessage;

/// Result of reconciling one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Recipients that moved to acknowledged during this call.
    pub acknowledged: BTreeSet<RecipientId>,
    /// Non-acknowledgment replies seen for the first time, in batch order.
    pub transient: Vec<TransientMessage>,
    /// Events skipped because their id was already processed.
    pub duplicates: usize,
    /// Replies from ids absent from the registry.
    pub unknown_recipients: usize,
}

impl ReconcileOutcome {
    /// Returns `true` if the batch changed nothing observable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.acknowledged.is_empty() && self.transient.is_empty()
    }
}

/// Applies events to a registry, consulting a deduplicator.
#[derive(Debug)]
pub struct AcknowledgmentReconciler<'a> {
    registry: &'a mut RecipientRegistry,
    dedup: &'a mut EventDeduplicator,
}

impl<'a> AcknowledgmentReconciler<'a> {
    /// Borrows the registry and deduplicator for one reconciliation.
    pub const fn new(registry: &'a mut RecipientRegistry, dedup: &'a mut EventDeduplicator) -> Self {
        Self { registry, dedup }
    }

    /// Reconciles `events`.
    ///
    /// Each event id is processed at most once. Acknowledgments mark their
    /// recipient acknowledged (idempotently); any other reply becomes a
    /// transient message. Replies from unknown recipients only cost a dedup
    /// entry.
    pub fn reconcile<'e>(
        &mut self,
        events: impl IntoIterator<Item = &'e AcknowledgmentEvent>,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        for event in events {
            if !self.dedup.mark_seen(event.event_id()) {
                trace!(event = %event.event_id(), "duplicate event skipped");
                outcome.duplicates += 1;
                continue;
            }

            let recipient = event.recipient_id();
            if !self.registry.contains(recipient) {
                debug!(%recipient, "reply from unregistered sender ignored");
                outcome.unknown_recipients += 1;
                continue;
            }

            if event.is_acknowledgment() {
                if self.registry.set_acknowledged(recipient, event.created_at()) {
                    outcome.acknowledged.insert(recipient.clone());
                }
            } else {
                outcome.transient.push(TransientMessage {
                    id: event.event_id().clone(),
                    text: event.raw_text().to_string(),
                    recipient_id: recipient.clone(),
                });
            }
        }

        outcome
    }
}
