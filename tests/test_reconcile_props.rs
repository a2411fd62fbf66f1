//! Property tests for acknowledgment reconciliation.

use std::collections::BTreeSet;

use ackline::escalation::{
    AcknowledgmentReconciler, AcknowledgmentState, EventDeduplicator, Recipient,
    RecipientRegistry, RecipientSpec,
};
use ackline::event::{AcknowledgmentEvent, RecipientId};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

const SENDERS: [&str; 4] = ["+1", "+2", "+3", "+9"];
const REPLIES: [&str; 5] = ["YES", " yes ", "no", "later", ""];

fn registry() -> RecipientRegistry {
    RecipientRegistry::new(SENDERS[..3].iter().map(|id| RecipientSpec {
        id: RecipientId::new(id),
        name: (*id).to_string(),
        activation_delay_secs: 0,
    }))
}

fn earliest_acknowledgments(events: &[AcknowledgmentEvent]) -> Vec<Option<chrono::DateTime<Utc>>> {
    SENDERS[..3]
        .iter()
        .map(|id| {
            events
                .iter()
                .filter(|e| e.is_acknowledgment() && e.recipient_id().as_str() == *id)
                .map(AcknowledgmentEvent::created_at)
                .min()
        })
        .collect()
}

fn event_strategy() -> impl Strategy<Value = AcknowledgmentEvent> {
    (0..SENDERS.len(), 0..REPLIES.len(), 0i64..30).prop_map(|(s, r, secs)| {
        let at = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        AcknowledgmentEvent::new(SENDERS[s], REPLIES[r], at).unwrap()
    })
}

fn states(registry: &RecipientRegistry) -> Vec<Recipient> {
    registry.list().to_vec()
}

proptest! {
    #[test]
    fn reconcile_is_order_independent(
        (events, shuffled) in prop::collection::vec(event_strategy(), 0..24)
            .prop_flat_map(|events| {
                let shuffled = Just(events.clone()).prop_shuffle();
                (Just(events), shuffled)
            })
    ) {
        let mut reg_a = registry();
        let mut dedup_a = EventDeduplicator::new();
        let out_a = AcknowledgmentReconciler::new(&mut reg_a, &mut dedup_a).reconcile(&events);

        let mut reg_b = registry();
        let mut dedup_b = EventDeduplicator::new();
        let out_b = AcknowledgmentReconciler::new(&mut reg_b, &mut dedup_b).reconcile(&shuffled);

        prop_assert_eq!(states(&reg_a), states(&reg_b));
        let acknowledged_at: Vec<_> = reg_a.list().iter().map(|r| r.acknowledged_at).collect();
        prop_assert_eq!(acknowledged_at, earliest_acknowledgments(&events));
        prop_assert_eq!(&out_a.acknowledged, &out_b.acknowledged);

        let transient_a: BTreeSet<_> = out_a.transient.iter().map(|t| t.id.clone()).collect();
        let transient_b: BTreeSet<_> = out_b.transient.iter().map(|t| t.id.clone()).collect();
        prop_assert_eq!(transient_a, transient_b);
    }

    #[test]
    fn reconcile_is_idempotent(events in prop::collection::vec(event_strategy(), 0..24)) {
        let mut registry = registry();
        let mut dedup = EventDeduplicator::new();

        let first = AcknowledgmentReconciler::new(&mut registry, &mut dedup).reconcile(&events);
        let after_first = states(&registry);
        let second = AcknowledgmentReconciler::new(&mut registry, &mut dedup).reconcile(&events);

        prop_assert!(second.is_empty());
        prop_assert_eq!(second.duplicates, events.len());
        prop_assert_eq!(states(&registry), after_first);
        prop_assert!(first.acknowledged.iter().all(|id| SENDERS[..3].contains(&id.as_str())));
    }

    #[test]
    fn acknowledgment_is_monotonic(
        events in prop::collection::vec(event_strategy(), 1..24),
        split in 0usize..24,
    ) {
        let split = split.min(events.len());
        let mut registry = registry();
        let mut dedup = EventDeduplicator::new();

        AcknowledgmentReconciler::new(&mut registry, &mut dedup).reconcile(&events[..split]);
        let before = states(&registry);
        AcknowledgmentReconciler::new(&mut registry, &mut dedup).reconcile(&events[split..]);
        let after = states(&registry);

        for (b, a) in before.iter().zip(&after) {
            if b.acknowledgment_state == AcknowledgmentState::Acknowledged {
                prop_assert_eq!(a.acknowledgment_state, AcknowledgmentState::Acknowledged);
                prop_assert!(a.acknowledged_at <= b.acknowledged_at);
            }
        }
    }
}
