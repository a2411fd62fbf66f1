//! Escalation controller.
//!
//! Owns the alarm lifecycle (idle, triggered, reset), the dispatch fan-out,
//! and two background tasks per episode: a tick task that advances the
//! elapsed counter and activates delayed tiers, and a poll task that feeds
//! store events through the reconciler.
//!
//! All mutable state lives behind one mutex that is never held across an
//! `.await`. Every asynchronous completion carries the id of the episode
//! that started it and is applied only if that episode is still current.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EscalationError, StoreError, TransportError};
use crate::event::{AcknowledgmentEvent, RecipientId};
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics::{self, DiscardReason, PollResult};
use crate::store::Store;
use crate::transport::{Transport, TransportType};

use super::dedup::EventDeduplicator;
use super::episode::AlarmEpisode;
use super::reconciler::{AcknowledgmentReconciler, ReconcileOutcome};
use super::registry::{DispatchStatus, RecipientRegistry, RecipientSpec};
use super::snapshot::{AlarmSnapshot, AlarmState};
use super::transient::TransientQueue;

// ============================================================================
// Options
// ============================================================================

/// Cadences and bounds for one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationTiming {
    /// Elapsed-counter resolution.
    pub tick: Duration,
    /// Delay before the first poll of an episode.
    pub poll_initial_delay: Duration,
    /// Interval between polls.
    pub poll_interval: Duration,
    /// How long a transient message stays on display.
    pub transient_display: Duration,
    /// Upper bound for one alert send.
    pub dispatch_timeout: Duration,
    /// Upper bound for one store read.
    pub poll_timeout: Duration,
}

impl Default for EscalationTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            poll_initial_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(3),
            transient_display: Duration::from_secs(4),
            dispatch_timeout: Duration::from_secs(10),
            poll_timeout: Duration::from_secs(5),
        }
    }
}

/// Static controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Recipients in display order.
    pub recipients: Vec<RecipientSpec>,
    /// Alert body sent to every recipient.
    pub message: String,
    /// Timing parameters.
    pub timing: EscalationTiming,
    /// Whether recipients activated by the tick task are also messaged.
    pub dispatch_delayed_tiers: bool,
}

// ============================================================================
// Dispatch report
// ============================================================================

/// Result of sending the alert to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    /// Target recipient.
    pub recipient_id: RecipientId,
    /// Whether the provider accepted the alert.
    pub success: bool,
    /// Provider id on success, error text on failure.
    pub diagnostic: String,
}

/// Per-recipient results of one dispatch fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    /// Episode the dispatch belonged to.
    pub episode_id: Uuid,
    /// One entry per target, in registry order.
    pub outcomes: Vec<DispatchOutcome>,
    /// The episode ended before the sends completed; statuses were not
    /// applied.
    pub stale: bool,
}

impl DispatchReport {
    /// Number of successful sends.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }
}

// ============================================================================
// Shared state
// ============================================================================

struct ActiveEpisode {
    episode: AlarmEpisode,
    cancel: CancellationToken,
}

struct Core {
    registry: RecipientRegistry,
    dedup: EventDeduplicator,
    transient: TransientQueue,
    active: Option<ActiveEpisode>,
}

impl Core {
    fn current(&self, episode_id: Uuid) -> Option<&AlarmEpisode> {
        self.active
            .as_ref()
            .map(|a| &a.episode)
            .filter(|e| e.id == episode_id)
    }

    fn clear_episode_state(&mut self) {
        self.registry.reset_all();
        self.dedup.clear();
        self.transient.clear();
    }

    fn snapshot(&self, now: Instant) -> AlarmSnapshot {
        let episode = self.active.as_ref().map(|a| a.episode.clone());
        AlarmSnapshot {
            state: if episode.is_some() {
                AlarmState::Triggered
            } else {
                AlarmState::Idle
            },
            all_acknowledged: episode.is_some() && self.registry.all_active_acknowledged(),
            episode,
            recipients: self.registry.list().to_vec(),
            transient: self.transient.current(now).cloned(),
        }
    }
}

struct Shared {
    core: Mutex<Core>,
    snapshot_tx: watch::Sender<AlarmSnapshot>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn Store>,
    events: Arc<EventEmitter>,
    message: String,
    timing: EscalationTiming,
    dispatch_delayed_tiers: bool,
    shutdown: CancellationToken,
}

// ============================================================================
// Controller
// ============================================================================

/// The alarm state machine.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct EscalationController {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for EscalationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationController")
            .field("transport", &self.shared.transport.transport_type())
            .field("timing", &self.shared.timing)
            .finish_non_exhaustive()
    }
}

impl EscalationController {
    /// Creates an idle controller.
    #[must_use]
    pub fn new(
        options: ControllerOptions,
        transport: Arc<dyn Transport>,
        store: Arc<dyn Store>,
        events: Arc<EventEmitter>,
    ) -> Self {
        let core = Core {
            registry: RecipientRegistry::new(options.recipients),
            dedup: EventDeduplicator::new(),
            transient: TransientQueue::new(options.timing.transient_display),
            active: None,
        };
        let (snapshot_tx, _) = watch::channel(core.snapshot(Instant::now()));

        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                snapshot_tx,
                transport,
                store,
                events,
                message: options.message,
                timing: options.timing,
                dispatch_delayed_tiers: options.dispatch_delayed_tiers,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Core> {
        self.shared.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, core: &Core) {
        self.shared.snapshot_tx.send_replace(core.snapshot(Instant::now()));
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> AlarmSnapshot {
        self.lock().snapshot(Instant::now())
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AlarmSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Returns `true` while an episode is running.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Configured timing.
    #[must_use]
    pub fn timing(&self) -> EscalationTiming {
        self.shared.timing
    }

    /// Outbound transport type.
    #[must_use]
    pub fn transport_type(&self) -> TransportType {
        self.shared.transport.transport_type()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Starts a new episode.
    ///
    /// Resets all recipient state, activates every delay-0 recipient, starts
    /// the tick and poll tasks, then sends the alert to the activated
    /// recipients concurrently and waits for every send (each bounded by
    /// the dispatch timeout).
    ///
    /// # Errors
    ///
    /// Returns [`EscalationError::AlreadyTriggered`] if an episode is
    /// running.
    pub async fn trigger(&self) -> Result<DispatchReport, EscalationError> {
        let (episode, targets, active) = {
            let mut core = self.lock();
            if core.active.is_some() {
                return Err(EscalationError::AlreadyTriggered);
            }

            core.clear_episode_state();
            let episode = AlarmEpisode::start(Utc::now());
            let eligible = core.registry.eligible(0);
            let targets = core.registry.activate(&eligible)?;

            let cancel = self.shared.shutdown.child_token();
            core.active = Some(ActiveEpisode {
                episode: episode.clone(),
                cancel: cancel.clone(),
            });
            self.spawn_tick_task(episode.id, cancel.clone());
            self.spawn_poll_task(episode.id, episode.triggered_at, cancel);
            self.publish(&core);
            (episode, targets, core.registry.active_count())
        };

        info!(episode = %episode.id, initial = targets.len(), "alarm triggered");
        self.shared.events.emit(Event::AlarmTriggered {
            timestamp: episode.triggered_at,
            episode: episode.id,
            initial_recipients: targets.len(),
        });
        metrics::set_alarm_triggered(true);
        metrics::set_recipients_active(active);

        Ok(self.dispatch(episode.id, targets).await)
    }

    /// Ends the current episode.
    ///
    /// Cancels the episode's tasks and returns every recipient to inactive
    /// and waiting. Returns `false` (and does nothing) when already idle.
    pub fn reset(&self) -> bool {
        let (episode, acknowledged) = {
            let mut core = self.lock();
            let Some(active) = core.active.take() else {
                return false;
            };
            active.cancel.cancel();
            let acknowledged = core
                .registry
                .list()
                .iter()
                .filter(|r| r.is_acknowledged())
                .count();
            core.clear_episode_state();
            self.publish(&core);
            (active.episode, acknowledged)
        };

        info!(
            episode = %episode.id,
            elapsed = episode.elapsed_seconds,
            acknowledged,
            "alarm reset"
        );
        self.shared.events.emit(Event::AlarmReset {
            timestamp: Utc::now(),
            episode: episode.id,
            elapsed_seconds: episode.elapsed_seconds,
            acknowledged,
        });
        metrics::set_alarm_triggered(false);
        metrics::set_recipients_active(0);
        true
    }

    /// Resets and stops every task this controller may still start.
    pub fn shutdown(&self) {
        self.reset();
        self.shared.shutdown.cancel();
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    async fn dispatch(&self, episode_id: Uuid, targets: Vec<RecipientId>) -> DispatchReport {
        let limit = self.shared.timing.dispatch_timeout;
        let handles = targets.iter().cloned().map(|recipient| {
            let transport = Arc::clone(&self.shared.transport);
            let body = self.shared.message.clone();
            tokio::spawn(async move {
                let started = Instant::now();
                let result = tokio::time::timeout(limit, transport.send(&recipient, &body))
                    .await
                    .unwrap_or(Err(TransportError::Timeout(limit)));
                (result, started.elapsed())
            })
        });
        let joined = join_all(handles).await;

        let mut outcomes = Vec::with_capacity(targets.len());
        let mut durations = Vec::with_capacity(targets.len());
        for (recipient_id, joined) in targets.into_iter().zip(joined) {
            let (result, elapsed) = joined.unwrap_or_else(|e| {
                (
                    Err(TransportError::Http(format!("dispatch task failed: {e}"))),
                    Duration::ZERO,
                )
            });
            let (success, diagnostic) = match result {
                Ok(receipt) => (true, receipt.diagnostic),
                Err(e) => (false, e.to_string()),
            };
            durations.push(elapsed);
            outcomes.push(DispatchOutcome {
                recipient_id,
                success,
                diagnostic,
            });
        }

        let stale = {
            let mut core = self.lock();
            if core.current(episode_id).is_some() {
                for outcome in &outcomes {
                    let status = if outcome.success {
                        DispatchStatus::Sent {
                            diagnostic: outcome.diagnostic.clone(),
                        }
                    } else {
                        DispatchStatus::Failed {
                            diagnostic: outcome.diagnostic.clone(),
                        }
                    };
                    core.registry.set_dispatch(&outcome.recipient_id, status);
                }
                self.publish(&core);
                false
            } else {
                true
            }
        };

        if stale {
            debug!(episode = %episode_id, "dispatch results arrived after reset, not applied");
        }

        for (outcome, elapsed) in outcomes.iter().zip(durations) {
            if outcome.success {
                info!(recipient = %outcome.recipient_id, diagnostic = %outcome.diagnostic, "alert sent");
            } else if stale {
                debug!(recipient = %outcome.recipient_id, error = %outcome.diagnostic, "alert dispatch failed");
            } else {
                warn!(recipient = %outcome.recipient_id, error = %outcome.diagnostic, "alert dispatch failed");
            }
            metrics::record_dispatch(outcome.success, elapsed);
            self.shared.events.emit(Event::DispatchCompleted {
                timestamp: Utc::now(),
                episode: episode_id,
                recipient: outcome.recipient_id.to_string(),
                success: outcome.success,
                diagnostic: outcome.diagnostic.clone(),
                duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            });
        }

        DispatchReport {
            episode_id,
            outcomes,
            stale,
        }
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    fn spawn_tick_task(&self, episode_id: Uuid, cancel: CancellationToken) {
        let controller = self.clone();
        let period = self.shared.timing.tick;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        debug!(episode = %episode_id, "tick task cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        let Ok(activated) = controller.on_tick(episode_id) else {
                            debug!(episode = %episode_id, "tick for stale episode, stopping");
                            break;
                        };
                        if controller.shared.dispatch_delayed_tiers && !activated.is_empty() {
                            let dispatcher = controller.clone();
                            tokio::spawn(async move {
                                dispatcher.dispatch(episode_id, activated).await;
                            });
                        }
                    }
                }
            }
        });
    }

    fn on_tick(&self, episode_id: Uuid) -> Result<Vec<RecipientId>, EscalationError> {
        let (elapsed, activated, active) = {
            let mut guard = self.lock();
            let core = &mut *guard;
            let Some(active) = core.active.as_mut().filter(|a| a.episode.id == episode_id) else {
                return Err(EscalationError::StaleEpisode(episode_id));
            };
            let elapsed = active.episode.tick();
            let eligible = core.registry.eligible(elapsed);
            let activated = core.registry.activate(&eligible)?;
            core.transient.purge_expired(Instant::now());
            self.publish(core);
            (elapsed, activated, core.registry.active_count())
        };

        if !activated.is_empty() {
            metrics::set_recipients_active(active);
        }
        for recipient in &activated {
            info!(recipient = %recipient, elapsed, "recipient tier reached");
            self.shared.events.emit(Event::RecipientActivated {
                timestamp: Utc::now(),
                episode: episode_id,
                recipient: recipient.to_string(),
                elapsed_seconds: elapsed,
            });
        }
        Ok(activated)
    }

    // ------------------------------------------------------------------------
    // Poll
    // ------------------------------------------------------------------------

    fn spawn_poll_task(
        &self,
        episode_id: Uuid,
        triggered_at: DateTime<Utc>,
        cancel: CancellationToken,
    ) {
        let controller = self.clone();
        let timing = self.shared.timing;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(
                Instant::now() + timing.poll_initial_delay,
                timing.poll_interval,
            );
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let fetched = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    fetched = controller.fetch(triggered_at) => fetched,
                };
                let applied = match fetched {
                    Ok(events) => controller.apply_poll(episode_id, &events).map(|_| ()),
                    Err(e) => controller.poll_failed(episode_id, &e),
                };
                if applied.is_err() {
                    break;
                }
            }
            debug!(episode = %episode_id, "poll task stopped");
        });
    }

    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<AcknowledgmentEvent>, StoreError> {
        let limit = self.shared.timing.poll_timeout;
        tokio::time::timeout(limit, self.shared.store.list_events_since(since))
            .await
            .unwrap_or(Err(StoreError::Timeout(limit)))
    }

    /// Runs one poll cycle immediately, outside the poll schedule.
    ///
    /// # Errors
    ///
    /// Returns [`EscalationError::NotTriggered`] when idle, a store error if
    /// the fetch fails, or [`EscalationError::StaleEpisode`] if the episode
    /// ended while the fetch was in flight.
    pub async fn poll_now(&self) -> crate::error::Result<ReconcileOutcome> {
        let (episode_id, triggered_at) = {
            let core = self.lock();
            let active = core.active.as_ref().ok_or(EscalationError::NotTriggered)?;
            (active.episode.id, active.episode.triggered_at)
        };
        match self.fetch(triggered_at).await {
            Ok(events) => Ok(self.apply_poll(episode_id, &events)?),
            Err(e) => {
                self.poll_failed(episode_id, &e)?;
                Err(e.into())
            }
        }
    }

    fn poll_failed(&self, episode_id: Uuid, error: &StoreError) -> Result<(), EscalationError> {
        if self.lock().current(episode_id).is_none() {
            debug!(episode = %episode_id, %error, "poll failure for stale episode ignored");
            metrics::record_poll(PollResult::Stale);
            return Err(EscalationError::StaleEpisode(episode_id));
        }
        warn!(episode = %episode_id, %error, "acknowledgment poll failed, retrying next cycle");
        metrics::record_poll(PollResult::Error);
        self.shared.events.emit(Event::PollFailed {
            timestamp: Utc::now(),
            episode: episode_id,
            error: error.to_string(),
        });
        Ok(())
    }

    fn apply_poll(
        &self,
        episode_id: Uuid,
        events: &[AcknowledgmentEvent],
    ) -> Result<ReconcileOutcome, EscalationError> {
        let (outcome, early) = {
            let mut guard = self.lock();
            let core = &mut *guard;
            let Some(episode) = core.current(episode_id) else {
                debug!(episode = %episode_id, "poll result for stale episode discarded");
                metrics::record_poll(PollResult::Stale);
                return Err(EscalationError::StaleEpisode(episode_id));
            };

            let (admitted, early): (Vec<&AcknowledgmentEvent>, Vec<&AcknowledgmentEvent>) =
                events.iter().partition(|e| episode.admits(e.created_at()));
            let early = early.len();

            let outcome =
                AcknowledgmentReconciler::new(&mut core.registry, &mut core.dedup).reconcile(admitted);
            let now = Instant::now();
            for message in &outcome.transient {
                core.transient.push(message.clone(), now);
            }
            if !outcome.is_empty() {
                self.publish(core);
            }
            (outcome, early)
        };

        if early > 0 {
            debug!(episode = %episode_id, count = early, "events predating episode discarded");
        }
        metrics::record_poll(PollResult::Ok);
        metrics::record_discarded(DiscardReason::PreEpisode, early);
        metrics::record_discarded(DiscardReason::Duplicate, outcome.duplicates);
        metrics::record_discarded(DiscardReason::UnknownRecipient, outcome.unknown_recipients);
        metrics::record_acknowledgments(outcome.acknowledged.len());
        metrics::record_replies(outcome.transient.len());

        for recipient in &outcome.acknowledged {
            info!(episode = %episode_id, recipient = %recipient, "acknowledgment recorded");
            self.shared.events.emit(Event::AcknowledgmentRecorded {
                timestamp: Utc::now(),
                episode: episode_id,
                recipient: recipient.to_string(),
            });
        }
        for message in &outcome.transient {
            info!(episode = %episode_id, recipient = %message.recipient_id, "reply received");
            self.shared.events.emit(Event::ReplyReceived {
                timestamp: Utc::now(),
                episode: episode_id,
                recipient: message.recipient_id.to_string(),
                text: message.text.clone(),
            });
        }

        Ok(outcome)
    }
}
