//! Shared integration-test harness: a scripted transport and controller
//! builders backed by the in-memory store.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ackline::error::{StoreError, TransportError};
use ackline::escalation::{
    ControllerOptions, EscalationController, EscalationTiming, RecipientSpec,
};
use ackline::event::{AcknowledgmentEvent, RecipientId};
use ackline::observability::EventEmitter;
use ackline::store::{MemoryStore, Store};
use ackline::transport::{DispatchReceipt, Transport, TransportType};
use chrono::{DateTime, Utc};

/// Transport that records every send and fails for configured recipients.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    sent: Mutex<Vec<(RecipientId, String)>>,
    failing: HashSet<RecipientId>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends to these ids fail with a provider status error.
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(RecipientId::new).collect(),
            ..Self::default()
        }
    }

    /// Every send sleeps for `delay` before answering.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Addresses sent to, in completion order.
    pub fn sent_to(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.to_string())
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        address: &RecipientId,
        body: &str,
    ) -> Result<DispatchReceipt, TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(address) {
            return Err(TransportError::Status {
                status: 400,
                body: "invalid number".to_string(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((address.clone(), body.to_string()));
        Ok(DispatchReceipt {
            diagnostic: format!("SM{}", sent.len()),
        })
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Log
    }
}

/// Memory-backed store whose reads can be made to fail or stall.
#[derive(Debug, Default)]
pub struct ScriptedStore {
    inner: MemoryStore,
    failures: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    reads: AtomicUsize,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` reads fail.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Every read sleeps for `delay` before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Reads started so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Store for ScriptedStore {
    async fn list_events_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<AcknowledgmentEvent>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "store offline",
            )));
        }
        self.inner.list_events_since(since).await
    }

    async fn append_event(&self, event: AcknowledgmentEvent) -> Result<(), StoreError> {
        self.inner.append_event(event).await
    }
}

pub fn spec(id: &str, delay: u64) -> RecipientSpec {
    RecipientSpec {
        id: RecipientId::new(id),
        name: format!("Supervisor {id}"),
        activation_delay_secs: delay,
    }
}

pub fn options(recipients: Vec<RecipientSpec>) -> ControllerOptions {
    ControllerOptions {
        recipients,
        message: "Alarm Triggered".to_string(),
        timing: EscalationTiming::default(),
        dispatch_delayed_tiers: true,
    }
}

/// Controller plus handles to its collaborators.
pub struct Harness {
    pub controller: EscalationController,
    pub transport: Arc<ScriptedTransport>,
    pub store: Arc<MemoryStore>,
}

pub fn harness(options: ControllerOptions, transport: ScriptedTransport) -> Harness {
    let transport = Arc::new(transport);
    let store = Arc::new(MemoryStore::new());
    let controller = EscalationController::new(
        options,
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::new(EventEmitter::noop()),
    );
    Harness {
        controller,
        transport,
        store,
    }
}

pub fn id(raw: &str) -> RecipientId {
    RecipientId::new(raw)
}

/// Controller reading from a [`ScriptedStore`].
pub fn with_store(options: ControllerOptions, store: &Arc<ScriptedStore>) -> EscalationController {
    EscalationController::new(
        options,
        Arc::new(ScriptedTransport::new()),
        Arc::clone(store) as Arc<dyn Store>,
        Arc::new(EventEmitter::noop()),
    )
}
