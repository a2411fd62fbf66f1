//! Structured event stream for `ackline`.
//!
//! Discrete, typed events emitted over the life of an alarm episode.
//! Events are serialized as newline-delimited JSON (JSONL) and carry a
//! monotonically increasing sequence number for ordering.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during `ackline` operation.
///
/// Each variant is tagged with `"type"` when serialized to JSON so consumers
/// can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The service is up and accepting webhook traffic.
    ServiceStarted {
        /// When the service started.
        timestamp: DateTime<Utc>,
        /// Bound HTTP address.
        bind: String,
        /// Transport type (e.g. `"twilio"`, `"log"`).
        transport: String,
        /// Number of configured recipients.
        recipients: usize,
    },

    /// The service has stopped.
    ServiceStopped {
        /// When the service stopped.
        timestamp: DateTime<Utc>,
        /// Human-readable stop reason.
        reason: String,
    },

    /// An episode began.
    AlarmTriggered {
        /// Trigger time (the episode's event boundary).
        timestamp: DateTime<Utc>,
        /// Episode id.
        episode: Uuid,
        /// Recipients active immediately.
        initial_recipients: usize,
    },

    /// One alert dispatch finished.
    DispatchCompleted {
        /// When the send completed.
        timestamp: DateTime<Utc>,
        /// Episode id.
        episode: Uuid,
        /// Recipient address.
        recipient: String,
        /// Whether the provider accepted the alert.
        success: bool,
        /// Provider id or failure description.
        diagnostic: String,
        /// Send duration in milliseconds.
        duration_ms: u64,
    },

    /// A delayed tier became active.
    RecipientActivated {
        /// When the tier was reached.
        timestamp: DateTime<Utc>,
        /// Episode id.
        episode: Uuid,
        /// Recipient address.
        recipient: String,
        /// Elapsed seconds at activation.
        elapsed_seconds: u64,
    },

    /// A recipient acknowledged.
    AcknowledgmentRecorded {
        /// When the poll applied it.
        timestamp: DateTime<Utc>,
        /// Episode id.
        episode: Uuid,
        /// Recipient address.
        recipient: String,
    },

    /// A non-acknowledgment reply was surfaced.
    ReplyReceived {
        /// When the poll applied it.
        timestamp: DateTime<Utc>,
        /// Episode id.
        episode: Uuid,
        /// Sender address.
        recipient: String,
        /// Reply text.
        text: String,
    },

    /// A poll cycle failed and was skipped.
    PollFailed {
        /// When the failure was observed.
        timestamp: DateTime<Utc>,
        /// Episode id.
        episode: Uuid,
        /// Failure description.
        error: String,
    },

    /// An episode ended.
    AlarmReset {
        /// When the reset happened.
        timestamp: DateTime<Utc>,
        /// Episode id.
        episode: Uuid,
        /// Elapsed seconds at reset.
        elapsed_seconds: u64,
        /// Recipients acknowledged by then.
        acknowledged: usize,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) atomically increments the sequence
/// counter, serializes the event as a single JSON line, and flushes the
/// underlying writer. Serialization or I/O failures are silently dropped.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug.
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Flushes buffered output.
    pub fn flush(&self) {
        if let Ok(mut w) = self.writer.lock() {
            let _ = w.flush();
        }
    }
}
