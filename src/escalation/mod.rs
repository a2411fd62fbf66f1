//! Tiered alarm escalation.
//!
//! [`EscalationController`] drives an alarm episode: it dispatches alerts
//! to recipients tier by tier and polls the acknowledgment store until the
//! alarm is reset. The remaining modules are the synchronous pieces it is
//! built from and can be used on their own.

pub mod controller;
pub mod dedup;
pub mod episode;
pub mod reconciler;
pub mod registry;
pub mod snapshot;
pub mod transient;

pub use controller::{
    ControllerOptions, DispatchOutcome, DispatchReport, EscalationController, EscalationTiming,
};
pub use dedup::EventDeduplicator;
pub use episode::AlarmEpisode;
pub use reconciler::{AcknowledgmentReconciler, ReconcileOutcome};
pub use registry::{
    AcknowledgmentState, DispatchStatus, Recipient, RecipientRegistry, RecipientSpec,
};
pub use snapshot::{AlarmSnapshot, AlarmState};
pub use transient::{TransientMessage, TransientQueue};
