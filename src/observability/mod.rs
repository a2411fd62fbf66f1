//! Observability
//!
//! Logging, metrics, and the structured event stream for following an
//! alarm episode from trigger to reset.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventEmitter};
pub use logging::{LogFormat, LogSettings, init_logging};
pub use metrics::init_metrics;
