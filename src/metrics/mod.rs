//! Metrics and observability infrastructure for Sleet.
//!
//! - `events`: internal event types and the `InternalEvent` trait
//! - `server`: Prometheus recorder and the per-run HTTP endpoint

pub mod events;
pub mod server;

pub use server::{MetricsEndpoint, init};

/// Emit an internal event.
///
/// Calls `InternalEvent::emit()` on the given event, which records the
/// corresponding metric. Without an installed recorder this is a no-op
/// apart from the trace line.
///
/// # Example
///
/// ```ignore
/// use sleet::metrics::events::DuplicatesDropped;
///
/// emit!(DuplicatesDropped { count: 3 });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
