//! Lifecycle events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `LifecycleSupervisor`, `ScheduledTask` (when fired by the
//!   `Scheduler`), `LoopActor`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the supervisor's fan-out listener (feeds `SubscriberSet`)
//!   and any receiver from `LifecycleSupervisor::subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
