//! # Event subscribers.
//!
//! - [`Subscribe`] - extension point for observing supervisor events
//! - [`SubscriberSet`] - non-blocking fan-out with per-subscriber queues
//! - [`LogWriter`] - line-per-event printer (feature `logging`)
//!
//! [`LeakDetector`](crate::LeakDetector) is also a subscriber: it tracks work
//! that fires after its owner was destroyed.
//!
//! ```text
//!   Resource ── publish(Event) ──► Bus ──► supervisor listener ──► SubscriberSet::emit
//!                                                                  ┌──────┴──────┐
//!                                                                  ▼             ▼
//!                                                             LeakDetector    LogWriter ...
//! ```

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
