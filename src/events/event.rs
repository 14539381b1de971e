//! # Lifecycle events emitted by supervisors and their resources.
//!
//! The [`EventKind`] enum classifies events in four groups:
//! - **Owner events**: destruction observed, teardown finished
//! - **Registry events**: registration, rejection, release, detached retention
//! - **Firing events**: scheduled task fired/cancelled, loop ticks and stops
//! - **Subscriber events**: overflow and panic of observers
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. [`LeakDetector`](crate::LeakDetector) compares sequence
//! numbers to tell firings before and after an owner was destroyed.
//!
//! ## Example
//! ```rust
//! use lifebound::{Event, EventKind, Scope};
//!
//! let ev = Event::new(EventKind::TaskFired)
//!     .with_name("refresh")
//!     .with_scope(Scope::Detached)
//!     .with_tick(3);
//!
//! assert_eq!(ev.kind, EventKind::TaskFired);
//! assert_eq!(ev.tick, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::resources::{OwnerId, ResourceId, ResourceKind, Scope};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `name` (subscriber), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `name` (subscriber), `reason` ("full" / "closed").
    SubscriberOverflow,

    // === Owner events ===
    /// Supervisor observed its owner's destruction; teardown begins.
    ///
    /// Sets: `owner`.
    OwnerDestroyed,

    /// Teardown finished.
    ///
    /// Sets: `owner`, `reason` (`released=N retained=M`).
    TeardownCompleted,

    /// A cancelled loop did not exit within `Config::grace` and was aborted.
    /// Published once per aborted loop.
    ///
    /// Sets: `owner`, `resource`, `resource_kind`, `name`, `timeout_ms` (grace).
    GraceExceeded,

    // === Registry events ===
    /// Resource registered.
    ///
    /// Sets: `owner`, `resource`, `resource_kind`, `scope`, `name`.
    ResourceRegistered,

    /// Registration refused.
    ///
    /// Sets: `owner`, `resource_kind`, `reason` (error label).
    RegisterRejected,

    /// Resource removed from the registry and cleared/cancelled
    /// (explicit release or teardown).
    ///
    /// Sets: `owner`, `resource`, `resource_kind`, `scope`.
    ResourceReleased,

    /// Detached resource left in place by teardown.
    ///
    /// Sets: `owner`, `resource`, `resource_kind`, `scope`, `name`.
    DetachedRetained,

    // === Firing events ===
    /// Scheduled task action ran.
    ///
    /// Sets: `owner`, `resource`, `scope`, `name`, `tick` (fire count).
    TaskFired,

    /// Scheduled task was cancelled.
    ///
    /// Sets: `owner`, `resource`, `scope`, `name`.
    TaskCancelled,

    /// Background loop spawned.
    ///
    /// Sets: `owner`, `resource`, `scope`, `name`, `period_ms`.
    LoopStarted,

    /// Background loop tick completed.
    ///
    /// Sets: `owner`, `resource`, `scope`, `name`, `tick`.
    LoopTick,

    /// Background loop tick failed (retryable or fatal).
    ///
    /// Sets: `owner`, `resource`, `scope`, `name`, `tick`, `reason`.
    LoopTickFailed,

    /// Tick exceeded `Config::tick_timeout` (always followed by `LoopTickFailed`).
    ///
    /// Sets: `owner`, `resource`, `name`, `tick`, `timeout_ms`.
    TimeoutHit,

    /// Background loop exited.
    ///
    /// Sets: `owner`, `resource`, `scope`, `name`, `reason` (exit label).
    LoopStopped,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Owner the event belongs to.
    pub owner: Option<OwnerId>,
    /// Resource the event belongs to.
    pub resource: Option<ResourceId>,
    /// Kind of that resource.
    pub resource_kind: Option<ResourceKind>,
    /// Scope of that resource.
    pub scope: Option<Scope>,
    /// Human-readable name (task/loop/subscriber).
    pub name: Option<Arc<str>>,
    /// Fire/tick count (starting from 1).
    pub tick: Option<u64>,
    /// Loop period in milliseconds (compact).
    pub period_ms: Option<u32>,
    /// Timeout or grace in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            owner: None,
            resource: None,
            resource_kind: None,
            scope: None,
            name: None,
            tick: None,
            period_ms: None,
            timeout_ms: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_owner(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }

    #[inline]
    pub fn with_resource(mut self, id: ResourceId, kind: ResourceKind) -> Self {
        self.resource = Some(id);
        self.resource_kind = Some(kind);
        self
    }

    #[inline]
    pub fn with_resource_kind(mut self, kind: ResourceKind) -> Self {
        self.resource_kind = Some(kind);
        self
    }

    #[inline]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    pub fn with_tick(mut self, n: u64) -> Self {
        self.tick = Some(n);
        self
    }

    /// Attaches a loop period (stored as milliseconds).
    #[inline]
    pub fn with_period(mut self, d: Duration) -> Self {
        self.period_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout or grace duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_name(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_name(subscriber)
            .with_reason(info)
    }

    /// True for events that represent resource work actually running.
    #[inline]
    pub fn is_firing(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TaskFired | EventKind::LoopTick | EventKind::LoopTickFailed
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
