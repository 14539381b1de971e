//! # ScheduledTask: deferred or periodic work with a cancellation flag.
//!
//! A task does nothing on its own; it fires when a [`Scheduler`](crate::Scheduler)
//! reaches its due time. The cancelled flag is checked immediately before
//! every firing and again before every re-arm of a repeating task.
//!
//! ```text
//! post ──► armed ──(due)──► cancelled? ──yes──► disarmed
//!                                │
//!                                no
//!                                ▼
//!                           run action ──► repeating && !cancelled ──► re-armed (due + period)
//!                                                  │
//!                                                  └─ otherwise ──► disarmed
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;

use super::{Binding, ResourceId, Scope, bind_once};
use crate::error::{CancelOutcome, LifecycleError};
use crate::events::{Event, EventKind};

type TaskAction = Box<dyn FnMut() + Send + 'static>;

struct Inner {
    name: Cow<'static, str>,
    interval: Duration,
    repeating: bool,
    cancelled: AtomicBool,
    armed: AtomicBool,
    fired: AtomicU64,
    action: Mutex<TaskAction>,
    binding: OnceLock<Binding>,
}

/// Outcome of one due-time check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fired {
    /// Cancelled before the check; the action did not run.
    Skipped,
    /// Action ran; the task is done.
    Done,
    /// Action ran; re-arm after `interval`.
    Rearm,
}

/// Shared handle to a scheduled unit of work.
///
/// Clones share state, so the caller can keep one clone to cancel or observe
/// the task after handing another to the supervisor.
#[derive(Clone)]
pub struct ScheduledTask {
    inner: Arc<Inner>,
}

impl ScheduledTask {
    /// Creates a task that fires once, `delay` after being posted.
    pub fn once<F>(name: impl Into<Cow<'static, str>>, delay: Duration, action: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::build(name.into(), delay, false, Box::new(action))
    }

    /// Creates a task that fires every `period` after being posted until cancelled.
    ///
    /// A zero period is rejected when the task is posted or registered.
    pub fn repeating<F>(name: impl Into<Cow<'static, str>>, period: Duration, action: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::build(name.into(), period, true, Box::new(action))
    }

    fn build(name: Cow<'static, str>, interval: Duration, repeating: bool, action: TaskAction) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                interval,
                repeating,
                cancelled: AtomicBool::new(false),
                armed: AtomicBool::new(false),
                fired: AtomicU64::new(0),
                action: Mutex::new(action),
                binding: OnceLock::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Delay (one-shot) or period (repeating).
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn is_repeating(&self) -> bool {
        self.inner.repeating
    }

    /// Number of times the action ran.
    pub fn fire_count(&self) -> u64 {
        self.inner.fired.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// True while posted on a scheduler and not yet done.
    pub fn is_pending(&self) -> bool {
        self.inner.armed.load(Ordering::Acquire)
    }

    /// True if a future due-time check would run the action.
    pub fn can_fire(&self) -> bool {
        self.is_pending() && !self.is_cancelled()
    }

    /// Scope fixed at registration (`None` if never registered).
    pub fn scope(&self) -> Option<Scope> {
        self.inner.binding.get().map(|b| b.scope)
    }

    /// Registry id (`None` if never registered).
    pub fn id(&self) -> Option<ResourceId> {
        self.inner.binding.get().map(|b| b.id)
    }

    /// Sets the cancelled flag.
    ///
    /// Cancelling twice is not an error; the second call reports
    /// [`CancelOutcome::AlreadyCancelled`].
    pub fn cancel(&self) -> CancelOutcome {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return CancelOutcome::AlreadyCancelled;
        }
        self.emit(Event::new(EventKind::TaskCancelled).with_name(self.name().to_string()));
        CancelOutcome::Cancelled
    }

    pub(crate) fn validate(&self) -> Result<(), LifecycleError> {
        if self.inner.repeating && self.inner.interval.is_zero() {
            return Err(LifecycleError::InvalidPeriod {
                period: self.inner.interval,
            });
        }
        Ok(())
    }

    pub(crate) fn bind(&self, binding: Binding) -> Result<(), LifecycleError> {
        bind_once(&self.inner.binding, binding)
    }

    /// Marks the task as posted. Returns `false` if it already was.
    pub(crate) fn arm(&self) -> bool {
        !self.inner.armed.swap(true, Ordering::AcqRel)
    }

    /// Runs one due-time check: check-then-fire, then re-check before re-arm.
    pub(crate) fn fire(&self) -> Fired {
        if self.is_cancelled() {
            self.inner.armed.store(false, Ordering::Release);
            return Fired::Skipped;
        }

        {
            let mut action = self.inner.action.lock();
            (&mut **action)();
        }
        let n = self.inner.fired.fetch_add(1, Ordering::AcqRel) + 1;
        self.emit(
            Event::new(EventKind::TaskFired)
                .with_name(self.name().to_string())
                .with_tick(n),
        );

        if self.inner.repeating && !self.is_cancelled() {
            Fired::Rearm
        } else {
            self.inner.armed.store(false, Ordering::Release);
            Fired::Done
        }
    }

    fn emit(&self, ev: Event) {
        if let Some(binding) = self.inner.binding.get() {
            binding.emit(ev);
        }
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.inner.name)
            .field("interval", &self.inner.interval)
            .field("repeating", &self.inner.repeating)
            .field("cancelled", &self.is_cancelled())
            .field("fired", &self.fire_count())
            .finish()
    }
}
