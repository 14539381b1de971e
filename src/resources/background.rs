//! # BackgroundLoop: a cancellable periodic action bound to a token.
//!
//! The loop alternates an interruptible sleep with one action tick and stops
//! as soon as its [`CancellationToken`] fires. The token, not the place the
//! loop was created, decides its lifetime:
//!
//! - a child of [`LifecycleSupervisor::scope_token`](crate::LifecycleSupervisor::scope_token)
//!   (or any token registered with [`Scope::Bound`]) is cancelled at teardown;
//! - a free-standing `CancellationToken::new()` registered as
//!   [`Scope::Detached`] is never cancelled by the supervisor.
//!
//! The loop is spawned on the current tokio runtime when it is registered.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{Binding, ResourceId, Scope, bind_once};
use crate::actions::ActionRef;
use crate::core::LoopActor;
use crate::error::{CancelOutcome, LifecycleError};
use crate::events::Event;

/// Why a loop actor returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopExit {
    /// Token cancelled (or the action returned `Canceled`).
    Cancelled,
    /// Action returned a fatal error.
    Fatal,
}

impl LoopExit {
    pub fn as_label(self) -> &'static str {
        match self {
            LoopExit::Cancelled => "cancelled",
            LoopExit::Fatal => "fatal",
        }
    }
}

struct Inner {
    period: Duration,
    token: CancellationToken,
    action: ActionRef,
    ticks: AtomicU64,
    started: AtomicBool,
    running: AtomicBool,
    join: Mutex<Option<JoinHandle<LoopExit>>>,
    binding: OnceLock<Binding>,
}

/// Shared handle to a periodic background loop.
#[derive(Clone)]
pub struct BackgroundLoop {
    inner: Arc<Inner>,
}

impl BackgroundLoop {
    /// Creates a loop that runs `action` every `period` until `token` is cancelled.
    ///
    /// A zero period is rejected at registration.
    pub fn new(period: Duration, token: CancellationToken, action: ActionRef) -> Self {
        Self {
            inner: Arc::new(Inner {
                period,
                token,
                action,
                ticks: AtomicU64::new(0),
                started: AtomicBool::new(false),
                running: AtomicBool::new(false),
                join: Mutex::new(None),
                binding: OnceLock::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.action.name()
    }

    pub fn period(&self) -> Duration {
        self.inner.period
    }

    /// The token that stops this loop.
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    /// Number of action invocations so far.
    pub fn ticks(&self) -> u64 {
        self.inner.ticks.load(Ordering::Acquire)
    }

    /// True between spawn and actor exit.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// True if the loop may still invoke its action.
    pub fn can_fire(&self) -> bool {
        self.is_running() && !self.is_cancelled()
    }

    /// Scope fixed at registration (`None` if never registered).
    pub fn scope(&self) -> Option<Scope> {
        self.inner.binding.get().map(|b| b.scope)
    }

    /// Registry id (`None` if never registered).
    pub fn id(&self) -> Option<ResourceId> {
        self.inner.binding.get().map(|b| b.id)
    }

    /// Cancels the loop's token.
    pub fn cancel(&self) -> CancelOutcome {
        if self.inner.token.is_cancelled() {
            return CancelOutcome::AlreadyCancelled;
        }
        self.inner.token.cancel();
        CancelOutcome::Cancelled
    }

    pub(crate) fn validate(&self) -> Result<(), LifecycleError> {
        if self.inner.period.is_zero() {
            return Err(LifecycleError::InvalidPeriod {
                period: self.inner.period,
            });
        }
        Ok(())
    }

    pub(crate) fn bind(&self, binding: Binding) -> Result<(), LifecycleError> {
        bind_once(&self.inner.binding, binding)
    }

    /// Spawns the loop actor on the current runtime. No-op if already started.
    ///
    /// Callers check for a runtime first (`Resource::validate`).
    pub(crate) fn start(&self, tick_timeout: Option<Duration>) {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.running.store(true, Ordering::Release);
        let actor = LoopActor::new(self.clone(), tick_timeout);
        let handle = tokio::spawn(actor.run());
        *self.inner.join.lock() = Some(handle);
    }

    pub(crate) fn take_join(&self) -> Option<JoinHandle<LoopExit>> {
        self.inner.join.lock().take()
    }

    pub(crate) fn action(&self) -> &ActionRef {
        &self.inner.action
    }

    /// Counts one action invocation and returns its 1-based number.
    pub(crate) fn next_tick(&self) -> u64 {
        self.inner.ticks.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn mark_stopped(&self) {
        self.inner.running.store(false, Ordering::Release);
    }

    pub(crate) fn emit(&self, ev: Event) {
        if let Some(binding) = self.inner.binding.get() {
            binding.emit(ev);
        }
    }
}

impl fmt::Debug for BackgroundLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundLoop")
            .field("name", &self.name())
            .field("period", &self.inner.period)
            .field("ticks", &self.ticks())
            .field("running", &self.is_running())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
