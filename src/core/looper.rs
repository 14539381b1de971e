//! # LoopActor: drives one background loop.
//!
//! ## Architecture
//! ```text
//! LifecycleSupervisor::register(loop) ──► BackgroundLoop::start() ──► LoopActor::run()
//!
//! loop {
//!   ├─► token cancelled?            → exit(Cancelled)
//!   ├─► select! { sleep(period), token.cancelled() }
//!   │        └─ cancelled mid-sleep → exit(Cancelled)
//!   ├─► token cancelled?            → exit(Cancelled)   (re-check after waking)
//!   ├─► run_tick() ─────► action.run(child token)
//!   │     ├─ Ok             → continue
//!   │     ├─ Fail/Timeout   → continue
//!   │     ├─ Canceled       → exit(Cancelled)
//!   │     └─ Fatal          → exit(Fatal)
//! }
//! publish LoopStopped
//! ```
//!
//! ## Rules
//! - Sleep and token check alternate, so cancellation is observed within one period.
//! - Sleep is interruptible; cancelling mid-sleep never waits for the period to elapse.
//! - Ticks run **sequentially**; the tick counter counts action invocations only.

use std::time::Duration;

use tokio::{select, time};

use crate::core::runner::run_tick;
use crate::error::ActionError;
use crate::events::{Event, EventKind};
use crate::resources::{BackgroundLoop, LoopExit};

/// Runs a [`BackgroundLoop`] until its token is cancelled or its action fails fatally.
pub(crate) struct LoopActor {
    lp: BackgroundLoop,
    tick_timeout: Option<Duration>,
}

impl LoopActor {
    pub fn new(lp: BackgroundLoop, tick_timeout: Option<Duration>) -> Self {
        Self { lp, tick_timeout }
    }

    pub async fn run(self) -> LoopExit {
        let token = self.lp.token().clone();
        let period = self.lp.period();
        self.lp.emit(
            Event::new(EventKind::LoopStarted)
                .with_name(self.lp.name().to_string())
                .with_period(period),
        );

        let exit = loop {
            if token.is_cancelled() {
                break LoopExit::Cancelled;
            }

            let sleep = time::sleep(period);
            tokio::pin!(sleep);
            select! {
                _ = &mut sleep => {}
                _ = token.cancelled() => break LoopExit::Cancelled,
            }
            if token.is_cancelled() {
                break LoopExit::Cancelled;
            }

            let tick = self.lp.next_tick();
            match run_tick(&self.lp, &token, self.tick_timeout, tick).await {
                Ok(()) => {}
                Err(ActionError::Canceled) => break LoopExit::Cancelled,
                Err(e) if e.is_retryable() => {}
                Err(_) => break LoopExit::Fatal,
            }
        };

        self.lp.mark_stopped();
        self.lp.emit(
            Event::new(EventKind::LoopStopped)
                .with_name(self.lp.name().to_string())
                .with_reason(exit.as_label()),
        );
        tracing::debug!(loop_name = self.lp.name(), exit = exit.as_label(), "loop stopped");
        exit
    }
}
