//! # Run a single tick of a background loop.
//!
//! - **Execute ONE tick** of the loop action with a child cancellation token
//! - **Apply timeout** if configured (wraps execution in `tokio::time::timeout`)
//! - **Publish events** for observability (tick/failed/timeout)
//!
//! ## Event flow
//! ```text
//! Success:      action.run() → Ok(())          → publish LoopTick
//! Cancellation: action.run() → Err(Canceled)   → no event (loop exits)
//! Failure:      action.run() → Err(Fail/Fatal) → publish LoopTickFailed
//! Timeout:      timeout exceeded → cancel child → publish TimeoutHit
//!                                               → publish LoopTickFailed
//! ```
//!
//! ## Rules
//! - Derives a **child token** per tick; child cancellation does not affect the loop token.
//! - `TimeoutHit` is published **in addition to** `LoopTickFailed` on timeout.

use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::ActionError;
use crate::events::{Event, EventKind};
use crate::resources::BackgroundLoop;

/// Executes tick number `tick` of `lp`, publishing lifecycle events through it.
pub(crate) async fn run_tick(
    lp: &BackgroundLoop,
    parent: &CancellationToken,
    timeout: Option<Duration>,
    tick: u64,
) -> Result<(), ActionError> {
    let child = parent.child_token();
    let action = lp.action();

    let res = if let Some(dur) = timeout.filter(|d| *d > Duration::ZERO) {
        match time::timeout(dur, action.run(child.clone())).await {
            Ok(r) => r,
            Err(_elapsed) => {
                child.cancel();
                lp.emit(
                    Event::new(EventKind::TimeoutHit)
                        .with_name(lp.name().to_string())
                        .with_tick(tick)
                        .with_timeout(dur),
                );
                Err(ActionError::Timeout { timeout: dur })
            }
        }
    } else {
        action.run(child.clone()).await
    };

    match &res {
        Ok(()) => lp.emit(
            Event::new(EventKind::LoopTick)
                .with_name(lp.name().to_string())
                .with_tick(tick),
        ),
        Err(ActionError::Canceled) => {}
        Err(e) => lp.emit(
            Event::new(EventKind::LoopTickFailed)
                .with_name(lp.name().to_string())
                .with_tick(tick)
                .with_reason(e.to_string()),
        ),
    }
    res
}
