//! # LogWriter: simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout.
//! Use it for tests and demos.
//!
//! ## Example output
//! ```text
//! [registered] owner=owner-1 res=res-3 kind=loop scope=bound
//! [loop-tick] owner=owner-1 res=res-3 name="counter" tick=4
//! [owner-destroyed] owner=owner-1
//! [detached-retained] owner=owner-1 res=res-2 kind=reference
//! [teardown-completed] owner=owner-1
//! ```

use std::fmt::Write as _;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use async_trait::async_trait;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Renders one event as a single line.
    pub fn render(e: &Event) -> String {
        let mut line = format!("[{}]", label(e.kind));
        if let Some(owner) = e.owner {
            let _ = write!(line, " owner={owner}");
        }
        if let Some(res) = e.resource {
            let _ = write!(line, " res={res}");
        }
        if let Some(kind) = e.resource_kind {
            let _ = write!(line, " kind={kind}");
        }
        if let Some(scope) = e.scope {
            let _ = write!(line, " scope={scope}");
        }
        if let Some(name) = e.name.as_deref() {
            let _ = write!(line, " name={name:?}");
        }
        if let Some(tick) = e.tick {
            let _ = write!(line, " tick={tick}");
        }
        if let Some(ms) = e.period_ms {
            let _ = write!(line, " period={ms}ms");
        }
        if let Some(ms) = e.timeout_ms {
            let _ = write!(line, " timeout={ms}ms");
        }
        if let Some(reason) = e.reason.as_deref() {
            let _ = write!(line, " reason={reason:?}");
        }
        line
    }
}

fn label(kind: EventKind) -> &'static str {
    match kind {
        EventKind::SubscriberPanicked => "subscriber-panicked",
        EventKind::SubscriberOverflow => "subscriber-overflow",
        EventKind::OwnerDestroyed => "owner-destroyed",
        EventKind::TeardownCompleted => "teardown-completed",
        EventKind::GraceExceeded => "grace-exceeded",
        EventKind::ResourceRegistered => "registered",
        EventKind::RegisterRejected => "register-rejected",
        EventKind::ResourceReleased => "released",
        EventKind::DetachedRetained => "detached-retained",
        EventKind::TaskFired => "task-fired",
        EventKind::TaskCancelled => "task-cancelled",
        EventKind::LoopStarted => "loop-started",
        EventKind::LoopTick => "loop-tick",
        EventKind::LoopTickFailed => "loop-tick-failed",
        EventKind::TimeoutHit => "timeout",
        EventKind::LoopStopped => "loop-stopped",
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        println!("{}", Self::render(e));
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
