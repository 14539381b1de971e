//! # LeakDetector: verifies that nothing outlives its owner.
//!
//! Two complementary views:
//!
//! - **Static**: [`LeakDetector::inspect`] walks a supervisor's registry and
//!   reports Detached strong references to the owner, Detached work that can
//!   still fire, and Bound entries that survived teardown.
//! - **Dynamic**: as a [`Subscribe`] implementation it remembers the sequence
//!   number of each owner's `OwnerDestroyed` event and counts every firing
//!   event (`TaskFired`, `LoopTick`, `LoopTickFailed`) of a Detached resource
//!   with a later sequence number.
//!
//! ```text
//! Bus ──► SubscriberSet ──► LeakDetector::on_event ──► update(&Event)
//!                                                        │
//!                                                        ▼
//!                                   HashMap<OwnerId, {destroyed_seq, fired_after}>
//! ```
//!
//! ## Rules
//! - Only the first `OwnerDestroyed` per owner counts.
//! - Firing events are attributed by `seq`, not by arrival order.
//! - Bound firings are never counted: a tick already in flight at teardown may
//!   still complete after `OwnerDestroyed`.
//! - Reads are eventually consistent with the bus.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::supervisor::LifecycleSupervisor;
use crate::error::LeakError;
use crate::events::{Event, EventKind};
use crate::resources::{OwnerId, ResourceId, ResourceKind, Scope};
use crate::subscribers::Subscribe;

#[derive(Debug, Default, Clone, Copy)]
struct OwnerTrace {
    destroyed_seq: Option<u64>,
    fired_after: u64,
}

/// Result of one inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakReport {
    pub owner: OwnerId,
    /// Teardown has run (or the owner is gone).
    pub owner_destroyed: bool,
    /// The owner is still allocated.
    pub owner_reachable: bool,
    /// Detached strong references whose pointee is the owner.
    pub retained_strong: Vec<ResourceId>,
    /// Detached tasks that can still fire.
    pub live_tasks: Vec<ResourceId>,
    /// Detached loops that can still tick.
    pub live_loops: Vec<ResourceId>,
    /// Bound entries still registered after teardown.
    pub bound_violations: Vec<ResourceId>,
    /// Detached firing events observed after `OwnerDestroyed`.
    pub firings_after_destroy: u64,
}

impl LeakReport {
    /// True if the destroyed owner is retained, or its work still runs.
    pub fn is_leaking(&self) -> bool {
        if !self.bound_violations.is_empty() {
            return true;
        }
        self.owner_destroyed
            && (!self.retained_strong.is_empty()
                || !self.live_tasks.is_empty()
                || !self.live_loops.is_empty()
                || self.firings_after_destroy > 0)
    }
}

/// Registry inspector and post-destroy firing tracker.
#[derive(Default)]
pub struct LeakDetector {
    traces: RwLock<HashMap<OwnerId, OwnerTrace>>,
}

impl LeakDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspects `sup` and merges in the firings this detector has observed.
    pub async fn inspect(&self, sup: &LifecycleSupervisor) -> LeakReport {
        let owner = sup.owner_id();
        let owner_reachable = sup.owner().is_some();
        let owner_destroyed =
            sup.is_torn_down().await || sup.owner().is_none_or(|o| o.is_destroyed());

        let mut report = LeakReport {
            owner,
            owner_destroyed,
            owner_reachable,
            retained_strong: Vec::new(),
            live_tasks: Vec::new(),
            live_loops: Vec::new(),
            bound_violations: Vec::new(),
            firings_after_destroy: self.firings_after_destroy(owner).await,
        };

        for info in sup.snapshot().await {
            match info.scope {
                Scope::Bound if owner_destroyed => report.bound_violations.push(info.id),
                Scope::Bound => {}
                Scope::Detached => match info.kind {
                    ResourceKind::Reference if info.retains_owner => {
                        report.retained_strong.push(info.id)
                    }
                    ResourceKind::Reference => {}
                    ResourceKind::Task if info.live => report.live_tasks.push(info.id),
                    ResourceKind::Loop if info.live => report.live_loops.push(info.id),
                    ResourceKind::Task | ResourceKind::Loop => {}
                },
            }
        }
        report
    }

    /// Like [`inspect`](Self::inspect), but turns a leaking report into an error.
    ///
    /// # Errors
    /// - [`LeakError::BoundSurvived`] if Bound entries outlived teardown;
    /// - [`LeakError::Leaking`] if Detached resources retain the owner or still fire.
    pub async fn verify(&self, sup: &LifecycleSupervisor) -> Result<LeakReport, LeakError> {
        let report = self.inspect(sup).await;
        if !report.bound_violations.is_empty() {
            return Err(LeakError::BoundSurvived {
                owner: report.owner,
                bound: report.bound_violations,
            });
        }
        if report.is_leaking() {
            let mut live = report.live_tasks.clone();
            live.extend_from_slice(&report.live_loops);
            live.sort_unstable();
            return Err(LeakError::Leaking {
                owner: report.owner,
                retained: report.retained_strong,
                live,
            });
        }
        Ok(report)
    }

    /// Applies one event. Returns `true` if it was counted as a post-destroy firing.
    pub async fn update(&self, ev: &Event) -> bool {
        let Some(owner) = ev.owner else {
            return false;
        };

        let mut traces = self.traces.write().await;
        let trace = traces.entry(owner).or_default();
        match ev.kind {
            EventKind::OwnerDestroyed => {
                trace.destroyed_seq.get_or_insert(ev.seq);
                false
            }
            _ if !ev.is_firing() || ev.scope != Some(Scope::Detached) => false,
            _ => match trace.destroyed_seq {
                Some(destroyed) if ev.seq > destroyed => {
                    trace.fired_after += 1;
                    true
                }
                _ => false,
            },
        }
    }

    /// Number of Detached firing events seen for `owner` after it was destroyed.
    pub async fn firings_after_destroy(&self, owner: OwnerId) -> u64 {
        self.traces
            .read()
            .await
            .get(&owner)
            .map_or(0, |t| t.fired_after)
    }

    /// True once `OwnerDestroyed` was seen for `owner`.
    pub async fn saw_destroyed(&self, owner: OwnerId) -> bool {
        self.traces
            .read()
            .await
            .get(&owner)
            .is_some_and(|t| t.destroyed_seq.is_some())
    }
}

#[async_trait]
impl Subscribe for LeakDetector {
    async fn on_event(&self, ev: &Event) {
        self.update(ev).await;
    }

    fn name(&self) -> &'static str {
        "leak-detector"
    }

    fn queue_capacity(&self) -> usize {
        2048
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_only_firings_after_destroy() {
        let det = LeakDetector::new();
        let owner = OwnerId::next();
        let res = ResourceId::next();
        let fired = || {
            Event::new(EventKind::TaskFired)
                .with_owner(owner)
                .with_resource(res, ResourceKind::Task)
                .with_scope(Scope::Detached)
        };

        assert!(!det.update(&fired()).await);
        assert!(!det.update(&Event::new(EventKind::OwnerDestroyed).with_owner(owner)).await);
        assert!(det.update(&fired()).await);
        assert!(det.update(&fired()).await);

        assert_eq!(det.firings_after_destroy(owner).await, 2);
        assert!(det.saw_destroyed(owner).await);
    }

    #[tokio::test]
    async fn test_stale_firing_not_counted() {
        let det = LeakDetector::new();
        let owner = OwnerId::next();
        let early = Event::new(EventKind::LoopTick)
            .with_owner(owner)
            .with_scope(Scope::Detached);
        let destroyed = Event::new(EventKind::OwnerDestroyed).with_owner(owner);

        det.update(&destroyed).await;
        assert!(!det.update(&early).await);
        assert_eq!(det.firings_after_destroy(owner).await, 0);
    }

    #[tokio::test]
    async fn test_bound_firing_after_destroy_not_counted() {
        let det = LeakDetector::new();
        let owner = OwnerId::next();
        det.update(&Event::new(EventKind::OwnerDestroyed).with_owner(owner))
            .await;

        let in_flight = Event::new(EventKind::LoopTick)
            .with_owner(owner)
            .with_resource(ResourceId::next(), ResourceKind::Loop)
            .with_scope(Scope::Bound)
            .with_tick(1);
        assert!(!det.update(&in_flight).await);
        assert_eq!(det.firings_after_destroy(owner).await, 0);
    }

    #[tokio::test]
    async fn test_owners_tracked_separately() {
        let det = LeakDetector::new();
        let (a, b) = (OwnerId::next(), OwnerId::next());
        det.update(&Event::new(EventKind::OwnerDestroyed).with_owner(a)).await;
        det.update(&Event::new(EventKind::TaskFired).with_owner(b)).await;

        assert_eq!(det.firings_after_destroy(a).await, 0);
        assert_eq!(det.firings_after_destroy(b).await, 0);
        assert!(!det.saw_destroyed(b).await);
    }
}
