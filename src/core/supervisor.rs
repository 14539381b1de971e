//! # LifecycleSupervisor: binds resources to one owner and tears them down with it.
//!
//! The supervisor owns the registry of resources for a single [`Owner`], the
//! event bus those resources publish to, and a root cancellation token for
//! loops. It is attached to the owner as an [`OwnerListener`], so
//! [`Owner::destroy`] drives [`LifecycleSupervisor::on_owner_destroyed`].
//!
//! ## High-level architecture
//! ```text
//! register(resource, scope):
//!   write lock ─► closed? owner destroyed? ─► RegisterRejected + InvalidState
//!              └► validate ─► bind(id, scope, bus) ─► post task / spawn loop ─► insert
//!
//! Owner::destroy() ──► OwnerListener::owner_destroyed ──► on_owner_destroyed():
//!   write lock ─► close registry ─► drain Bound entries
//!   publish OwnerDestroyed
//!   scope token.cancel()                 → every loop on a child token stops
//!   Bound:    handle.clear() / task.cancel() / loop token.cancel()
//!             join loops within cfg.grace ─► stragglers aborted + GraceExceeded
//!   Detached: left registered, reported as DetachedRetained
//!   publish TeardownCompleted
//! ```
//!
//! ## Rules
//! - The supervisor holds only a `Weak<Owner>`; the owner is kept reachable
//!   only by resources registered against it.
//! - Teardown runs once; later calls are no-ops returning `None`.
//! - Registration racing teardown either completes before the registry is
//!   closed (and is torn down with it) or fails with `InvalidState`.
//! - Detached entries remain until released; they are the leak surface.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use lifebound::{Owner, LifecycleSupervisor, ScheduledTask, Scope};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), lifebound::LifecycleError> {
//!     let owner = Owner::create();
//!     let sup = LifecycleSupervisor::attach(&owner)?;
//!
//!     let poll = ScheduledTask::repeating("poll", Duration::from_secs(10), || {});
//!     sup.register(&poll, Scope::Bound).await?;
//!
//!     sup.scheduler().advance_by(Duration::from_secs(25));
//!     owner.destroy().await?;
//!     sup.scheduler().advance_by(Duration::from_secs(100));
//!
//!     assert_eq!(poll.fire_count(), 2);
//!     assert!(!sup.is_leaking().await);
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time;
use tokio_util::sync::CancellationToken;

use super::builder::SupervisorBuilder;
use super::owner::{Owner, OwnerListener};
use super::registry::Registry;
use super::scheduler::Scheduler;
use crate::config::Config;
use crate::error::{LifecycleError, ReleaseOutcome};
use crate::events::{Bus, Event, EventKind};
use crate::resources::{
    BackgroundLoop, Binding, OwnerId, Resource, ResourceId, ResourceKind, Scope,
};

/// Point-in-time view of one registered resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceInfo {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub scope: Scope,
    pub name: Option<String>,
    /// Can still fire (tasks/loops) or holds a strong pointee (references).
    pub live: bool,
    /// Strong reference whose pointee is this supervisor's owner.
    pub retains_owner: bool,
}

/// What one teardown did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Bound resources released, in registration order.
    pub released: Vec<ResourceId>,
    /// Detached resources left registered.
    pub retained: Vec<ResourceId>,
    /// Bound loops that did not stop within grace and were aborted.
    pub aborted: Vec<ResourceId>,
}

/// Registry of resources bound to a single owner.
pub struct LifecycleSupervisor {
    cfg: Config,
    owner: Weak<Owner>,
    owner_id: OwnerId,
    owner_addr: usize,
    bus: Bus,
    scheduler: Scheduler,
    scope: CancellationToken,
    fanout: CancellationToken,
    registry: RwLock<Registry>,
}

impl LifecycleSupervisor {
    /// Starts building a supervisor with `cfg`.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    /// Attaches a supervisor with default config and no subscribers.
    pub fn attach(owner: &Arc<Owner>) -> Result<Arc<Self>, LifecycleError> {
        SupervisorBuilder::new(Config::default()).attach(owner)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        owner: &Arc<Owner>,
        bus: Bus,
        scheduler: Scheduler,
        fanout: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            owner: Arc::downgrade(owner),
            owner_id: owner.id(),
            owner_addr: Arc::as_ptr(owner) as *const () as usize,
            bus,
            scheduler,
            scope: CancellationToken::new(),
            fanout,
            registry: RwLock::new(Registry::default()),
        }
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    /// The owner, if anything still keeps it alive.
    pub fn owner(&self) -> Option<Arc<Owner>> {
        self.owner.upgrade()
    }

    /// Scheduler that fires this supervisor's tasks.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Fresh child of the supervisor's root token; cancelled at teardown.
    pub fn scope_token(&self) -> CancellationToken {
        self.scope.child_token()
    }

    /// Raw event stream of this supervisor.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// True once teardown has run.
    pub async fn is_torn_down(&self) -> bool {
        self.registry.read().await.is_closed()
    }

    fn owner_active(&self) -> bool {
        self.owner.upgrade().is_some_and(|o| !o.is_destroyed())
    }

    /// Registers `resource` with a fixed `scope` and starts it.
    ///
    /// Tasks are posted to the supervisor's scheduler; loops are spawned on the
    /// current tokio runtime.
    ///
    /// # Errors
    /// - [`LifecycleError::InvalidState`] if the owner is destroyed (or gone);
    /// - [`LifecycleError::InvalidPeriod`] for a zero-period repeating task or loop;
    /// - [`LifecycleError::AlreadyRegistered`] if the resource was registered before;
    /// - [`LifecycleError::NoRuntime`] for a loop outside a tokio runtime.
    pub async fn register(
        &self,
        resource: impl Into<Resource>,
        scope: Scope,
    ) -> Result<ResourceId, LifecycleError> {
        let resource = resource.into();
        let kind = resource.kind();

        let mut reg = self.registry.write().await;
        if reg.is_closed() || !self.owner_active() {
            drop(reg);
            self.bus.publish(
                Event::new(EventKind::RegisterRejected)
                    .with_owner(self.owner_id)
                    .with_resource_kind(kind)
                    .with_scope(scope)
                    .with_reason("owner_destroyed"),
            );
            return Err(LifecycleError::InvalidState {
                owner: self.owner_id,
                reason: "owner_destroyed",
            });
        }

        resource.validate()?;
        let id = ResourceId::next();
        resource.bind(Binding {
            id,
            owner: self.owner_id,
            scope,
            kind,
            bus: self.bus.clone(),
        })?;

        match &resource {
            Resource::Reference(_) => {}
            Resource::Task(t) => self.scheduler.post(t)?,
            Resource::Loop(l) => l.start(self.cfg.action_timeout()),
        }
        let name = resource.name().map(str::to_owned);
        reg.insert(id, resource, scope);
        drop(reg);

        let mut ev = Event::new(EventKind::ResourceRegistered)
            .with_owner(self.owner_id)
            .with_resource(id, kind)
            .with_scope(scope);
        if let Some(name) = name {
            ev = ev.with_name(name);
        }
        self.bus.publish(ev);
        Ok(id)
    }

    /// Removes `id` from the registry and clears/cancels it.
    ///
    /// Works for both scopes and also after teardown. A released loop is
    /// joined within `cfg.grace`.
    pub async fn release(&self, id: ResourceId) -> ReleaseOutcome {
        let Some(entry) = self.registry.write().await.remove(id) else {
            return ReleaseOutcome::Unknown;
        };

        entry.resource.shut();
        if let Resource::Loop(lp) = &entry.resource {
            self.join_loops(vec![(id, lp.clone())]).await;
        }
        self.bus.publish(
            Event::new(EventKind::ResourceReleased)
                .with_owner(self.owner_id)
                .with_resource(id, entry.resource.kind())
                .with_scope(entry.scope),
        );
        ReleaseOutcome::Released
    }

    /// Tears down every Bound resource and reports Detached ones.
    ///
    /// Runs once; returns `None` on every later call.
    pub async fn on_owner_destroyed(&self) -> Option<TeardownReport> {
        let (bound, detached) = {
            let mut reg = self.registry.write().await;
            if !reg.close() {
                return None;
            }
            let detached: Vec<(ResourceId, ResourceKind)> = reg
                .iter()
                .filter(|(_, e)| e.scope == Scope::Detached)
                .map(|(id, e)| (*id, e.resource.kind()))
                .collect();
            (reg.drain_scope(Scope::Bound), detached)
        };

        self.bus
            .publish(Event::new(EventKind::OwnerDestroyed).with_owner(self.owner_id));
        self.scope.cancel();

        let mut report = TeardownReport::default();
        let mut loops = Vec::new();
        for (id, entry) in bound {
            entry.resource.shut();
            if let Resource::Loop(lp) = &entry.resource {
                loops.push((id, lp.clone()));
            }
            self.bus.publish(
                Event::new(EventKind::ResourceReleased)
                    .with_owner(self.owner_id)
                    .with_resource(id, entry.resource.kind())
                    .with_scope(Scope::Bound),
            );
            report.released.push(id);
        }
        report.aborted = self.join_loops(loops).await;

        for (id, kind) in detached {
            self.bus.publish(
                Event::new(EventKind::DetachedRetained)
                    .with_owner(self.owner_id)
                    .with_resource(id, kind)
                    .with_scope(Scope::Detached),
            );
            report.retained.push(id);
        }
        if !report.retained.is_empty() {
            tracing::debug!(
                owner = %self.owner_id,
                retained = report.retained.len(),
                "detached resources outlive owner"
            );
        }

        self.bus.publish(
            Event::new(EventKind::TeardownCompleted)
                .with_owner(self.owner_id)
                .with_reason(format!(
                    "released={} retained={}",
                    report.released.len(),
                    report.retained.len()
                )),
        );
        Some(report)
    }

    /// Waits for cancelled loops to exit, aborting those still running after grace.
    async fn join_loops(&self, loops: Vec<(ResourceId, BackgroundLoop)>) -> Vec<ResourceId> {
        let grace = self.cfg.grace;
        let deadline = time::Instant::now() + grace;
        let mut aborted = Vec::new();

        for (id, lp) in loops {
            let Some(mut join) = lp.take_join() else {
                continue;
            };
            if time::timeout_at(deadline, &mut join).await.is_err() {
                join.abort();
                lp.mark_stopped();
                tracing::warn!(owner = %self.owner_id, resource = %id, name = lp.name(), ?grace, "loop exceeded grace");
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_owner(self.owner_id)
                        .with_resource(id, ResourceKind::Loop)
                        .with_name(lp.name())
                        .with_timeout(grace),
                );
                aborted.push(id);
            }
        }
        aborted
    }

    /// True iff the owner is destroyed (or gone) and a Detached resource
    /// still retains it strongly or can still fire.
    pub async fn is_leaking(&self) -> bool {
        if self.owner_active() {
            return false;
        }
        self.snapshot()
            .await
            .iter()
            .any(|r| {
                r.scope == Scope::Detached
                    && (r.retains_owner || (r.live && r.kind != ResourceKind::Reference))
            })
    }

    /// Number of registered resources.
    pub async fn len(&self) -> usize {
        self.registry.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, id: ResourceId) -> bool {
        self.registry.read().await.get(id).is_some()
    }

    /// Registered ids with `scope`, in registration order.
    pub async fn ids(&self, scope: Scope) -> Vec<ResourceId> {
        self.registry.read().await.ids(scope)
    }

    pub async fn scope_of(&self, id: ResourceId) -> Option<Scope> {
        self.registry.read().await.get(id).map(|e| e.scope)
    }

    /// Views every registered resource, in registration order.
    pub async fn snapshot(&self) -> Vec<ResourceInfo> {
        // A dropped owner cannot be retained, and its address may be reused.
        let owner = self.owner.upgrade();
        let reg = self.registry.read().await;
        reg.iter()
            .map(|(id, e)| ResourceInfo {
                id: *id,
                kind: e.resource.kind(),
                scope: e.scope,
                name: e.resource.name().map(str::to_owned),
                live: e.resource.is_live(),
                retains_owner: owner.is_some() && e.resource.retains_addr(self.owner_addr),
            })
            .collect()
    }
}

#[async_trait]
impl OwnerListener for LifecycleSupervisor {
    async fn owner_destroyed(&self, _owner: OwnerId) {
        self.on_owner_destroyed().await;
    }
}

impl Drop for LifecycleSupervisor {
    fn drop(&mut self) {
        // stops the subscriber listener and its workers
        self.fanout.cancel();
    }
}

impl std::fmt::Debug for LifecycleSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleSupervisor")
            .field("owner", &self.owner_id)
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}
