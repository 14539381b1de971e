//! # Resources that can be bound to an owner.
//!
//! - [`ReferenceHandle`] - strong/weak box around a pointee
//! - [`ScheduledTask`] - one-shot or repeating deferred work, fired by a [`Scheduler`](crate::Scheduler)
//! - [`BackgroundLoop`] - periodic async action driven by a `CancellationToken`
//!
//! [`Resource`] is the type-erased form accepted by
//! [`LifecycleSupervisor::register`](crate::LifecycleSupervisor::register).
//! Every resource carries a write-once binding set at registration: it fixes
//! the scope and tells the resource where to publish its events.

mod background;
mod ids;
mod reference;
mod scheduled;

pub use background::BackgroundLoop;
pub use ids::{OwnerId, ResourceId, ResourceKind, Scope, Strength};
pub use reference::ReferenceHandle;
pub use scheduled::ScheduledTask;

pub(crate) use background::LoopExit;
pub(crate) use scheduled::Fired;

use std::sync::OnceLock;

use crate::error::LifecycleError;
use crate::events::{Bus, Event};

/// Registration record stored inside a resource.
#[derive(Clone, Debug)]
pub(crate) struct Binding {
    pub id: ResourceId,
    pub owner: OwnerId,
    pub scope: Scope,
    pub kind: ResourceKind,
    pub bus: Bus,
}

impl Binding {
    /// Stamps owner/resource/scope onto `ev` and publishes it.
    pub fn emit(&self, ev: Event) {
        self.bus.publish(
            ev.with_owner(self.owner)
                .with_resource(self.id, self.kind)
                .with_scope(self.scope),
        );
    }
}

/// Sets the binding once; a second registration reports the first id.
pub(crate) fn bind_once(slot: &OnceLock<Binding>, binding: Binding) -> Result<(), LifecycleError> {
    slot.set(binding)
        .map_err(|rejected| LifecycleError::AlreadyRegistered {
            existing: slot.get().map_or(rejected.id, |b| b.id),
        })
}

/// Any resource the supervisor can track.
#[derive(Clone, Debug)]
pub enum Resource {
    Reference(ReferenceHandle),
    Task(ScheduledTask),
    Loop(BackgroundLoop),
}

impl Resource {
    /// Returns the resource kind.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Reference(_) => ResourceKind::Reference,
            Resource::Task(_) => ResourceKind::Task,
            Resource::Loop(_) => ResourceKind::Loop,
        }
    }

    /// Returns the task/loop name, if the resource has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Resource::Reference(_) => None,
            Resource::Task(t) => Some(t.name()),
            Resource::Loop(l) => Some(l.name()),
        }
    }

    /// True while the resource can still run work or keep a strong pointee.
    pub fn is_live(&self) -> bool {
        match self {
            Resource::Reference(h) => h.holds_strong(),
            Resource::Task(t) => t.can_fire(),
            Resource::Loop(l) => l.can_fire(),
        }
    }

    /// True if this is a strong reference whose pointee lives at `addr`.
    pub(crate) fn retains_addr(&self, addr: usize) -> bool {
        match self {
            Resource::Reference(h) => h.strong_addr() == Some(addr),
            _ => false,
        }
    }

    /// Checks everything that can be rejected before the binding is consumed.
    pub(crate) fn validate(&self) -> Result<(), LifecycleError> {
        match self {
            Resource::Reference(_) => Ok(()),
            Resource::Task(t) => t.validate(),
            Resource::Loop(l) => {
                l.validate()?;
                tokio::runtime::Handle::try_current().map_err(|_| LifecycleError::NoRuntime)?;
                Ok(())
            }
        }
    }

    pub(crate) fn bind(&self, binding: Binding) -> Result<(), LifecycleError> {
        match self {
            Resource::Reference(h) => h.bind(binding),
            Resource::Task(t) => t.bind(binding),
            Resource::Loop(l) => l.bind(binding),
        }
    }

    /// Seals a handle, cancels a task, or cancels a loop's token.
    ///
    /// Returns `true` if this call changed anything.
    pub(crate) fn shut(&self) -> bool {
        match self {
            Resource::Reference(h) => h.seal(),
            Resource::Task(t) => t.cancel() == crate::CancelOutcome::Cancelled,
            Resource::Loop(l) => l.cancel() == crate::CancelOutcome::Cancelled,
        }
    }
}

impl From<ReferenceHandle> for Resource {
    fn from(h: ReferenceHandle) -> Self {
        Resource::Reference(h)
    }
}

impl From<ScheduledTask> for Resource {
    fn from(t: ScheduledTask) -> Self {
        Resource::Task(t)
    }
}

impl From<BackgroundLoop> for Resource {
    fn from(l: BackgroundLoop) -> Self {
        Resource::Loop(l)
    }
}

impl From<&ReferenceHandle> for Resource {
    fn from(h: &ReferenceHandle) -> Self {
        Resource::Reference(h.clone())
    }
}

impl From<&ScheduledTask> for Resource {
    fn from(t: &ScheduledTask) -> Self {
        Resource::Task(t.clone())
    }
}

impl From<&BackgroundLoop> for Resource {
    fn from(l: &BackgroundLoop) -> Self {
        Resource::Loop(l.clone())
    }
}
