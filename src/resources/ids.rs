//! Opaque identities and classification of bound resources.
//!
//! Ids come from process-wide monotonic counters, so an id is never reused
//! within one process even across unrelated owners.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);
static NEXT_RESOURCE: AtomicU64 = AtomicU64::new(1);

/// Opaque owner identity. Displays as `owner-N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OWNER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner-{}", self.0)
    }
}

/// Registry key handed out by [`LifecycleSupervisor::register`](crate::LifecycleSupervisor::register).
/// Displays as `res-N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub(crate) fn next() -> Self {
        Self(NEXT_RESOURCE.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res-{}", self.0)
    }
}

/// Whether a resource is tied to its owner's lifecycle.
///
/// Fixed at registration; there is no API to change it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Released automatically when the owner is destroyed.
    Bound,
    /// Survives owner destruction; the leak surface.
    Detached,
}

impl Scope {
    /// Returns a short stable label (snake_case).
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Bound => "bound",
            Scope::Detached => "detached",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared strength of a [`ReferenceHandle`](crate::ReferenceHandle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strength {
    /// Keeps the pointee reachable while the handle is reachable.
    Strong,
    /// Never prevents reclamation of the pointee.
    Weak,
}

/// Kind of a registered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Reference,
    Task,
    Loop,
}

impl ResourceKind {
    /// Returns a short stable label (snake_case).
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Reference => "reference",
            ResourceKind::Task => "task",
            ResourceKind::Loop => "loop",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
