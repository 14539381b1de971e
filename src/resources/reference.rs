//! # ReferenceHandle: a strong or weak box around a pointee.
//!
//! The pointee is type-erased (`Arc<dyn Any + Send + Sync>`) so one registry
//! can hold references to owners and to arbitrary payloads alike.
//!
//! ## Rules
//! - Strength is declared at construction and never changes.
//! - A weak handle never keeps its pointee alive.
//! - `clear()` may be called any number of times, also on empty handles.
//! - Once the supervisor has shut a handle it is sealed: `replace()` is refused.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use lifebound::{Owner, ReferenceHandle};
//!
//! let owner = Owner::create();
//! let weak = ReferenceHandle::weak(&owner);
//! assert!(weak.points_to(&owner));
//!
//! let id = owner.id();
//! drop(owner);
//! assert!(weak.is_empty(), "weak handle must not keep {id} alive");
//! ```

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use super::{Binding, ResourceId, Scope, Strength, bind_once};
use crate::error::LifecycleError;

type Pointee = Arc<dyn Any + Send + Sync>;
type WeakPointee = Weak<dyn Any + Send + Sync>;

enum Slot {
    Empty,
    Strong(Pointee),
    Weak(WeakPointee),
}

struct Inner {
    strength: Strength,
    slot: Mutex<Slot>,
    sealed: AtomicBool,
    binding: OnceLock<Binding>,
}

/// Shared handle to a (possibly cleared) pointee.
///
/// Clones share the same slot: clearing one clears all.
#[derive(Clone)]
pub struct ReferenceHandle {
    inner: Arc<Inner>,
}

impl ReferenceHandle {
    /// Creates a handle that keeps `value` reachable.
    pub fn strong<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        let erased: Pointee = value;
        Self::with_slot(Strength::Strong, Slot::Strong(erased))
    }

    /// Creates a handle that observes `value` without keeping it alive.
    pub fn weak<T: Any + Send + Sync>(value: &Arc<T>) -> Self {
        let typed: Weak<T> = Arc::downgrade(value);
        let erased: WeakPointee = typed;
        Self::with_slot(Strength::Weak, Slot::Weak(erased))
    }

    /// Creates an empty handle of the given strength (bind later with [`replace`](Self::replace)).
    pub fn empty(strength: Strength) -> Self {
        Self::with_slot(strength, Slot::Empty)
    }

    fn with_slot(strength: Strength, slot: Slot) -> Self {
        Self {
            inner: Arc::new(Inner {
                strength,
                slot: Mutex::new(slot),
                sealed: AtomicBool::new(false),
                binding: OnceLock::new(),
            }),
        }
    }

    /// Declared strength.
    pub fn strength(&self) -> Strength {
        self.inner.strength
    }

    /// Scope fixed at registration (`None` if never registered).
    pub fn scope(&self) -> Option<Scope> {
        self.inner.binding.get().map(|b| b.scope)
    }

    /// Registry id (`None` if never registered).
    pub fn id(&self) -> Option<ResourceId> {
        self.inner.binding.get().map(|b| b.id)
    }

    /// Returns the pointee if it is still reachable and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let pointee = self.upgrade()?;
        pointee.downcast::<T>().ok()
    }

    /// True if the handle currently points to `target`.
    pub fn points_to<T: Any + Send + Sync>(&self, target: &Arc<T>) -> bool {
        self.upgrade()
            .is_some_and(|p| addr_of(&p) == Arc::as_ptr(target) as *const () as usize)
    }

    /// True if nothing is reachable through this handle.
    pub fn is_empty(&self) -> bool {
        match &*self.inner.slot.lock() {
            Slot::Empty => true,
            Slot::Strong(_) => false,
            Slot::Weak(w) => w.strong_count() == 0,
        }
    }

    /// True if the handle currently holds a strong pointee.
    pub fn holds_strong(&self) -> bool {
        matches!(&*self.inner.slot.lock(), Slot::Strong(_))
    }

    /// Drops the pointee. Returns `true` if something was set.
    pub fn clear(&self) -> bool {
        let prev = std::mem::replace(&mut *self.inner.slot.lock(), Slot::Empty);
        !matches!(prev, Slot::Empty)
    }

    /// Rebinds the handle to `value`, keeping the declared strength.
    ///
    /// Returns `false` and leaves the handle empty if it has been sealed by
    /// teardown or release.
    pub fn replace<T: Any + Send + Sync>(&self, value: &Arc<T>) -> bool {
        let slot = match self.inner.strength {
            Strength::Strong => {
                let erased: Pointee = value.clone();
                Slot::Strong(erased)
            }
            Strength::Weak => {
                let typed: Weak<T> = Arc::downgrade(value);
                let erased: WeakPointee = typed;
                Slot::Weak(erased)
            }
        };
        let mut guard = self.inner.slot.lock();
        if self.inner.sealed.load(Ordering::Acquire) {
            return false;
        }
        let _prev = std::mem::replace(&mut *guard, slot);
        drop(guard);
        true
    }

    /// True once the supervisor has shut this handle.
    pub fn is_sealed(&self) -> bool {
        self.inner.sealed.load(Ordering::Acquire)
    }

    /// Clears the handle and refuses any later `replace()`.
    ///
    /// Returns `true` if a pointee was dropped.
    pub(crate) fn seal(&self) -> bool {
        let prev = {
            let mut guard = self.inner.slot.lock();
            self.inner.sealed.store(true, Ordering::Release);
            std::mem::replace(&mut *guard, Slot::Empty)
        };
        !matches!(prev, Slot::Empty)
    }

    /// Address of the strong pointee; weak and empty handles have none.
    pub(crate) fn strong_addr(&self) -> Option<usize> {
        match &*self.inner.slot.lock() {
            Slot::Strong(p) => Some(addr_of(p)),
            _ => None,
        }
    }

    pub(crate) fn bind(&self, binding: Binding) -> Result<(), LifecycleError> {
        bind_once(&self.inner.binding, binding)
    }

    fn upgrade(&self) -> Option<Pointee> {
        match &*self.inner.slot.lock() {
            Slot::Empty => None,
            Slot::Strong(p) => Some(p.clone()),
            Slot::Weak(w) => w.upgrade(),
        }
    }
}

fn addr_of(p: &Pointee) -> usize {
    Arc::as_ptr(p) as *const () as usize
}

impl fmt::Debug for ReferenceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceHandle")
            .field("strength", &self.inner.strength)
            .field("scope", &self.scope())
            .field("empty", &self.is_empty())
            .finish()
    }
}
