//! # Owner: an entity with a two-state lifecycle.
//!
//! An [`Owner`] starts `Active` and moves to `Destroyed` exactly once. Every
//! [`OwnerListener`] attached while it is active is notified, in attach order,
//! when [`Owner::destroy`] runs.
//!
//! ```text
//!   Owner::create() ──► Active ──destroy()──► Destroyed
//!                         │                      │
//!                   attach(listener)     listener.owner_destroyed(id)   (each, in order)
//! ```
//!
//! ## Rules
//! - `destroy` succeeds once; a second call returns [`LifecycleError::InvalidState`].
//! - Attaching to a destroyed owner is rejected.
//! - Listeners are taken out of the owner before they are awaited, so the owner
//!   keeps no reference to them after teardown.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::LifecycleError;
use crate::resources::OwnerId;

const ACTIVE: u8 = 0;
const DESTROYED: u8 = 1;

/// Lifecycle state of an [`Owner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerState {
    Active,
    Destroyed,
}

/// Receives the owner's destruction notice.
#[async_trait]
pub trait OwnerListener: Send + Sync + 'static {
    /// Called once, after the owner has moved to `Destroyed`.
    async fn owner_destroyed(&self, owner: OwnerId);
}

/// Entity whose lifetime bounds the resources registered against it.
pub struct Owner {
    id: OwnerId,
    state: AtomicU8,
    listeners: Mutex<Vec<Arc<dyn OwnerListener>>>,
}

impl Owner {
    /// Creates a new active owner.
    pub fn create() -> Arc<Self> {
        Arc::new(Self {
            id: OwnerId::next(),
            state: AtomicU8::new(ACTIVE),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> OwnerId {
        self.id
    }

    pub fn state(&self) -> OwnerState {
        match self.state.load(Ordering::Acquire) {
            ACTIVE => OwnerState::Active,
            _ => OwnerState::Destroyed,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.state() == OwnerState::Destroyed
    }

    /// Adds a listener to be notified on destruction.
    pub fn attach(&self, listener: Arc<dyn OwnerListener>) -> Result<(), LifecycleError> {
        let mut listeners = self.listeners.lock();
        if self.is_destroyed() {
            return Err(LifecycleError::InvalidState {
                owner: self.id,
                reason: "owner_destroyed",
            });
        }
        listeners.push(listener);
        Ok(())
    }

    /// Number of attached listeners (zero after destruction).
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Moves the owner to `Destroyed` and notifies every listener in attach order.
    ///
    /// # Errors
    /// [`LifecycleError::InvalidState`] if the owner is already destroyed.
    pub async fn destroy(&self) -> Result<(), LifecycleError> {
        let listeners = {
            let mut guard = self.listeners.lock();
            self.state
                .compare_exchange(ACTIVE, DESTROYED, Ordering::AcqRel, Ordering::Acquire)
                .map_err(|_| LifecycleError::InvalidState {
                    owner: self.id,
                    reason: "already_destroyed",
                })?;
            std::mem::take(&mut *guard)
        };

        tracing::debug!(owner = %self.id, listeners = listeners.len(), "owner destroyed");
        for listener in listeners {
            listener.owner_destroyed(self.id).await;
        }
        Ok(())
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
