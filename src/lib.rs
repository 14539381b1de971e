//! # lifebound
//!
//! **Lifebound** binds deferred callbacks, periodic background loops and object
//! references to the lifetime of an owning entity, and releases them when the
//! owner is destroyed.
//!
//! Every resource is registered with a [`Scope`]:
//! - [`Scope::Bound`]: cleared, cancelled or stopped when the owner is destroyed;
//! - [`Scope::Detached`]: left alone, survives the owner and shows up as a leak.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐
//!   │ ReferenceHandle │  │  ScheduledTask  │  │ BackgroundLoop  │
//!   │ (strong / weak) │  │ (once / repeat) │  │ (token + action)│
//!   └────────┬────────┘  └────────┬────────┘  └────────┬────────┘
//!            ▼ register(r, scope) ▼                    ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  LifecycleSupervisor (one per Owner)                              │
//! │  - Registry (id → resource, scope)                                │
//! │  - Scheduler (virtual clock, fires tasks)                         │
//! │  - scope token (parent of bound loop tokens)                      │
//! │  - Bus (broadcast events)                                         │
//! └──────┬───────────────────────────────────────────────────┬────────┘
//!        │ Owner::destroy() ─► on_owner_destroyed()           │
//!        ▼                                                    ▼
//!   Bound: clear / cancel / stop + join          Bus ─► SubscriberSet ─► LeakDetector,
//!   Detached: kept, DetachedRetained                                     LogWriter, ...
//! ```
//!
//! ### Lifecycle
//! ```text
//! Owner::create() ──► Active ──destroy()──► Destroyed
//!                                  │
//!                                  └─► LifecycleSupervisor::on_owner_destroyed()
//!                                        ├─ publish OwnerDestroyed
//!                                        ├─ Bound handles   → clear()
//!                                        ├─ Bound tasks     → cancel()   (never fire again)
//!                                        ├─ Bound loops     → token.cancel(), join within grace
//!                                        ├─ Detached        → DetachedRetained
//!                                        └─ publish TeardownCompleted
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                               |
//! |-------------------|----------------------------------------------------------------|--------------------------------------------------|
//! | **Owners**        | Two-state lifecycle with destruction listeners.                | [`Owner`], [`OwnerListener`]                     |
//! | **Resources**     | References, deferred tasks and background loops.               | [`ReferenceHandle`], [`ScheduledTask`], [`BackgroundLoop`] |
//! | **Supervision**   | Registration, release and teardown per owner.                  | [`LifecycleSupervisor`], [`SupervisorBuilder`]   |
//! | **Leak checks**   | Registry inspection and post-destroy firing tracking.          | [`LeakDetector`], [`LeakReport`]                 |
//! | **Subscriber API**| Hook into lifecycle events.                                    | [`Subscribe`], [`SubscriberSet`]                 |
//! | **Errors**        | Typed errors and non-error outcomes.                           | [`LifecycleError`], [`ActionError`], [`LeakError`] |
//! | **Configuration** | Grace period, bus capacity, per-tick timeout.                  | [`Config`]                                       |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use lifebound::{LeakDetector, LifecycleSupervisor, Owner, ReferenceHandle, Scope};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let owner = Owner::create();
//!     let sup = LifecycleSupervisor::attach(&owner)?;
//!
//!     // A bound reference is cleared with the owner...
//!     let bound = ReferenceHandle::strong(owner.clone());
//!     sup.register(&bound, Scope::Bound).await?;
//!
//!     // ...a detached one keeps it alive.
//!     let singleton = ReferenceHandle::strong(owner.clone());
//!     sup.register(&singleton, Scope::Detached).await?;
//!
//!     owner.destroy().await?;
//!
//!     assert!(bound.is_empty());
//!     assert!(singleton.points_to(&owner));
//!     assert!(sup.is_leaking().await);
//!
//!     let report = LeakDetector::new().inspect(&sup).await;
//!     assert_eq!(report.retained_strong.len(), 1);
//!     Ok(())
//! }
//! ```

mod actions;
mod config;
mod core;
mod error;
mod events;
mod resources;
mod subscribers;

// ---- Public re-exports ----

pub use actions::{ActionFn, ActionRef, LoopAction};
pub use config::Config;
pub use core::{
    LeakDetector, LeakReport, LifecycleSupervisor, Owner, OwnerListener, OwnerState,
    ResourceInfo, Scheduler, SupervisorBuilder, TeardownReport,
};
pub use error::{ActionError, CancelOutcome, LeakError, LifecycleError, ReleaseOutcome};
pub use events::{Bus, Event, EventKind};
pub use resources::{
    BackgroundLoop, OwnerId, ReferenceHandle, Resource, ResourceId, ResourceKind,
    ScheduledTask, Scope, Strength,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
