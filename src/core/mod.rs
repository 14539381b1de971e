//! Runtime core: owners, scheduling, loops and the supervisor.
//!
//! Public API from this module: [`Owner`], [`Scheduler`], [`LifecycleSupervisor`]
//! (with its builder and reports) and [`LeakDetector`].
//!
//! Internal modules:
//! - [`owner`]: two-state owner and its destruction listeners;
//! - [`scheduler`]: virtual-time queue firing scheduled tasks;
//! - [`looper`]: actor driving one background loop;
//! - [`runner`]: executes one loop tick with timeout/cancellation and event publishing;
//! - [`registry`]: per-owner resource map;
//! - [`supervisor`]: registration, release and teardown;
//! - [`builder`]: wires bus, subscribers and scheduler;
//! - [`leak`]: leak inspection and post-destroy firing tracking.

mod builder;
mod leak;
mod looper;
mod owner;
mod registry;
mod runner;
mod scheduler;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use leak::{LeakDetector, LeakReport};
pub use owner::{Owner, OwnerListener, OwnerState};
pub use scheduler::Scheduler;
pub use supervisor::{LifecycleSupervisor, ResourceInfo, TeardownReport};

pub(crate) use looper::LoopActor;
