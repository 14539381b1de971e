//! # Background loop bodies.
//!
//! - [`LoopAction`] - trait for one async, cancelable tick
//! - [`ActionFn`] - closure-backed implementation
//! - [`ActionRef`] - shared reference (`Arc<dyn LoopAction>`)

mod action;
mod action_fn;

pub use action::{ActionRef, LoopAction};
pub use action_fn::ActionFn;
