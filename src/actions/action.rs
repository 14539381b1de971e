//! # Loop action abstraction.
//!
//! A [`LoopAction`] is the body of a [`BackgroundLoop`](crate::BackgroundLoop):
//! it runs once per tick and receives a [`CancellationToken`] that fires when
//! the loop is cancelled or the tick times out.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ActionError;

/// # Asynchronous, cancelable tick body.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use lifebound::{ActionError, LoopAction};
///
/// struct Persist;
///
/// #[async_trait]
/// impl LoopAction for Persist {
///     fn name(&self) -> &str { "persist" }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<(), ActionError> {
///         if ctx.is_cancelled() {
///             return Err(ActionError::Canceled);
///         }
///         // write a timestamp...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait LoopAction: Send + Sync + 'static {
    /// Returns a stable, human-readable name.
    fn name(&self) -> &str;

    /// Runs one tick.
    ///
    /// Implementations that await should watch `ctx` and return
    /// [`ActionError::Canceled`] promptly once it fires.
    async fn run(&self, ctx: CancellationToken) -> Result<(), ActionError>;
}

/// Shared handle to a loop action.
pub type ActionRef = Arc<dyn LoopAction>;
