//! # Function-backed loop action (`ActionFn`)
//!
//! [`ActionFn`] wraps a closure `F: Fn(CancellationToken) -> Fut`, producing a
//! fresh future per tick. State shared between ticks goes in an explicit
//! `Arc<...>` captured by the closure.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use lifebound::{ActionError, ActionFn, ActionRef};
//!
//! let a: ActionRef = ActionFn::arc("persist", |_ctx: CancellationToken| async move {
//!     Ok::<_, ActionError>(())
//! });
//! assert_eq!(a.name(), "persist");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::actions::LoopAction;
use crate::error::ActionError;

/// Function-backed action implementation.
#[derive(Debug)]
pub struct ActionFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ActionFn<F> {
    /// Creates a new function-backed action.
    ///
    /// Prefer [`ActionFn::arc`] when you immediately need an [`ActionRef`](crate::ActionRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the action and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> LoopAction for ActionFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), ActionError> {
        (self.f)(ctx).await
    }
}
