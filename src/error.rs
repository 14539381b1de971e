//! Error types used by the supervisor and by loop actions.
//!
//! This module defines:
//!
//! - [`LifecycleError`] - errors raised by owner/supervisor operations.
//! - [`ActionError`] - errors raised by a single background loop tick.
//! - [`LeakError`] - verification failure reported by [`LeakDetector`](crate::LeakDetector).
//!
//! Conditions that are *not* errors (releasing an unknown id, cancelling an
//! already-cancelled task) are surfaced as [`ReleaseOutcome`] and
//! [`CancelOutcome`] instead.

use std::time::Duration;
use thiserror::Error;

use crate::resources::{OwnerId, ResourceId};

/// # Errors produced by lifecycle operations.
///
/// None of these is fatal to the process; all are local, recoverable states.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// Operation not allowed in the owner's current lifecycle state
    /// (registering against a destroyed owner, destroying twice).
    #[error("invalid state for {owner}: {reason}")]
    InvalidState {
        /// Owner the operation targeted.
        owner: OwnerId,
        /// Short stable reason code.
        reason: &'static str,
    },

    /// The resource is already registered; its scope was fixed at that time.
    #[error("resource already registered as {existing}")]
    AlreadyRegistered {
        /// Id given out by the first registration.
        existing: ResourceId,
    },

    /// A repeating task or loop was declared with a zero period.
    #[error("invalid period {period:?}: repeating work needs a non-zero period")]
    InvalidPeriod {
        /// The rejected period.
        period: Duration,
    },

    /// A background loop or subscriber set needs a tokio runtime and none is running.
    #[error("no tokio runtime available")]
    NoRuntime,
}

impl LifecycleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use lifebound::LifecycleError;
    ///
    /// let err = LifecycleError::InvalidPeriod { period: Duration::ZERO };
    /// assert_eq!(err.as_label(), "lifecycle_invalid_period");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleError::InvalidState { .. } => "lifecycle_invalid_state",
            LifecycleError::AlreadyRegistered { .. } => "lifecycle_already_registered",
            LifecycleError::InvalidPeriod { .. } => "lifecycle_invalid_period",
            LifecycleError::NoRuntime => "lifecycle_no_runtime",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            LifecycleError::InvalidState { owner, reason } => {
                format!("invalid state: owner={owner} reason={reason}")
            }
            LifecycleError::AlreadyRegistered { existing } => {
                format!("already registered: id={existing}")
            }
            LifecycleError::InvalidPeriod { period } => format!("invalid period: {period:?}"),
            LifecycleError::NoRuntime => "no tokio runtime".to_string(),
        }
    }
}

/// # Errors produced by one loop action tick.
///
/// Retryable errors (`Fail`, `Timeout`) let the loop continue with the next
/// period; `Fatal` stops the loop; `Canceled` is a graceful exit.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ActionError {
    /// Tick exceeded the configured per-tick timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable error; the loop stops.
    #[error("fatal error (loop stops): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Tick failed; the loop keeps running.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Action observed cancellation and exited.
    #[error("context cancelled")]
    Canceled,
}

impl ActionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ActionError::Timeout { .. } => "action_timeout",
            ActionError::Fatal { .. } => "action_fatal",
            ActionError::Fail { .. } => "action_failed",
            ActionError::Canceled => "action_canceled",
        }
    }

    /// Indicates whether the loop may run the next tick after this error.
    ///
    /// # Example
    /// ```
    /// use lifebound::ActionError;
    ///
    /// assert!(ActionError::Fail { error: "disk full".into() }.is_retryable());
    /// assert!(!ActionError::Fatal { error: "gone".into() }.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActionError::Fail { .. } | ActionError::Timeout { .. })
    }
}

/// # Leak verification failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeakError {
    /// Detached resources keep the destroyed owner reachable or can still fire.
    #[error("{owner} leaks: retained={retained:?} live={live:?}")]
    Leaking {
        owner: OwnerId,
        /// Detached strong references to the owner.
        retained: Vec<ResourceId>,
        /// Detached tasks/loops that can still fire.
        live: Vec<ResourceId>,
    },

    /// Bound resources survived teardown.
    #[error("{owner} teardown incomplete: bound={bound:?}")]
    BoundSurvived {
        owner: OwnerId,
        bound: Vec<ResourceId>,
    },
}

/// Result of [`LifecycleSupervisor::release`](crate::LifecycleSupervisor::release).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The resource was removed and cleared/cancelled.
    Released,
    /// No entry with that id; nothing happened.
    Unknown,
}

/// Result of cancelling a task or loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// This call performed the cancellation.
    Cancelled,
    /// It was already cancelled; nothing happened.
    AlreadyCancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        let err = LifecycleError::InvalidState {
            owner: OwnerId::next(),
            reason: "owner_destroyed",
        };
        assert_eq!(err.as_label(), "lifecycle_invalid_state");
        assert!(err.as_message().contains("owner_destroyed"));
        assert_eq!(ActionError::Canceled.as_label(), "action_canceled");
    }

    #[test]
    fn test_retryable() {
        assert!(ActionError::Timeout { timeout: Duration::from_secs(1) }.is_retryable());
        assert!(!ActionError::Canceled.is_retryable());
    }
}
