//! # Global supervisor configuration.
//!
//! Provides [`Config`] centralized settings for every [`LifecycleSupervisor`](crate::LifecycleSupervisor)
//! built from it.
//!
//! ## Sentinel values
//! - `grace = 0s` → bound loops are aborted right after their tokens are cancelled
//! - `tick_timeout = 0s` → loop actions run without a per-tick timeout
//! - `bus_capacity = 0` → clamped to 1
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use lifebound::Config;
//!
//! let mut cfg = Config::default();
//! cfg.grace = Duration::from_secs(1);
//! cfg.tick_timeout = Duration::from_millis(250);
//!
//! assert_eq!(cfg.action_timeout(), Some(Duration::from_millis(250)));
//! ```

use std::time::Duration;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `grace`: maximum wait for bound loops to stop during teardown (`0s` = abort immediately)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `tick_timeout`: per-tick timeout for loop actions (`0s` = no timeout)
///
/// All fields are public. Prefer the helper accessors to avoid
/// sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time teardown waits for cancelled bound loops to exit.
    ///
    /// Loops still running after `grace` are aborted and reported with
    /// `EventKind::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Receivers that lag behind more than `bus_capacity` messages
    /// observe `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Per-tick timeout applied to background loop actions.
    ///
    /// - `Duration::ZERO` = no timeout
    /// - `> 0` = the action is cancelled and reported as `TimeoutHit`
    pub tick_timeout: Duration,
}

impl Config {
    /// Returns the per-tick action timeout as an `Option`.
    #[inline]
    pub fn action_timeout(&self) -> Option<Duration> {
        if self.tick_timeout == Duration::ZERO {
            None
        } else {
            Some(self.tick_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 5s`
    /// - `bus_capacity = 1024`
    /// - `tick_timeout = 0s` (no timeout)
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            bus_capacity: 1024,
            tick_timeout: Duration::ZERO,
        }
    }
}
