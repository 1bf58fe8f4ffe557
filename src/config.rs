//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings for the supervision
//! runtime. Entry-point options that are not tuning knobs (panic
//! propagation, an existing log tree, metrics observers) live on
//! [`SupervisorBuilder`](crate::SupervisorBuilder) instead.
//!
//! ## Field semantics
//! - `backoff`: delay policy applied to nodes that died unexpectedly
//!   (canceled nodes restart with no delay)
//! - `tick`: restart-planner tick interval; the planner only runs on a tick
//!   that follows a tree change
//! - `settle_cycles`: consecutive change-free ticks before settle waiters
//!   are notified
//! - `log_capacity`: entry capacity of an internally created log tree
//!   (ignored when an existing tree is attached)

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Global configuration for the supervision runtime.
#[derive(Clone, Debug)]
pub struct Config {
    /// Backoff policy for restarting nodes that died unexpectedly.
    pub backoff: BackoffPolicy,

    /// Restart-planner tick interval.
    ///
    /// Bursts of near-simultaneous failures arriving within one tick are
    /// batched into a single planning pass.
    pub tick: Duration,

    /// Number of consecutive change-free planner ticks before the tree is
    /// considered settled and [`Supervisor::settled`](crate::Supervisor::settled)
    /// waiters are released.
    ///
    /// A balance between test speed and test reliability.
    pub settle_cycles: u32,

    /// Capacity of the internally created [`LogTree`](crate::LogTree).
    pub log_capacity: usize,
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `backoff = BackoffPolicy::default()` (500ms × 1.5^n, capped at 60s,
    ///   equal jitter)
    /// - `tick = 1ms`
    /// - `settle_cycles = 50`
    /// - `log_capacity = 4096`
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            tick: Duration::from_millis(1),
            settle_cycles: 50,
            log_capacity: 4096,
        }
    }
}
