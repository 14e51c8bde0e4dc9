//! # Supervisor configuration.
//!
//! Provides [`SupervisorConfig`], the settings shared by every task of one group.
//!
//! ## Sentinel values
//! - `tick = 0s` → treated as the default 1s (an interval cannot be zero)
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Global configuration for one supervised group.
///
/// ## Field semantics
/// - `tick`: period of the fallback wake-up of the run loop; bounds how late a
///   backoff expiry can be noticed when nothing else changes
/// - `backoff`: default relaunch delay policy for retrying tasks (per-task override in
///   [`TaskSpec`](crate::TaskSpec))
/// - `bus_capacity`: lifecycle event ring buffer size
/// - `handle_os_signals`: request group shutdown on SIGINT/SIGTERM/SIGQUIT (Ctrl-C on Windows)
///   while [`Supervisor::run`](crate::Supervisor::run) is active
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Fallback wake-up period of the run loop.
    pub tick: Duration,

    /// Default backoff policy for tasks registered with `retry = true`.
    pub backoff: BackoffPolicy,

    /// Capacity of the event bus broadcast channel.
    ///
    /// Subscribers lagging behind more than `bus_capacity` events skip older ones.
    pub bus_capacity: usize,

    /// Whether `run` listens for OS termination signals.
    pub handle_os_signals: bool,
}

impl SupervisorConfig {
    /// Returns the tick period, replacing `0s` with the default.
    #[inline]
    pub fn tick_period(&self) -> Duration {
        if self.tick.is_zero() {
            Duration::from_secs(1)
        } else {
            self.tick
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// - `tick = 1s`
    /// - `backoff = BackoffPolicy::default()` (100ms doubling, capped at 3s)
    /// - `bus_capacity = 1024`
    /// - `handle_os_signals = false`
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            backoff: BackoffPolicy::default(),
            bus_capacity: 1024,
            handle_os_signals: false,
        }
    }
}
