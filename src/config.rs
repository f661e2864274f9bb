//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the management runtime.
//!
//! Config is used in two ways:
//! 1. **Context creation**: `ManagementContext::new(config, subscribers)`
//! 2. **Shutdown coordination**: `ShutdownCoordinator::with_config(installer, config)`
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no global semaphore created)
//! - `grace = 0s` → the exit hook waits for every stop without a deadline

use std::time::Duration;

/// Global configuration for the management runtime.
///
/// ## Field semantics
/// - `grace`: Maximum total wait for stop-on-shutdown tasks (`0s` = unbounded)
/// - `max_concurrent`: Limit on concurrently running submitted tasks (`0` = unlimited)
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time the exit hook waits for issued stop invocations (opt-in).
    ///
    /// When the hook fires:
    /// - A stop is issued for every registered entity
    /// - The hook awaits each stop in registration order
    /// - Once `grace` has elapsed the remaining entities are reported as stuck
    pub grace: Duration,

    /// Maximum number of submitted tasks running at once, across all entities.
    ///
    /// - `0` = unlimited (no semaphore)
    /// - `n > 0` = at most `n` tasks run simultaneously
    pub max_concurrent: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the global concurrency limit as an `Option`.
    ///
    /// - `None` → unlimited (no semaphore)
    /// - `Some(n)` → at most `n` concurrent tasks
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns the shutdown grace period as an `Option`.
    ///
    /// - `None` → wait for every stop without a deadline
    /// - `Some(d)` → stop waiting once `d` has elapsed
    #[inline]
    pub fn shutdown_grace(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
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
    /// - `grace = 0s` (the exit hook waits until every stop attempt is terminal)
    /// - `max_concurrent = 0` (unlimited)
    /// - `bus_capacity = 1024` (good baseline)
    fn default() -> Self {
        Self {
            grace: Duration::ZERO,
            max_concurrent: 0,
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sentinels_mean_unbounded() {
        let cfg = Config {
            grace: Duration::ZERO,
            max_concurrent: 0,
            bus_capacity: 0,
        };
        assert_eq!(cfg.concurrency_limit(), None);
        assert_eq!(cfg.shutdown_grace(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.shutdown_grace(), None);
        assert_eq!(cfg.concurrency_limit(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1024);
    }
}
