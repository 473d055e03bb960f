//! # Backoff policy for respawning exited processes.
//!
//! [`BackoffPolicy`] controls how long a supervisor waits between a process exit
//! and the next spawn. It is parameterized by:
//! - [`BackoffPolicy::step`] the amount added on each consecutive exit;
//! - [`BackoffPolicy::max`] the cap; exceeding it wraps back to the floor;
//! - [`BackoffPolicy::floor`] the delay used after a wrap;
//! - [`BackoffPolicy::stable_after`] uptime after which a run counts as stable.
//!
//! A process that crash-loops climbs the ladder `step, 2×step, …, max` and then
//! starts over at `floor`. A process that ran longer than `stable_after` before
//! exiting restarts the ladder from zero, so its next delay is exactly `step`.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use overseer::BackoffPolicy;
//!
//! let backoff = BackoffPolicy::default();
//! let quick = Duration::from_secs(30);
//!
//! let d1 = backoff.next(Duration::ZERO, quick);
//! assert_eq!(d1, Duration::from_secs(10));
//!
//! let d2 = backoff.next(d1, quick);
//! assert_eq!(d2, Duration::from_secs(20));
//!
//! // A long, healthy run resets the ladder.
//! let d3 = backoff.next(d2, Duration::from_secs(600));
//! assert_eq!(d3, Duration::from_secs(10));
//! ```

use std::time::Duration;

/// Respawn backoff policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Amount added to the previous delay on each exit.
    pub step: Duration,
    /// Largest delay ever returned; anything above wraps to `floor`.
    pub max: Duration,
    /// Delay used after the ladder wraps.
    pub floor: Duration,
    /// Runs longer than this reset the ladder before stepping.
    pub stable_after: Duration,
}

impl Default for BackoffPolicy {
    /// Returns a policy with:
    /// - `step = 10s`;
    /// - `max = 60s`;
    /// - `floor = 10s`;
    /// - `stable_after = 3min`.
    fn default() -> Self {
        Self {
            step: Duration::from_secs(10),
            max: Duration::from_secs(60),
            floor: Duration::from_secs(10),
            stable_after: Duration::from_secs(180),
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay before the next spawn.
    ///
    /// `prev` is the delay used before the run that just ended (`Duration::ZERO`
    /// for the first exit); `uptime` is how long that run lasted.
    ///
    /// # Notes
    /// - `uptime` strictly greater than `stable_after` resets the base to zero.
    /// - The result is never clamped to `max`: it wraps to `floor` instead.
    pub fn next(&self, prev: Duration, uptime: Duration) -> Duration {
        let base = if uptime > self.stable_after {
            Duration::ZERO
        } else {
            prev
        };

        let delay = base.saturating_add(self.step);
        if delay > self.max { self.floor } else { delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUICK: Duration = Duration::from_secs(30);

    #[test]
    fn test_first_exit_returns_step() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next(Duration::ZERO, QUICK), Duration::from_secs(10));
    }

    #[test]
    fn test_crash_loop_ladder_wraps_to_floor() {
        let policy = BackoffPolicy::default();

        let mut delay = Duration::ZERO;
        let mut seen = Vec::new();
        for _ in 0..9 {
            delay = policy.next(delay, QUICK);
            seen.push(delay.as_secs());
        }
        assert_eq!(seen, [10, 20, 30, 40, 50, 60, 10, 20, 30]);
    }

    #[test]
    fn test_stable_run_resets_ladder() {
        let policy = BackoffPolicy::default();
        let long = Duration::from_secs(181);

        assert_eq!(policy.next(Duration::from_secs(50), long), Duration::from_secs(10));
        assert_eq!(policy.next(Duration::from_secs(60), long), Duration::from_secs(10));
    }

    #[test]
    fn test_exactly_stable_after_does_not_reset() {
        let policy = BackoffPolicy::default();
        let edge = policy.stable_after;
        assert_eq!(policy.next(Duration::from_secs(20), edge), Duration::from_secs(30));
    }

    #[test]
    fn test_custom_constants() {
        let policy = BackoffPolicy {
            step: Duration::from_secs(3),
            max: Duration::from_secs(30),
            floor: Duration::from_secs(5),
            stable_after: Duration::from_secs(60),
        };

        let mut delay = Duration::ZERO;
        let mut seen = Vec::new();
        for _ in 0..11 {
            delay = policy.next(delay, Duration::from_secs(1));
            seen.push(delay.as_secs());
        }
        assert_eq!(seen, [3, 6, 9, 12, 15, 18, 21, 24, 27, 30, 5]);
    }

    #[test]
    fn test_huge_prev_wraps_instead_of_overflowing() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next(Duration::MAX, QUICK), policy.floor);
    }
}
