//! # Loop latency statistics.
//!
//! The update loop reports the completion time of every pass to a [`SchedulerStats`]
//! collector. [`RollingStats`] is the built-in collector: a fixed window of per-pass
//! lateness samples (pass interval minus the configured period, floored at zero).
//! Another collector can be plugged in with
//! [`SchedulerBuilder::with_stats`](crate::SchedulerBuilder::with_stats).

mod rolling;

pub use rolling::{Load, RollingStats};

use std::time::{Duration, Instant};

/// Collector fed once per completed loop pass.
pub trait SchedulerStats: Send + Sync + 'static {
    /// Records the completion time of one pass.
    fn update(&self, now: Instant);

    /// Largest lateness sample in the window.
    fn max(&self) -> Duration;

    /// Mean lateness over the samples recorded so far (zero when empty).
    fn avg(&self) -> Duration;

    /// Called when a loop (re)starts: the next `update` opens a new interval instead of
    /// measuring the gap since the previous run.
    fn rebase(&self) {}
}
