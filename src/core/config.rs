//! # Scheduler configuration.
//!
//! Provides [`SchedulerConfig`] centralized settings for one [`Scheduler`](crate::Scheduler)
//! and [`ErrorHandler`], the sink for task failures and stall diagnostics.
//!
//! ## Sentinel values
//! - `async_threads = 0` → host parallelism (`std::thread::available_parallelism`)
//! - `bus_capacity`, `stats_window` → clamped to a minimum of 1
//! - `period = 0s` → clamped to 1ms (a zero-period interval is invalid)

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use tracing::error;

use crate::error::SchedulerError;

/// Callback receiving every task failure and watchdog stall report.
///
/// Called on the thread that observed the error (loop thread, dispatcher worker or
/// watchdog). It must not block and must not panic.
#[derive(Clone)]
pub struct ErrorHandler(Arc<dyn Fn(&SchedulerError) + Send + Sync>);

impl ErrorHandler {
    /// Wraps a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&SchedulerError) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Reports one error.
    pub fn report(&self, err: &SchedulerError) {
        (self.0)(err)
    }
}

impl Default for ErrorHandler {
    /// Logs through `tracing::error!` and continues.
    fn default() -> Self {
        Self::new(|err| error!(label = err.as_label(), error = %err, "scheduler error"))
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorHandler(..)")
    }
}

/// Configuration for one scheduler instance.
///
/// ## Field semantics
/// - `initial_delay`: wait before the first loop pass after `start()`
/// - `period`: fixed rate of loop passes
/// - `thread_prefix`: prefix for the loop thread (`{prefix}-loop-{generation}`) and dispatcher
///   workers (`{prefix}-async`)
/// - `async_threads`: dispatcher size (`0` = host parallelism)
/// - `stats_window`: number of lateness samples kept by [`RollingStats`](crate::RollingStats)
/// - `bus_capacity`: event bus ring buffer size
/// - `on_error`: sink for task failures and stall reports
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling sentinel
/// checks across the codebase.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Delay before the first pass.
    pub initial_delay: Duration,

    /// Interval between pass starts (fixed rate).
    pub period: Duration,

    /// Thread name prefix.
    pub thread_prefix: String,

    /// Number of async dispatcher threads (`0` = host parallelism).
    pub async_threads: usize,

    /// Rolling stats window size in samples.
    pub stats_window: usize,

    /// Event bus capacity.
    pub bus_capacity: usize,

    /// Error sink.
    pub on_error: ErrorHandler,
}

impl SchedulerConfig {
    /// Returns the dispatcher size with the `0` sentinel resolved.
    #[inline]
    pub fn async_threads_resolved(&self) -> usize {
        match self.async_threads {
            0 => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            n => n,
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a stats window clamped to a minimum of 1.
    #[inline]
    pub fn stats_window_clamped(&self) -> usize {
        self.stats_window.max(1)
    }

    /// Returns the loop period clamped to a minimum of 1ms.
    #[inline]
    pub fn period_clamped(&self) -> Duration {
        self.period.max(Duration::from_millis(1))
    }
}

impl Default for SchedulerConfig {
    /// Default configuration:
    ///
    /// - `initial_delay = 0s`
    /// - `period = 20ms`
    /// - `thread_prefix = "moe"`
    /// - `async_threads = 0` (host parallelism)
    /// - `stats_window = 3000` (~60s of history at 20ms)
    /// - `bus_capacity = 1024`
    /// - `on_error = log via tracing`
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            period: Duration::from_millis(20),
            thread_prefix: "moe".to_string(),
            async_threads: 0,
            stats_window: 3000,
            bus_capacity: 1024,
            on_error: ErrorHandler::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_sentinels_resolve() {
        let cfg = SchedulerConfig {
            async_threads: 0,
            bus_capacity: 0,
            stats_window: 0,
            period: Duration::ZERO,
            ..SchedulerConfig::default()
        };
        assert!(cfg.async_threads_resolved() >= 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.stats_window_clamped(), 1);
        assert_eq!(cfg.period_clamped(), Duration::from_millis(1));
    }

    #[test]
    fn test_defaults() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.thread_prefix, "moe");
        assert_eq!(cfg.period, Duration::from_millis(20));
        assert_eq!(cfg.initial_delay, Duration::ZERO);
        assert_eq!(cfg.stats_window, 3000);
    }

    #[test]
    fn test_custom_error_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let handler = ErrorHandler::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        handler.report(&SchedulerError::Stopped);
        handler.clone().report(&SchedulerError::NotStarted);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(format!("{handler:?}"), "ErrorHandler(..)");
    }
}
