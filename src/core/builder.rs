use std::sync::Arc;

use super::{config::SchedulerConfig, scheduler::Scheduler, watchdog::WatchdogTimings};
use crate::stats::{RollingStats, SchedulerStats};
use crate::subscribers::Subscribe;

/// Builder for constructing a [`Scheduler`] with optional features.
pub struct SchedulerBuilder {
    cfg: SchedulerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    stats: Option<Arc<dyn SchedulerStats>>,
    timings: WatchdogTimings,
}

impl SchedulerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            stats: None,
            timings: WatchdogTimings::default(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (loop lifecycle, task failures, stalls)
    /// through dedicated workers with bounded queues, started with each run.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the default [`RollingStats`] collector.
    ///
    /// The update loop calls `update` after every pass and `rebase` whenever a loop
    /// (re)starts; [`Scheduler::stats`] hands the collector back for reading.
    pub fn with_stats(mut self, stats: Arc<dyn SchedulerStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_watchdog_timings(mut self, timings: WatchdogTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Builds an idle scheduler; call [`Scheduler::start`] to run it.
    pub fn build(self) -> Arc<Scheduler> {
        let stats = self.stats.unwrap_or_else(|| {
            Arc::new(RollingStats::new(
                self.cfg.period_clamped(),
                self.cfg.stats_window_clamped(),
            ))
        });
        Scheduler::from_parts(self.cfg, self.subscribers, stats, self.timings)
    }
}
