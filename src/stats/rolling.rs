//! # Rolling lateness window.
//!
//! ```text
//! update(now)
//!   ├─ first call      → remember now, no sample
//!   └─ later calls     → sample = max(now - last - period, 0)
//!                        ring[idx] = sample, sum += sample - evicted
//! ```
//!
//! `avg` is O(1) via the running sum; `max` scans the window. The window never resizes.

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::SchedulerStats;
use crate::tasks::lock;

/// Coarse load classification derived from the average lateness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Load {
    /// Average lateness below half a period.
    Healthy,
    /// Average lateness at or above half a period.
    Busy,
    /// Average lateness at or above a full period.
    Overloaded,
}

impl fmt::Display for Load {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Load::Healthy => "healthy",
            Load::Busy => "over half load",
            Load::Overloaded => "overloaded, passes are taking too long",
        })
    }
}

#[derive(Debug)]
struct Window {
    samples: Box<[Duration]>,
    idx: usize,
    filled: usize,
    sum: Duration,
    last: Option<Instant>,
}

impl Window {
    fn roll(&mut self, sample: Duration) {
        if self.filled < self.samples.len() {
            self.filled += 1;
        }
        self.sum -= self.samples[self.idx];
        self.sum += sample;
        self.samples[self.idx] = sample;
        self.idx = (self.idx + 1) % self.samples.len();
    }
}

/// Fixed-capacity ring of per-pass lateness samples.
#[derive(Debug)]
pub struct RollingStats {
    period: Duration,
    window: Mutex<Window>,
}

impl RollingStats {
    /// Creates a window of `capacity` samples (clamped to a minimum of 1).
    pub fn new(period: Duration, capacity: usize) -> Self {
        Self {
            period,
            window: Mutex::new(Window {
                samples: vec![Duration::ZERO; capacity.max(1)].into_boxed_slice(),
                idx: 0,
                filled: 0,
                sum: Duration::ZERO,
                last: None,
            }),
        }
    }

    /// Window capacity.
    pub fn capacity(&self) -> usize {
        lock(&self.window).samples.len()
    }

    /// Number of samples recorded so far (at most the capacity).
    pub fn samples(&self) -> usize {
        lock(&self.window).filled
    }

    /// Classifies the current average lateness against the period.
    pub fn load(&self) -> Load {
        let avg = self.avg();
        if avg >= self.period {
            Load::Overloaded
        } else if avg >= self.period / 2 {
            Load::Busy
        } else {
            Load::Healthy
        }
    }
}

impl SchedulerStats for RollingStats {
    fn update(&self, now: Instant) {
        let mut w = lock(&self.window);
        if let Some(last) = w.last {
            let sample = now
                .saturating_duration_since(last)
                .saturating_sub(self.period);
            w.roll(sample);
        }
        w.last = Some(now);
    }

    fn rebase(&self) {
        lock(&self.window).last = None;
    }

    fn max(&self) -> Duration {
        lock(&self.window)
            .samples
            .iter()
            .copied()
            .max()
            .unwrap_or_default()
    }

    fn avg(&self) -> Duration {
        let w = lock(&self.window);
        match u32::try_from(w.filled) {
            Ok(0) => Duration::ZERO,
            Ok(n) => w.sum / n,
            Err(_) => w.sum.div_f64(w.filled as f64),
        }
    }
}

impl fmt::Display for RollingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: last {} passes, max {:?}, avg {:?}",
            self.load(),
            self.capacity(),
            self.max(),
            self.avg()
        )
    }
}
