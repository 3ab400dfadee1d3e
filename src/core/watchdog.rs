//! # Watchdog: stalled-loop detection and self-healing.
//!
//! Runs on the async dispatcher, independent of the loop period:
//!
//! ```text
//! sleep(grace)
//! every interval:
//!   since = now - liveness.last_update
//!   since >= threshold && loop identity known ?
//!     ├─ no  → nothing
//!     └─ yes → 1. report Stalled{thread, since, suspect} (error handler + LoopStalled)
//!              2. evict the last inline task from the registry (TaskEvicted)
//!              3. cancel + detach the stalled thread
//!              4. spawn generation + 1 on a fresh thread (LoopRestarted)
//! ```
//!
//! Attribution is best-effort: the evicted task is the one dispatched inline right before
//! the stall, which is presumed, not proven, to be the culprit. The remaining registry and
//! the dispatcher are kept.
//!
//! Rust cannot capture another thread's stack, so the report names the thread, the time
//! since the last pass and the suspect instead of carrying a stack snapshot.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::core::scheduler::Scheduler;
use crate::error::SchedulerError;
use crate::events::{Event, EventKind};

/// Watchdog schedule.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WatchdogTimings {
    /// Delay before the first check.
    pub(crate) grace: Duration,
    /// Interval between checks.
    pub(crate) interval: Duration,
    /// Time without a completed pass after which the loop counts as stalled.
    pub(crate) threshold: Duration,
}

impl Default for WatchdogTimings {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            interval: Duration::from_secs(5),
            threshold: Duration::from_secs(5),
        }
    }
}

/// Spawns the periodic check on the dispatcher; exits when `token` is cancelled or the
/// scheduler is gone.
pub(crate) fn spawn(
    sched: Weak<Scheduler>,
    rt: &Handle,
    timings: WatchdogTimings,
    token: CancellationToken,
) {
    rt.spawn(async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = time::sleep(timings.grace) => {}
        }

        let mut ticker = time::interval(timings.interval);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(sched) = sched.upgrade() else { break };
                    check(&sched, timings.threshold, Instant::now());
                }
            }
        }
    });
}

/// Runs one stall check; returns true if the loop was replaced.
pub(crate) fn check(sched: &Arc<Scheduler>, threshold: Duration, now: Instant) -> bool {
    let core = sched.core();
    let since = core.liveness.since_last(now);
    if since < threshold || !core.identity.is_known() {
        return false;
    }
    let Some(generation) = sched.generation() else {
        return false;
    };

    let thread = core
        .identity
        .name()
        .unwrap_or_else(|| "<unknown>".to_string());
    let suspect = core.liveness.take_suspect();
    let suspect_name = suspect.as_ref().map(|t| t.name().to_string());

    error!(thread = %thread, since = ?since, suspect = ?suspect_name, generation, "update loop stalled");
    let mut ev = Event::new(EventKind::LoopStalled)
        .with_thread(thread.as_str())
        .with_elapsed(since)
        .with_generation(generation);
    if let Some(name) = &suspect_name {
        ev = ev.with_task(name.as_str());
    }
    core.bus.publish(ev);
    core.on_error.report(&SchedulerError::Stalled {
        thread,
        since,
        suspect: suspect_name,
    });

    if let Some(task) = suspect {
        if core.registry.unregister(&task) {
            core.bus
                .publish(Event::new(EventKind::TaskEvicted).with_task(task.name()));
        }
    }

    sched.replace_loop(generation, now);
    true
}
