//! # Update loop thread.
//!
//! One dedicated OS thread per loop generation, named `{prefix}-loop-{generation}`, driving
//! a current-thread tokio runtime. The runtime is built before the thread is spawned so a
//! build failure surfaces from `start()`.
//!
//! ## Architecture
//! ```text
//! spawn_loop()
//!   └─► thread "{prefix}-loop-{gen}"
//!         sleep(initial_delay)                       (cancellable)
//!         first pass                                 (bootstrap captures the thread identity)
//!         loop {
//!           select! (biased) {
//!             token.cancelled()  → exit
//!             jobs.recv()        → job()             (await_sync / execute submissions)
//!             ticker.tick()      → run_pass(now)
//!                                  liveness.touch(now), stats.update(now)
//!           }
//!         }
//! ```
//!
//! ## Rules
//! - Fixed rate: missed ticks are fired back-to-back (`MissedTickBehavior::Burst`).
//! - A cancelled loop never touches liveness again; a replaced (stalled) thread that wakes
//!   up later leaves the pass at the next task boundary.
//! - Panicking jobs are caught and reported; they never kill the loop.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::runtime::{Builder, Handle};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::core::runner::run_pass;
use crate::core::scheduler::Core;
use crate::error::{SchedulerError, TaskError};

/// Closure executed on the loop thread between passes.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Timing parameters of one loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopTiming {
    pub(crate) initial_delay: Duration,
    pub(crate) period: Duration,
}

/// Handle to one loop generation.
pub(crate) struct LoopHandle {
    pub(crate) generation: u64,
    pub(crate) thread_name: String,
    pub(crate) token: CancellationToken,
    pub(crate) jobs: mpsc::UnboundedSender<Job>,
    thread: JoinHandle<()>,
}

impl LoopHandle {
    /// Cancels the loop without joining it.
    ///
    /// Returns `CancelFailed` if the thread already died from a panic.
    pub(crate) fn cancel(self) -> Result<(), SchedulerError> {
        self.token.cancel();
        if self.thread.is_finished() {
            return match self.thread.join() {
                Ok(()) => Ok(()),
                Err(payload) => Err(SchedulerError::CancelFailed {
                    reason: format!(
                        "loop thread '{}' panicked: {}",
                        self.thread_name,
                        TaskError::from_panic(payload)
                    ),
                }),
            };
        }
        Ok(())
    }
}

/// Spawns the loop thread for `generation`.
pub(crate) fn spawn_loop(
    core: Arc<Core>,
    dispatcher: Handle,
    timing: LoopTiming,
    prefix: &str,
    generation: u64,
    token: CancellationToken,
) -> Result<LoopHandle, SchedulerError> {
    let rt = Builder::new_current_thread().enable_time().build()?;
    let (tx, rx) = mpsc::unbounded_channel::<Job>();
    let thread_name = format!("{prefix}-loop-{generation}");

    let loop_token = token.clone();
    let thread = thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || rt.block_on(drive(core, dispatcher, rx, loop_token, timing)))?;

    debug!(thread = %thread_name, generation, "update loop spawned");
    Ok(LoopHandle {
        generation,
        thread_name,
        token,
        jobs: tx,
        thread,
    })
}

async fn drive(
    core: Arc<Core>,
    dispatcher: Handle,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    token: CancellationToken,
    timing: LoopTiming,
) {
    tokio::select! {
        biased;
        _ = token.cancelled() => return,
        _ = time::sleep(timing.initial_delay) => {}
    }

    let mut ticker = time::interval(timing.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    // the first tick is immediate; its pass runs the bootstrap before any job is taken
    ticker.tick().await;
    if pass(&core, &dispatcher, &token) {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                Some(job) = jobs.recv() => run_job(&core, job),
                _ = ticker.tick() => {
                    if !pass(&core, &dispatcher, &token) {
                        break;
                    }
                }
            }
        }
    }
    trace!("update loop exited");
}

/// Runs one pass and records it; returns false once the loop is cancelled.
fn pass(core: &Arc<Core>, dispatcher: &Handle, token: &CancellationToken) -> bool {
    run_pass(core, dispatcher, token, Instant::now());
    if token.is_cancelled() {
        return false;
    }
    let now = Instant::now();
    core.liveness.touch(now);
    core.stats.update(now);
    true
}

fn run_job(core: &Core, job: Job) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
        core.on_error.report(&SchedulerError::Task {
            task: "job".to_string(),
            error: TaskError::from_panic(payload),
        });
    }
}
