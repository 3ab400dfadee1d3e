//! # LogWriter - events rendered through `tracing`
//!
//! A minimal subscriber that forwards incoming [`Event`]s to `tracing` with structured
//! fields. Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  tickvisor: loop started thread="moe-loop-0" generation=0
//! WARN  tickvisor: task failed task="flaky" reason="execution failed: boom"
//! ERROR tickvisor: loop stalled thread="moe-loop-0" suspect="spin" elapsed_ms=5012
//! WARN  tickvisor: task evicted task="spin"
//! INFO  tickvisor: loop restarted thread="moe-loop-1" generation=1
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        let thread = e.thread.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::LoopStarted => {
                info!(target: "tickvisor", seq = e.seq, thread, generation = ?e.generation, "loop started");
            }
            EventKind::LoopStopped => {
                info!(target: "tickvisor", seq = e.seq, generation = ?e.generation, "loop stopped");
            }
            EventKind::LoopStalled => {
                error!(
                    target: "tickvisor",
                    seq = e.seq,
                    thread,
                    suspect = task,
                    elapsed_ms = ?e.elapsed_ms,
                    "loop stalled"
                );
            }
            EventKind::LoopRestarted => {
                info!(target: "tickvisor", seq = e.seq, thread, generation = ?e.generation, "loop restarted");
            }
            EventKind::TaskFailed => {
                warn!(target: "tickvisor", seq = e.seq, task, reason, "task failed");
            }
            EventKind::TaskPruned => {
                debug!(target: "tickvisor", seq = e.seq, task, "task pruned");
            }
            EventKind::TaskEvicted => {
                warn!(target: "tickvisor", seq = e.seq, task, "task evicted");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "tickvisor", seq = e.seq, subscriber = task, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(target: "tickvisor", seq = e.seq, subscriber = task, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
