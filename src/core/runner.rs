//! # One pass of the update loop.
//!
//! Advances every registered task once, inline or on the async dispatcher, and prunes
//! tasks that report complete.
//!
//! ## Flow
//! ```text
//! run_pass(now)
//!   for task in registry.snapshot():
//!     ├─ token cancelled?  → return (loop replaced or stopped mid-pass)
//!     ├─ is_async()        → dispatcher.spawn_blocking(advance + settle)   (fire-and-forget)
//!     └─ inline            → liveness.set_suspect(task)
//!                            advance_caught(task, now) → settle
//!
//! settle(task, result)
//!   ├─ Err(e)              → on_error(Task{..}) + publish TaskFailed   (task stays registered)
//!   └─ task.is_complete()  → registry.unregister(task) + publish TaskPruned
//! ```
//!
//! ## Rules
//! - A failing advance never stops the pass; the task is advanced again next pass.
//! - Panics are caught at this boundary and reported as [`TaskError::Panicked`](crate::TaskError).
//! - Only inline tasks are recorded as the watchdog suspect.

use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::core::scheduler::Core;
use crate::error::{SchedulerError, TaskError};
use crate::events::{Event, EventKind};
use crate::tasks::{TaskRef, advance_caught};

/// Runs one pass over a registry snapshot taken at `now`.
pub(crate) fn run_pass(
    core: &Arc<Core>,
    dispatcher: &Handle,
    token: &CancellationToken,
    now: Instant,
) {
    for task in core.registry.snapshot() {
        if token.is_cancelled() {
            return;
        }
        if task.is_async() {
            dispatch(core, dispatcher, task, now);
        } else {
            core.liveness.set_suspect(&task);
            let res = advance_caught(task.as_ref(), now);
            settle(core, &task, res);
        }
    }
}

/// Hands an async task to the dispatcher's blocking pool.
fn dispatch(core: &Arc<Core>, dispatcher: &Handle, task: TaskRef, now: Instant) {
    let core = Arc::clone(core);
    // the JoinHandle is dropped: async advances are fire-and-forget
    let _ = dispatcher.spawn_blocking(move || {
        let res = advance_caught(task.as_ref(), now);
        settle(&core, &task, res);
    });
}

/// Reports a failed advance and prunes a completed task.
pub(crate) fn settle(core: &Core, task: &TaskRef, res: Result<(), TaskError>) {
    if let Err(error) = res {
        report_failure(core, task.name(), error);
    }
    if task.is_complete() && core.registry.unregister(task) {
        core.bus
            .publish(Event::new(EventKind::TaskPruned).with_task(task.name()));
    }
}

fn report_failure(core: &Core, name: &str, error: TaskError) {
    core.bus.publish(
        Event::new(EventKind::TaskFailed)
            .with_task(name)
            .with_reason(error.to_string()),
    );
    core.on_error.report(&SchedulerError::Task {
        task: name.to_string(),
        error,
    });
}
