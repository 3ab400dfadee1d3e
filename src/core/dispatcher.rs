//! # Async dispatcher: the worker pool behind `is_async()` tasks.
//!
//! A multi-thread tokio runtime owned by one scheduler run:
//! - task advances go to the **blocking pool** (`spawn_blocking`), bounded by the configured
//!   thread count, so a slow task never starves the async workers;
//! - the watchdog, the event fan-out listener and subscriber workers run as ordinary
//!   async tasks on the same runtime.
//!
//! The runtime is shut down in the background on `stop()` (or drop): in-flight blocking
//! advances run to completion, nothing new is accepted.
//!
//! Every thread of the pool (workers and blocking threads) is marked with the id of its
//! dispatcher, so the bridges can tell when a caller already occupies one of its slots.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::SchedulerError;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static DISPATCHER_ID: Cell<u64> = const { Cell::new(0) };
}

pub(crate) struct Dispatcher {
    id: u64,
    handle: Handle,
    rt: Option<Runtime>,
}

impl Dispatcher {
    /// Builds a pool of `threads` workers named `{prefix}-async`.
    pub(crate) fn new(prefix: &str, threads: usize) -> Result<Self, SchedulerError> {
        let threads = threads.max(1);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let rt = Builder::new_multi_thread()
            .worker_threads(threads)
            .max_blocking_threads(threads)
            .thread_name(format!("{prefix}-async"))
            .on_thread_start(move || DISPATCHER_ID.with(|c| c.set(id)))
            .enable_time()
            .build()?;
        Ok(Self {
            id,
            handle: rt.handle().clone(),
            rt: Some(rt),
        })
    }

    /// True on any worker or blocking thread of this pool.
    pub(crate) fn owns_current_thread(&self) -> bool {
        DISPATCHER_ID.with(Cell::get) == self.id
    }

    /// Spawning through the handle after shutdown is a silent no-op.
    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    #[cfg(test)]
    pub(crate) fn is_shut_down(&self) -> bool {
        self.rt.is_none()
    }

    /// Stops accepting work without waiting for in-flight advances.
    pub(crate) fn shutdown(&mut self) {
        if let Some(rt) = self.rt.take() {
            rt.shutdown_background();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
