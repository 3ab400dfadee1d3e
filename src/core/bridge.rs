//! # Synchronization bridge: blocking helpers between caller threads and the scheduler.
//!
//! ```text
//! await_sync(f)   ── on loop thread? ─yes─► f()
//!                                    └no──► loop jobs ──► f() on loop thread ──► oneshot ──► caller
//! await_async(f)  ── on loop or dispatcher thread? ─yes─► f()
//!                                                  └no──► dispatcher.spawn_blocking(f) ──► oneshot ──► caller
//! await_all(ts)   ── register AsyncTask(t, on_done: countdown) for each t; block until 0
//!                    (InvalidArgument on the loop or a dispatcher thread)
//! future(s, c)    ── AsyncTask(s) ──► registers TaskOnce(c(value)) on the loop
//! execute(job)    ── loop jobs (fire-and-forget)
//! ```
//!
//! ## Rules
//! - The short-circuit compares thread identity, so calling from inside a task is
//!   reentrancy-safe and never deadlocks on itself. An async task already holds a
//!   dispatcher slot, so waiting for another one could exhaust a small pool.
//! - Waits block the calling thread (`futures::executor::block_on`); they end with
//!   `Stopped` if the scheduler stops, or the loop is replaced, before the result exists.
//! - A panic inside a submitted closure is returned as `SchedulerError::Task` with
//!   [`TaskError::Panicked`], it never takes down the loop.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::Result as ThreadResult;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::core::latch::Countdown;
use crate::core::scheduler::Scheduler;
use crate::error::{SchedulerError, TaskError};
use crate::tasks::{AsyncTask, TaskOnce, TaskRef};

impl Scheduler {
    /// Runs `f` on the update loop thread and blocks until it returns.
    ///
    /// Called from the loop thread itself, `f` runs immediately.
    pub fn await_sync<T, F>(&self, f: F) -> Result<T, SchedulerError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.on_scheduler_thread() {
            return Ok(f());
        }
        let (jobs, token) = self.loop_channel()?;
        let (tx, rx) = oneshot::channel();
        jobs.send(Box::new(move || {
            let _ = tx.send(catch_unwind(AssertUnwindSafe(f)));
        }))
        .map_err(|_| SchedulerError::Stopped)?;

        wait_for("await_sync", rx, &token)
    }

    /// Runs `f` on the async dispatcher and blocks until it returns.
    ///
    /// Called from the loop thread or from a dispatcher thread, `f` runs immediately.
    pub fn await_async<T, F>(&self, f: F) -> Result<T, SchedulerError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.on_scheduler_thread() || self.on_dispatcher_thread() {
            return Ok(f());
        }
        let (rt, token) = self.run_context()?;
        let (tx, rx) = oneshot::channel();
        let _ = rt.spawn_blocking(move || {
            let _ = tx.send(catch_unwind(AssertUnwindSafe(f)));
        });

        wait_for("await_async", rx, &token)
    }

    /// Registers every task as async with a countdown continuation and blocks until each
    /// task completed and its continuation fired.
    ///
    /// Fails with `Stopped` if the scheduler stops first, and with `InvalidArgument` when
    /// called from the loop thread (the loop could never dispatch the tasks) or from a
    /// dispatcher thread (the tasks may never get a free slot).
    pub fn await_all<I>(&self, tasks: I) -> Result<(), SchedulerError>
    where
        I: IntoIterator<Item = TaskRef>,
    {
        if self.on_scheduler_thread() {
            return Err(SchedulerError::invalid(
                "await_all called from the update loop thread",
            ));
        }
        if self.on_dispatcher_thread() {
            return Err(SchedulerError::invalid(
                "await_all called from an async dispatcher thread",
            ));
        }
        let (_, token) = self.run_context()?;
        let tasks: Vec<TaskRef> = tasks.into_iter().collect();
        if tasks.is_empty() {
            return Ok(());
        }

        let latch = Arc::new(Countdown::new(tasks.len()));
        for task in tasks {
            let l = Arc::clone(&latch);
            let on_done = TaskOnce::arc("await_all", move |_| {
                l.count_down();
                Ok(())
            });
            self.register(Arc::new(AsyncTask::then(task, on_done)));
        }

        futures::executor::block_on(async {
            tokio::select! {
                biased;
                _ = latch.wait() => Ok(()),
                _ = token.cancelled() => Err(SchedulerError::Stopped),
            }
        })
    }

    /// Evaluates `supplier` on the dispatcher, then feeds the value to `consumer` on the
    /// loop thread.
    ///
    /// Panics in either phase are reported like any failed task advance.
    pub fn future<T, S, C>(&self, supplier: S, consumer: C)
    where
        S: FnOnce() -> T + Send + 'static,
        C: FnOnce(T) + Send + 'static,
        T: Send + 'static,
    {
        let registry = Arc::clone(&self.core().registry);
        let produce = TaskOnce::arc("future", move |_| {
            let value = supplier();
            registry.register(TaskOnce::arc("future-consumer", move |_| {
                consumer(value);
                Ok(())
            }));
            Ok(())
        });
        self.register(Arc::new(AsyncTask::new(produce)));
    }

    /// Like [`future`](Self::future), but failures (errors or panics) of either phase go to
    /// `on_error` instead of the scheduler's error handler.
    pub fn future_with<T, S, C, E>(&self, supplier: S, consumer: C, on_error: E)
    where
        S: FnOnce() -> Result<T, TaskError> + Send + 'static,
        C: FnOnce(T) -> Result<(), TaskError> + Send + 'static,
        E: Fn(TaskError) + Send + Sync + 'static,
        T: Send + 'static,
    {
        let registry = Arc::clone(&self.core().registry);
        let on_error = Arc::new(on_error);
        let produce = TaskOnce::arc("future", move |_| {
            let value = match caught(supplier) {
                Ok(value) => value,
                Err(e) => {
                    on_error(e);
                    return Ok(());
                }
            };
            registry.register(TaskOnce::arc("future-consumer", move |_| {
                if let Err(e) = caught(move || consumer(value)) {
                    on_error(e);
                }
                Ok(())
            }));
            Ok(())
        });
        self.register(Arc::new(AsyncTask::new(produce)));
    }

    /// Submits `job` to run on the update loop thread, between passes.
    pub fn execute<F>(&self, job: F) -> Result<(), SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        let (jobs, _) = self.loop_channel()?;
        jobs.send(Box::new(job)).map_err(|_| SchedulerError::Stopped)
    }
}

/// Runs `f`, turning a panic into [`TaskError::Panicked`].
fn caught<T>(f: impl FnOnce() -> Result<T, TaskError>) -> Result<T, TaskError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| Err(TaskError::from_panic(payload)))
}

/// Blocks on `rx` until the result arrives or `token` is cancelled.
fn wait_for<T>(
    what: &str,
    rx: oneshot::Receiver<ThreadResult<T>>,
    token: &CancellationToken,
) -> Result<T, SchedulerError> {
    let res = futures::executor::block_on(async {
        tokio::select! {
            biased;
            res = rx => res.ok(),
            _ = token.cancelled() => None,
        }
    });
    match res {
        Some(Ok(value)) => Ok(value),
        Some(Err(payload)) => Err(SchedulerError::Task {
            task: what.to_string(),
            error: TaskError::from_panic(payload),
        }),
        None => Err(SchedulerError::Stopped),
    }
}
