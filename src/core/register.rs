//! Convenience registration: build a decorated task and register it in one call.
//!
//! Every helper returns the handle it registered, so the caller can `unregister` it later.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::scheduler::Scheduler;
use crate::error::{SchedulerError, TaskError};
use crate::tasks::{AsyncTask, Gated, RepeatMode, Repeating, Retry, TaskFn, TaskRef};

impl Scheduler {
    fn add(&self, task: TaskRef) -> TaskRef {
        self.register(Arc::clone(&task));
        task
    }

    /// Registers a closure that runs on the loop thread until it first succeeds.
    pub fn register_fn<F>(&self, name: impl Into<Cow<'static, str>>, f: F) -> TaskRef
    where
        F: Fn(Instant) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        self.add(TaskFn::arc(name, f))
    }

    /// Registers `task` to be advanced on the async dispatcher.
    pub fn register_async(&self, task: TaskRef) -> TaskRef {
        self.add(AsyncTask::arc(task))
    }

    /// Registers `task` on the async dispatcher; `on_done` runs once `task` completed.
    pub fn register_async_then(&self, task: TaskRef, on_done: TaskRef) -> TaskRef {
        self.add(Arc::new(AsyncTask::then(task, on_done)))
    }

    /// Registers `task` to run once, `delay` from now.
    pub fn register_delayed(&self, task: TaskRef, delay: Duration) -> TaskRef {
        self.add(Arc::new(Gated::delay(task, delay)))
    }

    /// Registers `task` to run once, `delay` after `start`.
    pub fn register_delayed_from(&self, task: TaskRef, delay: Duration, start: Instant) -> TaskRef {
        self.add(Arc::new(Gated::delay_from(task, delay, start)))
    }

    /// Registers `task` to run once, on the `ticks`-th pass.
    pub fn register_tick(&self, task: TaskRef, ticks: u64) -> Result<TaskRef, SchedulerError> {
        Ok(self.add(Arc::new(Gated::ticks(task, ticks)?)))
    }

    /// Registers `task` to run every pass until `mode` says done.
    pub fn register_repeating(&self, task: TaskRef, mode: impl Into<RepeatMode>) -> TaskRef {
        self.add(Repeating::arc(task, mode))
    }

    /// Registers `task` to run every `delay` until `mode` says done.
    pub fn register_repeating_delay(
        &self,
        task: TaskRef,
        mode: impl Into<RepeatMode>,
        delay: Duration,
    ) -> TaskRef {
        self.register_repeating_delay_from(task, mode, delay, Instant::now())
    }

    /// Like [`register_repeating_delay`](Self::register_repeating_delay), measured from `start`.
    pub fn register_repeating_delay_from(
        &self,
        task: TaskRef,
        mode: impl Into<RepeatMode>,
        delay: Duration,
        start: Instant,
    ) -> TaskRef {
        self.add(Arc::new(Gated::repeat_every(task, mode, delay, start)))
    }

    /// Registers `task` to run every `ticks` passes until `mode` says done.
    pub fn register_repeating_tick(
        &self,
        task: TaskRef,
        mode: impl Into<RepeatMode>,
        ticks: u64,
    ) -> Result<TaskRef, SchedulerError> {
        Ok(self.add(Arc::new(Gated::repeat_ticks(task, mode, ticks)?)))
    }

    /// Registers `task` with up to `max_attempts` attempts on the loop thread.
    pub fn retry(&self, task: TaskRef, max_attempts: u32) -> TaskRef {
        self.add(Arc::new(Retry::new(task, max_attempts)))
    }

    /// Like [`retry`](Self::retry); once the budget is spent, `handler` sees the last error
    /// and `fallback` runs.
    pub fn retry_with<H>(
        &self,
        task: TaskRef,
        max_attempts: u32,
        fallback: TaskRef,
        handler: H,
    ) -> TaskRef
    where
        H: Fn(&TaskError) + Send + Sync + 'static,
    {
        let retry = Retry::new(task, max_attempts)
            .with_fallback(fallback)
            .with_failure_handler(handler);
        self.add(Arc::new(retry))
    }

    /// Registers `task` with up to `max_attempts` attempts, each on the async dispatcher.
    ///
    /// Attempts never overlap: the next one is dispatched on a pass after the previous
    /// one returned.
    pub fn retry_async(&self, task: TaskRef, max_attempts: u32) -> TaskRef {
        let retry: TaskRef = Arc::new(Retry::new(task, max_attempts));
        self.add(AsyncTask::arc(retry))
    }

    /// Evaluates `supplier` on the async dispatcher, retrying up to `max_attempts` times;
    /// the value is then fed to `consumer` on the loop thread, also with up to
    /// `max_attempts` attempts.
    pub fn retry_future<T, S, C>(&self, supplier: S, consumer: C, max_attempts: u32) -> TaskRef
    where
        S: Fn() -> Result<T, TaskError> + Send + Sync + 'static,
        C: Fn(&T) -> Result<(), TaskError> + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        let registry = Arc::clone(&self.core().registry);
        let consumer = Arc::new(consumer);
        let supply: TaskRef = TaskFn::arc("retry-future", move |_| {
            let value = Arc::new(supplier()?);
            let consumer = Arc::clone(&consumer);
            let consume: TaskRef =
                TaskFn::arc("retry-future-consumer", move |_| consumer(value.as_ref()));
            registry.register(Arc::new(Retry::new(consume, max_attempts)));
            Ok(())
        });
        self.retry_async(supply, max_attempts)
    }
}
