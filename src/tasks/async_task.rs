//! # Async dispatch decorator.
//!
//! [`AsyncTask`] marks its delegate for the async dispatcher (`is_async() == true`) and
//! guarantees **single-flight**: while one advance is in progress, concurrent advances of the
//! same instance return immediately without touching the delegate.
//!
//! ```text
//! advance(now)
//!   ├─ running.swap(true) was true → return (another dispatch is in flight)
//!   ├─ finished?                    → return
//!   ├─ delegate.advance(now)
//!   ├─ delegate complete?           → on_done.advance(now), finished = true
//!   └─ running = false (also on error / panic)
//! ```
//!
//! The continuation `on_done` always runs after the delegate, on the same thread, exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::error::TaskError;
use crate::tasks::task::{Task, TaskRef};
use crate::tasks::task_fn::noop;

/// Runs the delegate off the loop thread, one execution at a time.
pub struct AsyncTask {
    delegate: TaskRef,
    on_done: TaskRef,
    running: AtomicBool,
    finished: AtomicBool,
}

/// Clears the single-flight flag when the advance ends, including on unwind.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AsyncTask {
    /// Wraps `delegate` with no continuation.
    pub fn new(delegate: TaskRef) -> Self {
        Self::then(delegate, noop())
    }

    /// Wraps `delegate`; `on_done` is advanced once right after the delegate completes.
    pub fn then(delegate: TaskRef, on_done: TaskRef) -> Self {
        Self {
            delegate,
            on_done,
            running: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    /// Creates the decorator and returns it as a shared handle.
    pub fn arc(delegate: TaskRef) -> Arc<Self> {
        Arc::new(Self::new(delegate))
    }

    /// Returns true while an advance of this instance is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Task for AsyncTask {
    fn name(&self) -> &str {
        self.delegate.name()
    }

    fn advance(&self, now: Instant) -> Result<(), TaskError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        let _flight = InFlight(&self.running);

        if self.finished.load(Ordering::Acquire) {
            return Ok(());
        }
        if !self.delegate.is_complete() {
            self.delegate.advance(now)?;
        }
        if self.delegate.is_complete() {
            self.on_done.advance(now)?;
            self.finished.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn is_async(&self) -> bool {
        true
    }
}
