//! # Task abstraction.
//!
//! A [`Task`] is the atomic unit the update loop advances on every pass. It exposes three
//! capabilities and nothing else:
//! - [`advance`](Task::advance) move the task forward to `now`;
//! - [`is_complete`](Task::is_complete) ask whether the task can be pruned;
//! - [`is_async`](Task::is_async) ask whether the task must run off the loop thread.
//!
//! Tasks are shared as [`TaskRef`] (`Arc<dyn Task>`), so every method takes `&self`.
//! Stateful tasks keep their state behind atomics or a mutex.
//!
//! ## Rules
//! - `advance` may be called again after the task first reports complete (pruning is eventual);
//!   implementations treat that as a no-op or repeat safely.
//! - An `Err` from `advance` does **not** remove the task; it is advanced again next pass.
//! - Panics inside `advance` are caught at the dispatch boundary and reported as
//!   [`TaskError::Panicked`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::error::TaskError;

/// Shared handle to a task.
///
/// Registry membership is identity-based: two `TaskRef`s are the same task iff they point
/// to the same allocation.
pub type TaskRef = Arc<dyn Task>;

/// # Tick-driven unit of work.
///
/// # Example
/// ```
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Instant;
/// use tickvisor::{Task, TaskError};
///
/// struct Countdown(AtomicU32);
///
/// impl Task for Countdown {
///     fn advance(&self, _now: Instant) -> Result<(), TaskError> {
///         let _ = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
///         Ok(())
///     }
///     fn is_complete(&self) -> bool { self.0.load(Ordering::Acquire) == 0 }
///     fn is_async(&self) -> bool { false }
/// }
///
/// let t = Countdown(AtomicU32::new(2));
/// t.advance(Instant::now()).unwrap();
/// assert!(!t.is_complete());
/// t.advance(Instant::now()).unwrap();
/// assert!(t.is_complete());
/// ```
pub trait Task: Send + Sync + 'static {
    /// Returns a human-readable task name used in diagnostics.
    ///
    /// The default uses `type_name::<Self>()`; decorators forward their delegate's name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Advances the task to `now`.
    fn advance(&self, now: Instant) -> Result<(), TaskError>;

    /// Returns true once the task can be removed from the registry.
    fn is_complete(&self) -> bool;

    /// Returns true if the loop must hand this task to the async dispatcher.
    fn is_async(&self) -> bool;
}

/// Advances `task`, turning a panic into [`TaskError::Panicked`].
pub(crate) fn advance_caught(task: &dyn Task, now: Instant) -> Result<(), TaskError> {
    match catch_unwind(AssertUnwindSafe(|| task.advance(now))) {
        Ok(res) => res,
        Err(payload) => Err(TaskError::from_panic(payload)),
    }
}

/// Locks a mutex, ignoring poisoning (state is kept consistent by the callers).
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
