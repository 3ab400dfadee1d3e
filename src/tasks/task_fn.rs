//! # Closure-backed tasks.
//!
//! - [`TaskFn`] wraps `F: Fn(Instant) -> Result<(), TaskError>`. The closure runs on **every**
//!   advance; the task reports complete after its first successful run, so a bare `TaskFn`
//!   runs once while a [`Repeating`](crate::Repeating) wrapper keeps calling it.
//! - [`TaskOnce`] wraps an `FnOnce`. It is consumed by its first advance, success or not.
//! - [`noop`] returns a task that does nothing and is always complete.
//!
//! ## Example
//! ```rust
//! use std::time::Instant;
//! use tickvisor::{Task, TaskFn, TaskRef, TaskError};
//!
//! let t: TaskRef = TaskFn::arc("hello", |_now: Instant| {
//!     println!("hello from the loop");
//!     Ok::<_, TaskError>(())
//! });
//! assert_eq!(t.name(), "hello");
//! assert!(!t.is_complete());
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::error::TaskError;
use crate::tasks::task::{Task, TaskRef, lock};

/// Function-backed task.
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    f: F,
    done: AtomicBool,
}

impl<F> TaskFn<F>
where
    F: Fn(Instant) -> Result<(), TaskError> + Send + Sync + 'static,
{
    /// Creates a new function-backed task.
    ///
    /// Prefer [`TaskFn::arc`] when you immediately need a [`TaskRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            done: AtomicBool::new(false),
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> fmt::Debug for TaskFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFn")
            .field("name", &self.name)
            .field("done", &self.done.load(Ordering::Relaxed))
            .finish()
    }
}

impl<F> Task for TaskFn<F>
where
    F: Fn(Instant) -> Result<(), TaskError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn advance(&self, now: Instant) -> Result<(), TaskError> {
        (self.f)(now)?;
        self.done.store(true, Ordering::Release);
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn is_async(&self) -> bool {
        false
    }
}

type OnceBody = Box<dyn FnOnce(Instant) -> Result<(), TaskError> + Send>;

/// Task backed by an `FnOnce`; the closure runs on the first advance only.
pub struct TaskOnce {
    name: Cow<'static, str>,
    body: Mutex<Option<OnceBody>>,
}

impl TaskOnce {
    /// Creates a new one-shot task.
    pub fn new<F>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: FnOnce(Instant) -> Result<(), TaskError> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: Mutex::new(Some(Box::new(f))),
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc<F>(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self>
    where
        F: FnOnce(Instant) -> Result<(), TaskError> + Send + 'static,
    {
        Arc::new(Self::new(name, f))
    }
}

impl Task for TaskOnce {
    fn name(&self) -> &str {
        &self.name
    }

    fn advance(&self, now: Instant) -> Result<(), TaskError> {
        let body = lock(&self.body).take();
        match body {
            Some(f) => f(now),
            None => Ok(()),
        }
    }

    fn is_complete(&self) -> bool {
        lock(&self.body).is_none()
    }

    fn is_async(&self) -> bool {
        false
    }
}

/// Task that does nothing and is always complete.
#[derive(Debug, Default, Clone, Copy)]
pub struct Noop;

impl Task for Noop {
    fn name(&self) -> &str {
        "noop"
    }

    fn advance(&self, _now: Instant) -> Result<(), TaskError> {
        Ok(())
    }

    fn is_complete(&self) -> bool {
        true
    }

    fn is_async(&self) -> bool {
        false
    }
}

/// Returns a shared [`Noop`] task.
pub fn noop() -> TaskRef {
    Arc::new(Noop)
}
