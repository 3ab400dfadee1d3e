//! Error types used by the tickvisor scheduler and its tasks.
//!
//! This module defines two main error enums:
//!
//! - [`SchedulerError`] errors raised by the scheduler itself (lifecycle misuse,
//!   stalled loop diagnostics, failures delivered to the exception handler).
//! - [`TaskError`] errors raised by a single [`Task::advance`](crate::Task::advance) call.
//!
//! Both types provide `as_label` for logs/metrics.

use std::any::Any;
use std::borrow::Cow;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the scheduler.
///
/// Lifecycle variants (`AlreadyStarted`, `NotStarted`, `CancelFailed`, `InvalidArgument`)
/// are returned at the call site. `Task` and `Stalled` are never returned from a call;
/// they are delivered to the configured [`ErrorHandler`](crate::ErrorHandler).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// `start()` was called while the update loop is running.
    #[error("scheduler has already started")]
    AlreadyStarted,

    /// The operation needs a running update loop.
    #[error("scheduler is not running")]
    NotStarted,

    /// The update loop could not be cancelled because its thread already died.
    #[error("couldn't cancel update loop: {reason}")]
    CancelFailed {
        /// What happened to the loop thread.
        reason: String,
    },

    /// A constructor or registration argument was rejected.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Why the argument was rejected.
        reason: Cow<'static, str>,
    },

    /// The scheduler stopped (or the loop was replaced) before the result was produced.
    #[error("scheduler stopped before the result was available")]
    Stopped,

    /// A task failed during `advance`.
    #[error("task '{task}' failed: {error}")]
    Task {
        /// Name of the failing task.
        task: String,
        /// The underlying task error.
        error: TaskError,
    },

    /// The watchdog found the update loop without progress.
    #[error("update loop stalled: thread '{thread}' made no progress for {since:?} (suspect: {suspect:?})")]
    Stalled {
        /// Name of the presumed loop thread.
        thread: String,
        /// Time since the last completed pass.
        since: Duration,
        /// Name of the task dispatched inline right before the stall, if any.
        suspect: Option<String>,
    },

    /// Building a thread or runtime failed.
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tickvisor::SchedulerError;
    ///
    /// assert_eq!(SchedulerError::AlreadyStarted.as_label(), "scheduler_already_started");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::AlreadyStarted => "scheduler_already_started",
            SchedulerError::NotStarted => "scheduler_not_started",
            SchedulerError::CancelFailed { .. } => "scheduler_cancel_failed",
            SchedulerError::InvalidArgument { .. } => "scheduler_invalid_argument",
            SchedulerError::Stopped => "scheduler_stopped",
            SchedulerError::Task { .. } => "scheduler_task_failed",
            SchedulerError::Stalled { .. } => "scheduler_loop_stalled",
            SchedulerError::Runtime(_) => "scheduler_runtime",
        }
    }

    pub(crate) fn invalid(reason: impl Into<Cow<'static, str>>) -> Self {
        SchedulerError::InvalidArgument {
            reason: reason.into(),
        }
    }
}

/// # Errors produced by a task advance.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The advance failed; the task stays registered and is advanced again next pass.
    #[error("execution failed: {reason}")]
    Fail {
        /// The underlying error message.
        reason: String,
    },

    /// The advance panicked; the panic was caught at the dispatch boundary.
    #[error("panicked: {reason}")]
    Panicked {
        /// Panic payload rendered as text.
        reason: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    ///
    /// # Example
    /// ```
    /// use tickvisor::TaskError;
    ///
    /// let err = TaskError::fail("boom");
    /// assert_eq!(err.as_label(), "task_failed");
    /// assert_eq!(err.to_string(), "execution failed: boom");
    /// ```
    pub fn fail(reason: impl Into<String>) -> Self {
        TaskError::Fail {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Converts a caught panic payload into [`TaskError::Panicked`].
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        TaskError::Panicked {
            reason: panic_message(&*payload),
        }
    }
}

/// Renders a panic payload (`&str` or `String`) as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
