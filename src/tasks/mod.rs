//! # Tasks and task decorators.
//!
//! - [`Task`] - trait for tick-driven units of work
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)
//! - [`TaskFn`], [`TaskOnce`], [`noop`] - closure-backed tasks
//! - [`Gated`] ([`Delayed`], [`Ticked`]) - run once a delay elapsed or N ticks passed
//! - [`Repeating`] - keep advancing until a [`RepeatMode`] says done
//! - [`Retry`] - bounded attempts with fallback
//! - [`AsyncTask`] - single-flight dispatch off the loop thread

mod async_task;
mod gate;
mod repeat;
mod retry;
mod task;
mod task_fn;

pub use async_task::AsyncTask;
pub use gate::{DelayGate, Delayed, Gate, Gated, TickGate, Ticked};
pub use repeat::{DonePredicate, RepeatMode, Repeating};
pub use retry::{FailureHandler, Retry};
pub use task::{Task, TaskRef};
pub use task_fn::{Noop, TaskFn, TaskOnce, noop};

pub(crate) use task::{advance_caught, lock};
