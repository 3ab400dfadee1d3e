//! Runtime core: the scheduler facade and everything that drives it.
//!
//! The public API from this module is [`Scheduler`] (with [`SchedulerBuilder`] and
//! [`SchedulerConfig`]) and the [`Registry`] it owns.
//!
//! Internal modules:
//! - [`scheduler`]: lifecycle, registration, loop replacement;
//! - [`update_loop`]: the dedicated loop thread and its fixed-rate ticker;
//! - [`runner`]: one pass over the registry (inline vs. async dispatch, pruning);
//! - [`dispatcher`]: worker pool for async tasks, the watchdog and subscribers;
//! - [`watchdog`]: stall detection and self-healing;
//! - [`alive`]: loop liveness and thread identity;
//! - [`bridge`]: blocking helpers (`await_sync`, `await_all`, `future`, ...);
//! - [`register`]: one-call registration of decorated tasks;
//! - [`latch`]: countdown barrier used by `await_all`.

mod alive;
mod bridge;
mod builder;
mod config;
mod dispatcher;
mod latch;
mod register;
mod registry;
mod runner;
mod scheduler;
mod update_loop;
mod watchdog;

#[cfg(test)]
mod tests;

pub use builder::SchedulerBuilder;
pub use config::{ErrorHandler, SchedulerConfig};
pub use registry::Registry;
pub use scheduler::Scheduler;
