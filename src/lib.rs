//! # tickvisor
//!
//! **Tickvisor** is an in-process, tick-driven task scheduler.
//!
//! A single update loop thread advances a registry of composable tasks at a fixed period,
//! a worker pool runs the tasks flagged as async, and a watchdog replaces the loop thread
//! when a task blocks it.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   caller threads
//!   register / remove / await_sync / await_all / future / execute
//!        │
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Scheduler (facade)                                               │
//! │  - Registry (identity-keyed, registration order)                  │
//! │  - Liveness + LoopIdentity (last pass, suspect, loop thread id)   │
//! │  - SchedulerStats (RollingStats unless injected)                  │
//! │  - Bus (broadcast events)                                         │
//! └──────┬──────────────────────────────┬─────────────────────┬───────┘
//!        ▼                              ▼                     ▼
//!  ┌───────────────────┐     ┌─────────────────────┐   ┌──────────────┐
//!  │ update loop thread│     │  async dispatcher   │   │   watchdog   │
//!  │ "{prefix}-loop-N" │────►│  "{prefix}-async"   │   │ (on dispatch)│
//!  │ inline advances   │     │  is_async() tasks   │   │ stall check  │
//!  └─────────┬─────────┘     └─────────┬───────────┘   └──────┬───────┘
//!            │ TaskFailed / TaskPruned │                      │ LoopStalled / TaskEvicted
//!            ▼                         ▼                      ▼ LoopRestarted
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │               (capacity: SchedulerConfig::bus_capacity)           │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                         fan-out listener ──► SubscriberSet ──► sub.on_event()
//! ```
//!
//! ### Pass
//! ```text
//! every period, on the loop thread:
//!   for task in registry.snapshot():
//!     ├─ is_async() → dispatcher (single-flight per AsyncTask)
//!     └─ inline     → advance(now)  (recorded as the watchdog suspect)
//!     error → on_error + TaskFailed        complete → unregister + TaskPruned
//!   liveness.touch(), stats.update()
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Tasks**         | Tick-driven units of work, closures, one-shots.               | [`Task`], [`TaskRef`], [`TaskFn`], [`TaskOnce`] |
//! | **Decorators**    | Delay / tick gating, repetition, retry, async dispatch.       | [`Gated`], [`Repeating`], [`Retry`], [`AsyncTask`] |
//! | **Scheduling**    | Lifecycle, registration, blocking bridges, watchdog.          | [`Scheduler`], [`SchedulerBuilder`]         |
//! | **Subscriber API**| Hook into loop and task lifecycle events.                     | [`Subscribe`], [`LogWriter`]                |
//! | **Statistics**    | Per-pass lateness, pluggable through the builder.             | [`SchedulerStats`], [`RollingStats`]        |
//! | **Errors**        | Typed errors for the scheduler and task advances.             | [`SchedulerError`], [`TaskError`]           |
//! | **Configuration** | Centralize runtime settings.                                  | [`SchedulerConfig`]                         |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tickvisor::{RepeatMode, Scheduler, SchedulerConfig, TaskFn, TaskRef};
//!
//! fn main() -> Result<(), tickvisor::SchedulerError> {
//!     let scheduler = Scheduler::new(SchedulerConfig {
//!         period: Duration::from_millis(5),
//!         ..SchedulerConfig::default()
//!     });
//!     scheduler.start()?;
//!
//!     // every 3rd pass, forever
//!     let heartbeat: TaskRef = TaskFn::arc("heartbeat", |_| Ok(()));
//!     scheduler.register_repeating_tick(heartbeat, RepeatMode::Forever, 3)?;
//!
//!     // off the loop thread, blocking until both finished
//!     let a: TaskRef = TaskFn::arc("load-a", |_| Ok(()));
//!     let b: TaskRef = TaskFn::arc("load-b", |_| Ok(()));
//!     scheduler.await_all([a, b])?;
//!
//!     scheduler.stop()
//! }
//! ```

mod core;
mod error;
mod events;
mod stats;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{ErrorHandler, Registry, Scheduler, SchedulerBuilder, SchedulerConfig};
pub use error::{SchedulerError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use stats::{Load, RollingStats, SchedulerStats};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{
    AsyncTask, DelayGate, Delayed, DonePredicate, FailureHandler, Gate, Gated, Noop, RepeatMode,
    Repeating, Retry, Task, TaskFn, TaskOnce, TaskRef, Ticked, TickGate, noop,
};
