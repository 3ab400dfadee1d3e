//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the scheduler, update loop,
//! watchdog and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Scheduler` (start/stop), update loop (task failed/pruned),
//!   watchdog (stalled/evicted/restarted), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the fan-out listener spawned by `Scheduler::start()`, which forwards
//!   to the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
