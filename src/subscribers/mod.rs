//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and the
//! built-in [`LogWriter`] for handling events broadcast through the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! update loop / watchdog ── publish(Event) ──► Bus ──► fan-out listener ──► SubscriberSet
//!                                                                           │
//!                                                        ┌─────────┬────────┴──┐
//!                                                        ▼         ▼           ▼
//!                                                    LogWriter  Metrics     Custom
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
