//! # Event bus.
//!
//! [`Bus`] wraps a [`tokio::sync::broadcast`] channel. Every component that reports
//! something (scheduler facade, update loop, dispatcher workers, watchdog, subscriber
//! workers) holds a clone and publishes into the same ring:
//!
//! ```text
//! facade / loop / workers / watchdog ──publish──► ring(capacity) ──► Scheduler::events()
//!                                                                └──► fan-out ──► SubscriberSet
//! ```
//!
//! `publish` is a plain synchronous call, safe from the loop thread and from blocking
//! dispatcher workers alike. Events published while nobody listens are dropped; receivers that
//! fall more than `capacity` events behind skip ahead (`RecvError::Lagged`).

use tokio::sync::broadcast;

use super::event::Event;

/// Shared publisher handle; clones feed the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes `ev`; never blocks.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
