//! # Subscriber extension point.
//!
//! A [`Subscribe`] implementation observes loop and task events without ever running on
//! the update loop thread. [`SubscriberSet`](crate::SubscriberSet) gives each subscriber its
//! own bounded queue and a worker on the async dispatcher; a panic in `on_event` becomes a
//! `SubscriberPanicked` event and the worker keeps draining.
//!
//! A subscriber that falls behind loses events (`SubscriberOverflow`) instead of slowing the
//! loop or its peers.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use async_trait::async_trait;
//! use tickvisor::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct StallCounter(AtomicU64);
//!
//! #[async_trait]
//! impl Subscribe for StallCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::LoopStalled {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "stall-counter" }
//!     fn queue_capacity(&self) -> usize { 64 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Observer of scheduler events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event, in publication order for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Name reported in overflow and panic events. Defaults to the type name.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue size of this subscriber (minimum 1, default 1024).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
