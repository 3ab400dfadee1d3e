//! # Runtime events emitted by the scheduler, update loop and watchdog.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Loop lifecycle**: start, stop, stall detection, restart on a fresh thread
//! - **Task outcomes**: failed advance, prune after completion, eviction by the watchdog
//! - **Subscriber health**: panics and dropped events in subscriber workers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, task name,
//! reasons, loop generation and stall duration.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tickvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::LoopStalled)
//!     .with_thread("moe-loop-0")
//!     .with_task("slow-task")
//!     .with_elapsed(Duration::from_secs(6));
//!
//! assert_eq!(ev.kind, EventKind::LoopStalled);
//! assert_eq!(ev.task.as_deref(), Some("slow-task"));
//! assert_eq!(ev.elapsed_ms, Some(6_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Loop lifecycle ===
    /// Update loop thread spawned by `start()`.
    ///
    /// Sets:
    /// - `thread`: loop thread name
    /// - `generation`: loop generation (0 after `start()`)
    LoopStarted,

    /// `stop()` cleared the registry and cancelled the loop.
    ///
    /// Sets:
    /// - `generation`: generation of the cancelled loop
    LoopStopped,

    /// The watchdog found no completed pass within the stall threshold.
    ///
    /// Sets:
    /// - `thread`: stalled thread name
    /// - `task`: suspected task (if any)
    /// - `elapsed_ms`: time since the last completed pass
    /// - `generation`: stalled loop generation
    LoopStalled,

    /// A fresh loop thread replaced a stalled one.
    ///
    /// Sets:
    /// - `thread`: new loop thread name
    /// - `generation`: new loop generation
    LoopRestarted,

    // === Task outcomes ===
    /// A task advance returned an error or panicked.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `reason`: error message
    TaskFailed,

    /// A completed task was removed from the registry.
    ///
    /// Sets:
    /// - `task`: task name
    TaskPruned,

    /// The watchdog evicted the task suspected of stalling the loop.
    ///
    /// Sets:
    /// - `task`: task name
    TaskEvicted,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task (or subscriber), if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Name of the loop thread involved.
    pub thread: Option<Arc<str>>,
    /// Loop generation (incremented on every watchdog restart).
    pub generation: Option<u64>,
    /// Stall duration in milliseconds (compact).
    pub elapsed_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            reason: None,
            thread: None,
            generation: None,
            elapsed_ms: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a loop thread name.
    #[inline]
    pub fn with_thread(mut self, thread: impl Into<Arc<str>>) -> Self {
        self.thread = Some(thread.into());
        self
    }

    /// Attaches a loop generation.
    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches a stall duration (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.elapsed_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// True for events reporting a subscriber that dropped an event.
    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    /// True for events reporting a panic inside a subscriber.
    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}
