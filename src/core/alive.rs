//! # Loop liveness and identity.
//!
//! Shared state the update loop writes and the watchdog / bridge read:
//!
//! ```text
//! update loop ──► Liveness::set_suspect(task)   (before each inline advance)
//!             └─► Liveness::touch(now)          (after each completed pass)
//! bootstrap   ──► LoopIdentity::capture()       (once per loop (re)start)
//!
//! watchdog    ──► since_last(now) >= threshold && identity known → stall
//! bridge      ──► LoopIdentity::is(thread::current().id())
//! ```
//!
//! ## Rules
//! - Identity compares `ThreadId`, never thread names.
//! - Identity has a single writer per loop generation (the bootstrap task) and many readers.
//! - The suspect is held weakly: a task pruned or removed meanwhile is not kept alive.

use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crate::tasks::{Task, TaskRef, lock};

/// Progress marker for the update loop.
pub(crate) struct Liveness {
    last_update: Mutex<Instant>,
    suspect: Mutex<Option<Weak<dyn Task>>>,
}

impl Liveness {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            last_update: Mutex::new(now),
            suspect: Mutex::new(None),
        }
    }

    /// Marks a completed pass.
    pub(crate) fn touch(&self, now: Instant) {
        *lock(&self.last_update) = now;
    }

    /// Time since the last completed pass.
    pub(crate) fn since_last(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*lock(&self.last_update))
    }

    /// Records the task about to be advanced inline.
    pub(crate) fn set_suspect(&self, task: &TaskRef) {
        *lock(&self.suspect) = Some(Arc::downgrade(task));
    }

    /// Takes the last inline task, if it is still alive.
    pub(crate) fn take_suspect(&self) -> Option<TaskRef> {
        lock(&self.suspect).take().and_then(|w| w.upgrade())
    }
}

#[derive(Debug, Clone)]
struct Identity {
    id: ThreadId,
    name: String,
}

/// Identity slot of the thread currently running the update loop.
#[derive(Default)]
pub(crate) struct LoopIdentity {
    slot: RwLock<Option<Identity>>,
}

impl LoopIdentity {
    /// Captures the calling thread.
    pub(crate) fn capture(&self) {
        let current = thread::current();
        let ident = Identity {
            id: current.id(),
            name: current.name().unwrap_or("<unnamed>").to_string(),
        };
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some(ident);
    }

    pub(crate) fn clear(&self) {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// True if `id` is the captured loop thread.
    pub(crate) fn is(&self, id: ThreadId) -> bool {
        self.read().is_some_and(|i| i.id == id)
    }

    /// Name of the captured loop thread.
    pub(crate) fn name(&self) -> Option<String> {
        self.read().map(|i| i.name)
    }

    pub(crate) fn is_known(&self) -> bool {
        self.read().is_some()
    }

    fn read(&self) -> Option<Identity> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
