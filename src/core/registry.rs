//! # Task registry - live set of tasks advanced by the update loop.
//!
//! Membership is by **identity** (the `Arc` allocation), not by name or equality: two
//! `TaskRef`s are the same entry iff they point to the same task.
//!
//! ## Architecture
//! ```text
//! caller threads ──► register / unregister / remove_if ──┐
//! watchdog       ──► unregister(suspect) ────────────────┼──► Mutex<IndexMap<addr, TaskRef>>
//! update loop    ──► snapshot() ... unregister(done) ────┘          (insertion order)
//! ```
//!
//! ## Rules
//! - The loop iterates a **snapshot**: mutations during a pass never skip or double-visit
//!   a task; a task removed mid-pass may still receive the advance already in flight.
//! - Iteration order is registration order; nothing may depend on it.
//! - The lock is never held while a task runs.

use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use crate::tasks::{TaskRef, lock};

/// Identity key of a task handle.
#[inline]
fn key(task: &TaskRef) -> usize {
    Arc::as_ptr(task).cast::<()>() as usize
}

/// Thread-safe, duplicate-free set of active tasks.
#[derive(Default)]
pub struct Registry {
    tasks: Mutex<IndexMap<usize, TaskRef>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adds `task`; returns false if this exact task is already registered.
    pub fn register(&self, task: TaskRef) -> bool {
        let mut tasks = lock(&self.tasks);
        let k = key(&task);
        if tasks.contains_key(&k) {
            return false;
        }
        tasks.insert(k, task);
        true
    }

    /// Adds `task` at the front of the iteration order (loop bootstrap).
    pub(crate) fn register_first(&self, task: TaskRef) -> bool {
        let mut tasks = lock(&self.tasks);
        let k = key(&task);
        if tasks.contains_key(&k) {
            return false;
        }
        tasks.shift_insert(0, k, task);
        true
    }

    /// Removes `task` by identity; returns true if it was present.
    pub fn unregister(&self, task: &TaskRef) -> bool {
        lock(&self.tasks).shift_remove(&key(task)).is_some()
    }

    /// Returns true if this exact task is registered.
    pub fn contains(&self, task: &TaskRef) -> bool {
        lock(&self.tasks).contains_key(&key(task))
    }

    /// Removes every task matching `pred`; returns how many were removed.
    ///
    /// `pred` runs under the registry lock: keep it short and never touch the registry from it.
    pub fn remove_if<P>(&self, mut pred: P) -> usize
    where
        P: FnMut(&TaskRef) -> bool,
    {
        let mut tasks = lock(&self.tasks);
        let before = tasks.len();
        tasks.retain(|_, t| !pred(t));
        before - tasks.len()
    }

    /// Returns the current tasks in registration order.
    pub fn snapshot(&self) -> Vec<TaskRef> {
        lock(&self.tasks).values().cloned().collect()
    }

    /// Discards every task.
    pub fn clear(&self) {
        lock(&self.tasks).clear();
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        lock(&self.tasks).len()
    }

    /// True if no task is registered.
    pub fn is_empty(&self) -> bool {
        lock(&self.tasks).is_empty()
    }
}
