//! # Repetition decorator.
//!
//! [`Repeating`] advances its delegate on every call and decides completion through a
//! [`RepeatMode`]:
//!
//! ```text
//! RepeatMode::Forever        → never complete
//! RepeatMode::UntilDone      → complete when the delegate is complete
//! RepeatMode::Until(pred)    → complete when pred() returns true
//! ```
//!
//! Exactly one mode governs completion. Gated repetition (every N ticks, every D) is built
//! by wrapping a `Repeating` in a repeating [`Gated`](crate::Gated).

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::error::TaskError;
use crate::tasks::task::{Task, TaskRef};

/// Completion predicate for [`RepeatMode::Until`].
pub type DonePredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// How a [`Repeating`] task decides it is complete.
#[derive(Clone)]
pub enum RepeatMode {
    /// Never complete; the task stays until removed.
    Forever,
    /// Complete as soon as the delegate reports complete.
    UntilDone,
    /// Complete as soon as the predicate returns true.
    Until(DonePredicate),
}

impl RepeatMode {
    /// Creates [`RepeatMode::Until`] from a closure.
    pub fn until<F>(f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        RepeatMode::Until(Arc::new(f))
    }
}

impl From<bool> for RepeatMode {
    /// `true` → [`RepeatMode::Forever`], `false` → [`RepeatMode::UntilDone`].
    fn from(always: bool) -> Self {
        if always {
            RepeatMode::Forever
        } else {
            RepeatMode::UntilDone
        }
    }
}

impl fmt::Debug for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepeatMode::Forever => f.write_str("Forever"),
            RepeatMode::UntilDone => f.write_str("UntilDone"),
            RepeatMode::Until(_) => f.write_str("Until(..)"),
        }
    }
}

/// Advances the delegate on every call; completion follows [`RepeatMode`].
pub struct Repeating {
    delegate: TaskRef,
    mode: RepeatMode,
}

impl Repeating {
    /// Wraps `delegate` with the given completion mode.
    pub fn new(delegate: TaskRef, mode: impl Into<RepeatMode>) -> Self {
        Self {
            delegate,
            mode: mode.into(),
        }
    }

    /// Creates the decorator and returns it as a shared handle.
    pub fn arc(delegate: TaskRef, mode: impl Into<RepeatMode>) -> Arc<Self> {
        Arc::new(Self::new(delegate, mode))
    }

    /// Returns the completion mode.
    pub fn mode(&self) -> &RepeatMode {
        &self.mode
    }
}

impl Task for Repeating {
    fn name(&self) -> &str {
        self.delegate.name()
    }

    fn advance(&self, now: Instant) -> Result<(), TaskError> {
        self.delegate.advance(now)
    }

    fn is_complete(&self) -> bool {
        match &self.mode {
            RepeatMode::Forever => false,
            RepeatMode::UntilDone => self.delegate.is_complete(),
            RepeatMode::Until(done) => done(),
        }
    }

    fn is_async(&self) -> bool {
        self.delegate.is_async()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::tasks::TaskFn;

    fn counting() -> (Arc<AtomicU32>, TaskRef) {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let task: TaskRef = TaskFn::arc("count", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (count, task)
    }

    #[test]
    fn test_predicate_completes_after_k_advances() {
        const K: u32 = 4;
        let (count, task) = counting();
        let c = count.clone();
        let rep = Repeating::new(task, RepeatMode::until(move || c.load(Ordering::SeqCst) >= K));

        for i in 1..=K + 2 {
            rep.advance(Instant::now()).unwrap();
            assert_eq!(rep.is_complete(), i >= K, "after advance {i}");
        }
        assert_eq!(count.load(Ordering::SeqCst), K + 2);
    }

    #[test]
    fn test_forever_never_completes() {
        let (count, task) = counting();
        let rep = Repeating::new(task, true);
        for _ in 0..10 {
            rep.advance(Instant::now()).unwrap();
        }
        assert!(!rep.is_complete());
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_until_done_follows_delegate() {
        let (_, task) = counting();
        let rep = Repeating::new(task, false);
        assert!(!rep.is_complete());
        rep.advance(Instant::now()).unwrap();
        assert!(rep.is_complete());
    }
}
