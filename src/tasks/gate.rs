//! # Gating decorators: delay and tick count.
//!
//! [`Gated`] holds back its delegate until a [`Gate`] opens:
//! - [`DelayGate`] opens once `now - start >= delay` (wall-clock);
//! - [`TickGate`] opens on every `threshold`-th advance (call count, not time).
//!
//! A gated task is either **one-shot** or **repeating**:
//!
//! ```text
//! one-shot  (Gated::delay / Gated::ticks):
//!   advance ─► fired? ─yes─► no-op
//!               └─no──► gate.poll(now) ─open─► delegate.advance(now) ─ok─► gate.reset(now), fired = true
//!
//! repeating (Gated::repeat_every / Gated::repeat_ticks):
//!   advance ─► gate.poll(now) ─open─► Repeating.advance(now) ─ok─► gate.reset(now), fired = true
//! ```
//!
//! Completion is `fired && delegate.is_complete()`. For repeating variants the delegate is a
//! [`Repeating`], so completion additionally follows its [`RepeatMode`].
//!
//! A delegate error leaves the gate open; the delegate is retried on the next advance.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{SchedulerError, TaskError};
use crate::tasks::repeat::{RepeatMode, Repeating};
use crate::tasks::task::{Task, TaskRef, lock};

/// Condition that holds back a [`Gated`] delegate.
pub trait Gate: Send + 'static {
    /// Called once per advance; returns true when the delegate should run now.
    fn poll(&mut self, now: Instant) -> bool;

    /// Called after the delegate ran successfully.
    fn reset(&mut self, now: Instant);
}

/// Opens once `delay` has elapsed since the window start.
#[derive(Debug, Clone, Copy)]
pub struct DelayGate {
    delay: Duration,
    start: Instant,
}

impl DelayGate {
    /// Creates a gate whose window starts at `start`.
    pub fn new(delay: Duration, start: Instant) -> Self {
        Self { delay, start }
    }
}

impl Gate for DelayGate {
    fn poll(&mut self, now: Instant) -> bool {
        now.checked_duration_since(self.start)
            .is_some_and(|elapsed| elapsed >= self.delay)
    }

    fn reset(&mut self, now: Instant) {
        self.start = now;
    }
}

/// Opens on every `threshold`-th poll.
#[derive(Debug, Clone, Copy)]
pub struct TickGate {
    threshold: u64,
    counter: u64,
}

impl TickGate {
    /// Creates a tick gate; `threshold` must be non-zero.
    pub fn new(threshold: u64) -> Result<Self, SchedulerError> {
        if threshold == 0 {
            return Err(SchedulerError::invalid("tick threshold must be at least 1"));
        }
        Ok(Self {
            threshold,
            counter: 0,
        })
    }
}

impl Gate for TickGate {
    fn poll(&mut self, _now: Instant) -> bool {
        self.counter = self.counter.saturating_add(1);
        self.counter >= self.threshold
    }

    fn reset(&mut self, _now: Instant) {
        self.counter = 0;
    }
}

/// One-shot delay decorator.
pub type Delayed = Gated<DelayGate>;

/// One-shot tick-count decorator.
pub type Ticked = Gated<TickGate>;

/// Runs the delegate only when its gate opens.
pub struct Gated<G> {
    delegate: TaskRef,
    gate: Mutex<G>,
    fired: AtomicBool,
    repeat: bool,
}

impl<G: Gate> Gated<G> {
    fn with_gate(delegate: TaskRef, gate: G, repeat: bool) -> Self {
        Self {
            delegate,
            gate: Mutex::new(gate),
            fired: AtomicBool::new(false),
            repeat,
        }
    }

    /// Returns true once the delegate has run successfully at least once.
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl Gated<DelayGate> {
    /// Runs `delegate` once, `delay` after now.
    pub fn delay(delegate: TaskRef, delay: Duration) -> Self {
        Self::delay_from(delegate, delay, Instant::now())
    }

    /// Runs `delegate` once, `delay` after `start`.
    pub fn delay_from(delegate: TaskRef, delay: Duration, start: Instant) -> Self {
        Self::with_gate(delegate, DelayGate::new(delay, start), false)
    }

    /// Runs `delegate` every `delay` (first run `delay` after `start`) until `mode` says done.
    pub fn repeat_every(
        delegate: TaskRef,
        mode: impl Into<RepeatMode>,
        delay: Duration,
        start: Instant,
    ) -> Self {
        let inner: TaskRef = Repeating::arc(delegate, mode);
        Self::with_gate(inner, DelayGate::new(delay, start), true)
    }
}

impl Gated<TickGate> {
    /// Runs `delegate` once, on the `threshold`-th advance.
    pub fn ticks(delegate: TaskRef, threshold: u64) -> Result<Self, SchedulerError> {
        Ok(Self::with_gate(delegate, TickGate::new(threshold)?, false))
    }

    /// Runs `delegate` on every `threshold`-th advance until `mode` says done.
    pub fn repeat_ticks(
        delegate: TaskRef,
        mode: impl Into<RepeatMode>,
        threshold: u64,
    ) -> Result<Self, SchedulerError> {
        let inner: TaskRef = Repeating::arc(delegate, mode);
        Ok(Self::with_gate(inner, TickGate::new(threshold)?, true))
    }

    /// Current tick counter (advances since the last firing).
    pub fn counter(&self) -> u64 {
        lock(&self.gate).counter
    }
}

impl<G> fmt::Debug for Gated<G>
where
    G: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gated")
            .field("delegate", &self.delegate.name())
            .field("gate", &*lock(&self.gate))
            .field("fired", &self.fired.load(Ordering::Relaxed))
            .field("repeat", &self.repeat)
            .finish()
    }
}

impl<G: Gate> Task for Gated<G> {
    fn name(&self) -> &str {
        self.delegate.name()
    }

    fn advance(&self, now: Instant) -> Result<(), TaskError> {
        if !self.repeat && self.has_fired() {
            return Ok(());
        }
        if !lock(&self.gate).poll(now) {
            return Ok(());
        }

        self.delegate.advance(now)?;

        lock(&self.gate).reset(now);
        self.fired.store(true, Ordering::Release);
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.has_fired() && self.delegate.is_complete()
    }

    fn is_async(&self) -> bool {
        self.delegate.is_async()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use proptest::prelude::*;

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
    fn test_zero_threshold_is_rejected() {
        let (_, task) = counting();
        let err = Gated::ticks(task, 0).unwrap_err();
        assert_eq!(err.as_label(), "scheduler_invalid_argument");
    }

    #[test]
    fn test_delay_fires_at_boundary() {
        let (count, task) = counting();
        let start = Instant::now();
        let delay = Duration::from_millis(100);
        let t = Gated::delay_from(task, delay, start);

        t.advance(start).unwrap();
        t.advance(start + Duration::from_millis(99)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!t.is_complete());

        t.advance(start + delay).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(t.is_complete());
    }

    #[test]
    fn test_delayed_failure_retries_next_advance() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let task: TaskRef = TaskFn::arc("flaky", move |_| {
            if c.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TaskError::fail("first"))
            } else {
                Ok(())
            }
        });
        let start = Instant::now();
        let t = Gated::delay_from(task, Duration::ZERO, start);

        assert!(t.advance(start).is_err());
        assert!(!t.has_fired());
        t.advance(start).unwrap();
        assert!(t.is_complete());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_repeating_ticks_fire_every_threshold() {
        let (count, task) = counting();
        let t = Gated::repeat_ticks(task, RepeatMode::Forever, 3).unwrap();
        for _ in 0..9 {
            t.advance(Instant::now()).unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!t.is_complete());
    }

    #[test]
    fn test_repeating_delay_needs_first_firing() {
        let (count, task) = counting();
        let c = count.clone();
        let start = Instant::now();
        let step = Duration::from_millis(10);
        let t = Gated::repeat_every(
            task,
            RepeatMode::until(move || c.load(Ordering::SeqCst) >= 2),
            step,
            start,
        );

        t.advance(start).unwrap();
        assert!(!t.is_complete());
        t.advance(start + step).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        // window restarted at start + step
        t.advance(start + step + Duration::from_millis(5)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        t.advance(start + step * 2).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(t.is_complete());
    }

    proptest! {
        #[test]
        fn prop_tick_gate_fires_once_and_resets(threshold in 1u64..64, deltas in proptest::collection::vec(0u64..10_000, 64)) {
            let (count, task) = counting();
            let t = Gated::ticks(task, threshold).unwrap();
            let base = Instant::now();

            for (i, d) in deltas.iter().take(threshold as usize).enumerate() {
                t.advance(base + Duration::from_millis(*d)).unwrap();
                if (i as u64) + 1 < threshold {
                    prop_assert_eq!(count.load(Ordering::SeqCst), 0);
                    prop_assert_eq!(t.counter(), i as u64 + 1);
                }
            }
            prop_assert_eq!(count.load(Ordering::SeqCst), 1);
            prop_assert_eq!(t.counter(), 0);
            prop_assert!(t.is_complete());

            t.advance(base).unwrap();
            prop_assert_eq!(count.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn prop_delay_fires_exactly_once(delay_ms in 0u64..5_000, offsets in proptest::collection::vec(0u64..10_000, 1..32)) {
            let (count, task) = counting();
            let start = Instant::now();
            let delay = Duration::from_millis(delay_ms);
            let t = Gated::delay_from(task, delay, start);

            let mut expected = 0;
            for off in offsets {
                t.advance(start + Duration::from_millis(off)).unwrap();
                if off >= delay_ms {
                    expected = 1;
                }
                prop_assert_eq!(count.load(Ordering::SeqCst), expected);
            }
        }
    }
}
