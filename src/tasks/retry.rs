//! # Retry decorator.
//!
//! [`Retry`] advances its delegate at most `max_attempts` times, swallowing failures
//! (errors and panics) until the budget is spent. There is no delay between attempts:
//! each loop pass is one attempt.
//!
//! ```text
//! advance(now)
//!   ├─ complete?            → no-op
//!   ├─ attempts += 1
//!   ├─ delegate.advance(now)
//!   │     ├─ Ok  → succeeded = true
//!   │     └─ Err → swallowed, unless attempts == max → failure handler(err)
//!   └─ attempts >= max && !delegate.is_complete() → fallback.advance(now)
//! ```
//!
//! Completion: `succeeded && (attempts >= max || delegate.is_complete())`, or the budget was
//! spent without a single success (terminal: handler and fallback fire once, then the task is
//! pruned).

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::TaskError;
use crate::tasks::task::{Task, TaskRef, advance_caught, lock};
use crate::tasks::task_fn::noop;

/// Callback receiving the last error once the retry budget is spent.
pub type FailureHandler = Arc<dyn Fn(&TaskError) + Send + Sync>;

#[derive(Debug, Default, Clone, Copy)]
struct RetryState {
    attempts: u32,
    succeeded: bool,
    exhausted: bool,
}

/// Advances a delegate until it succeeds or the attempt budget is spent.
pub struct Retry {
    delegate: TaskRef,
    max_attempts: u32,
    on_failure: TaskRef,
    failure_handler: FailureHandler,
    state: Mutex<RetryState>,
}

impl Retry {
    /// Wraps `delegate` with an attempt budget (clamped to a minimum of 1).
    ///
    /// The default fallback is a no-op; the default failure handler logs the last error.
    pub fn new(delegate: TaskRef, max_attempts: u32) -> Self {
        let name = delegate.name().to_string();
        Self {
            delegate,
            max_attempts: max_attempts.max(1),
            on_failure: noop(),
            failure_handler: Arc::new(move |err: &TaskError| {
                warn!(task = %name, error = %err, "retry budget exhausted");
            }),
            state: Mutex::new(RetryState::default()),
        }
    }

    /// Returns a new decorator with a fallback task advanced once the budget is spent.
    pub fn with_fallback(mut self, on_failure: TaskRef) -> Self {
        self.on_failure = on_failure;
        self
    }

    /// Returns a new decorator with a custom failure handler.
    pub fn with_failure_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&TaskError) + Send + Sync + 'static,
    {
        self.failure_handler = Arc::new(handler);
        self
    }

    /// Number of attempts made so far.
    pub fn attempts(&self) -> u32 {
        lock(&self.state).attempts
    }

    /// Configured attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn complete(&self, st: &RetryState) -> bool {
        st.exhausted
            || (st.succeeded
                && (st.attempts >= self.max_attempts || self.delegate.is_complete()))
    }
}

impl fmt::Debug for Retry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("delegate", &self.delegate.name())
            .field("max_attempts", &self.max_attempts)
            .field("state", &*lock(&self.state))
            .finish()
    }
}

impl Task for Retry {
    fn name(&self) -> &str {
        self.delegate.name()
    }

    fn advance(&self, now: Instant) -> Result<(), TaskError> {
        let attempt = {
            let mut st = lock(&self.state);
            if self.complete(&st) {
                return Ok(());
            }
            st.attempts += 1;
            st.attempts
        };
        let last = attempt >= self.max_attempts;

        match advance_caught(self.delegate.as_ref(), now) {
            Ok(()) => lock(&self.state).succeeded = true,
            Err(err) if last => (self.failure_handler)(&err),
            Err(err) => {
                debug!(task = %self.name(), attempt, error = %err, "retry attempt failed");
            }
        }

        if last && !self.delegate.is_complete() {
            {
                let mut st = lock(&self.state);
                st.exhausted = !st.succeeded;
            }
            self.on_failure.advance(now)?;
        }
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.complete(&lock(&self.state))
    }

    fn is_async(&self) -> bool {
        false
    }
}
