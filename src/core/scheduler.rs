//! # Scheduler: owns the registry, the update loop, the async dispatcher and the watchdog.
//!
//! The [`Scheduler`] is the facade callers use to register tasks, control the lifecycle and
//! bridge results across threads (see the `bridge` and `register` modules for the helper
//! methods).
//!
//! ## Key responsibilities
//! - keep the [`Registry`] of live tasks (identity-based, concurrent-safe)
//! - drive a dedicated update loop thread at a fixed period
//! - run `is_async()` tasks, the watchdog and subscriber workers on the async dispatcher
//! - fan out lifecycle [`Event`]s to subscribers
//!
//! ## Lifecycle
//! ```text
//!            start()                          stop()
//!   Idle ─────────────► Running ─────────────────────────► Idle
//!                        │   ▲                   (registry cleared, loop cancelled,
//!         watchdog stall │   │ new thread         dispatcher shut down)
//!                        ▼   │ (generation + 1)
//!                      Restarting
//! ```
//!
//! `start()` on a running scheduler fails with `AlreadyStarted`; `stop()` on an idle one with
//! `NotStarted`. A stopped scheduler can be started again: each run gets a fresh loop thread
//! and a fresh dispatcher.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//! use tickvisor::{Scheduler, SchedulerConfig, TaskFn};
//!
//! fn main() -> Result<(), tickvisor::SchedulerError> {
//!     let cfg = SchedulerConfig {
//!         period: Duration::from_millis(5),
//!         ..SchedulerConfig::default()
//!     };
//!     let scheduler = Scheduler::new(cfg);
//!     scheduler.start()?;
//!
//!     let hits = Arc::new(AtomicU32::new(0));
//!     let h = hits.clone();
//!     scheduler.register(TaskFn::arc("hello", move |_| {
//!         h.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     }));
//!
//!     // runs on the loop thread, after the pass that advanced "hello"
//!     let seen = scheduler.await_sync(move || hits.load(Ordering::SeqCst))?;
//!     assert!(seen <= 1);
//!
//!     scheduler.stop()?;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::core::alive::{Liveness, LoopIdentity};
use crate::core::builder::SchedulerBuilder;
use crate::core::config::{ErrorHandler, SchedulerConfig};
use crate::core::dispatcher::Dispatcher;
use crate::core::registry::Registry;
use crate::core::update_loop::{Job, LoopHandle, LoopTiming, spawn_loop};
use crate::core::watchdog::{self, WatchdogTimings};
use crate::error::SchedulerError;
use crate::events::{Bus, Event, EventKind};
use crate::stats::SchedulerStats;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::{TaskOnce, TaskRef, lock};

/// State shared by the facade, the loop thread, dispatcher workers and the watchdog.
pub(crate) struct Core {
    pub(crate) registry: Arc<Registry>,
    pub(crate) liveness: Liveness,
    pub(crate) identity: LoopIdentity,
    pub(crate) stats: Arc<dyn SchedulerStats>,
    pub(crate) bus: Bus,
    pub(crate) on_error: ErrorHandler,
}

/// Resources of one `start()` .. `stop()` run.
struct Running {
    token: CancellationToken,
    dispatcher: Dispatcher,
    update_loop: LoopHandle,
}

/// Tick-driven task scheduler.
pub struct Scheduler {
    cfg: SchedulerConfig,
    core: Arc<Core>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    timings: WatchdogTimings,
    state: Mutex<Option<Running>>,
}

impl Scheduler {
    /// Creates an idle scheduler with no subscribers.
    pub fn new(cfg: SchedulerConfig) -> Arc<Self> {
        SchedulerBuilder::new(cfg).build()
    }

    /// Returns a builder for attaching subscribers.
    pub fn builder(cfg: SchedulerConfig) -> SchedulerBuilder {
        SchedulerBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        cfg: SchedulerConfig,
        subscribers: Vec<Arc<dyn Subscribe>>,
        stats: Arc<dyn SchedulerStats>,
        timings: WatchdogTimings,
    ) -> Arc<Self> {
        let core = Core {
            registry: Registry::new(),
            liveness: Liveness::new(Instant::now()),
            identity: LoopIdentity::default(),
            stats,
            bus: Bus::new(cfg.bus_capacity_clamped()),
            on_error: cfg.on_error.clone(),
        };
        Arc::new(Self {
            cfg,
            core: Arc::new(core),
            subscribers,
            timings,
            state: Mutex::new(None),
        })
    }

    pub(crate) fn core(&self) -> &Arc<Core> {
        &self.core
    }

    /// Starts the update loop, the async dispatcher and the watchdog.
    pub fn start(self: &Arc<Self>) -> Result<(), SchedulerError> {
        let mut state = lock(&self.state);
        if state.is_some() {
            return Err(SchedulerError::AlreadyStarted);
        }

        let dispatcher = Dispatcher::new(&self.cfg.thread_prefix, self.cfg.async_threads_resolved())?;
        let token = CancellationToken::new();

        self.core.identity.clear();
        self.core.liveness.touch(Instant::now());
        self.core.stats.rebase();
        self.spawn_fanout(dispatcher.handle(), &token);
        self.core.registry.register_first(self.bootstrap());

        let update_loop = spawn_loop(
            Arc::clone(&self.core),
            dispatcher.handle().clone(),
            self.timing(),
            &self.cfg.thread_prefix,
            0,
            token.child_token(),
        )?;
        watchdog::spawn(Arc::downgrade(self), dispatcher.handle(), self.timings, token.clone());

        self.core.bus.publish(
            Event::new(EventKind::LoopStarted)
                .with_thread(update_loop.thread_name.as_str())
                .with_generation(0),
        );
        info!(thread = %update_loop.thread_name, period = ?self.cfg.period_clamped(), "scheduler started");

        *state = Some(Running {
            token,
            dispatcher,
            update_loop,
        });
        Ok(())
    }

    /// Discards every registered task, cancels the loop and shuts down the dispatcher.
    ///
    /// Pending tasks are dropped, not drained. Returns `CancelFailed` if the loop thread had
    /// already died from a panic; the scheduler is idle afterwards either way.
    pub fn stop(&self) -> Result<(), SchedulerError> {
        let Some(mut running) = lock(&self.state).take() else {
            return Err(SchedulerError::NotStarted);
        };

        self.core.registry.clear();
        self.core.bus.publish(
            Event::new(EventKind::LoopStopped).with_generation(running.update_loop.generation),
        );
        running.token.cancel();
        let res = running.update_loop.cancel();
        running.dispatcher.shutdown();
        self.core.identity.clear();

        match &res {
            Ok(()) => info!("scheduler stopped"),
            Err(e) => error!(error = %e, "scheduler stopped with a dead loop thread"),
        }
        res
    }

    /// True while the update loop is running.
    pub fn is_running(&self) -> bool {
        lock(&self.state).is_some()
    }

    /// True while the scheduler is idle.
    pub fn is_stopped(&self) -> bool {
        !self.is_running()
    }

    /// True if `id` is the thread currently running the update loop.
    ///
    /// Compares thread identity, never names. False until the loop ran its first pass.
    pub fn is_scheduler_thread(&self, id: ThreadId) -> bool {
        self.core.identity.is(id)
    }

    /// True if the calling thread is the update loop thread.
    pub fn on_scheduler_thread(&self) -> bool {
        self.is_scheduler_thread(thread::current().id())
    }

    /// True if the calling thread belongs to the async dispatcher of the current run.
    pub fn on_dispatcher_thread(&self) -> bool {
        lock(&self.state)
            .as_ref()
            .is_some_and(|r| r.dispatcher.owns_current_thread())
    }

    /// Adds `task` to the registry; returns false if it is already registered.
    ///
    /// The task is advanced from the next pass on. Registration works while idle too, but
    /// `stop()` clears the registry.
    pub fn register(&self, task: TaskRef) -> bool {
        self.core.registry.register(task)
    }

    /// Removes `task` by identity; returns true if it was registered.
    pub fn unregister(&self, task: &TaskRef) -> bool {
        self.core.registry.unregister(task)
    }

    /// Removes every task matching `pred`; returns how many were removed.
    ///
    /// An advance already dispatched to the async pool still runs to completion.
    pub fn remove<P>(&self, pred: P) -> usize
    where
        P: FnMut(&TaskRef) -> bool,
    {
        self.core.registry.remove_if(pred)
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.core.registry.len()
    }

    /// True if no task is registered.
    pub fn is_empty(&self) -> bool {
        self.core.registry.is_empty()
    }

    /// Lateness statistics of the update loop, as kept by the configured collector.
    pub fn stats(&self) -> &dyn SchedulerStats {
        self.core.stats.as_ref()
    }

    /// Creates a receiver for subsequent runtime events.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.core.bus.subscribe()
    }

    /// Current configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.cfg
    }

    // ---------------------------
    // Crate-internal plumbing
    // ---------------------------

    /// Loop job sender and loop-generation token of the current run.
    pub(crate) fn loop_channel(
        &self,
    ) -> Result<(UnboundedSender<Job>, CancellationToken), SchedulerError> {
        let state = lock(&self.state);
        let running = state.as_ref().ok_or(SchedulerError::NotStarted)?;
        Ok((
            running.update_loop.jobs.clone(),
            running.update_loop.token.clone(),
        ))
    }

    /// Dispatcher handle and run token of the current run.
    pub(crate) fn run_context(&self) -> Result<(Handle, CancellationToken), SchedulerError> {
        let state = lock(&self.state);
        let running = state.as_ref().ok_or(SchedulerError::NotStarted)?;
        Ok((running.dispatcher.handle().clone(), running.token.clone()))
    }

    /// Generation of the running loop, if any.
    pub(crate) fn generation(&self) -> Option<u64> {
        lock(&self.state).as_ref().map(|r| r.update_loop.generation)
    }

    /// Abandons the stalled loop `stalled` and resumes on a fresh thread.
    ///
    /// No-op if the scheduler stopped or the loop was already replaced meanwhile. The old
    /// thread cannot be killed: it is cancelled and detached, and leaves at its next task
    /// boundary if it ever wakes up.
    pub(crate) fn replace_loop(&self, stalled: u64, now: Instant) {
        let mut state = lock(&self.state);
        let Some(running) = state.as_mut() else {
            return;
        };
        if running.update_loop.generation != stalled {
            return;
        }

        running.update_loop.token.cancel();
        self.core.identity.clear();
        self.core.liveness.touch(now);
        self.core.stats.rebase();
        self.core.registry.register_first(self.bootstrap());

        let next = stalled + 1;
        let fresh = spawn_loop(
            Arc::clone(&self.core),
            running.dispatcher.handle().clone(),
            self.timing(),
            &self.cfg.thread_prefix,
            next,
            running.token.child_token(),
        );
        match fresh {
            Ok(fresh) => {
                let thread_name = fresh.thread_name.clone();
                // dropping the old JoinHandle detaches the stalled thread
                drop(std::mem::replace(&mut running.update_loop, fresh));
                self.core.bus.publish(
                    Event::new(EventKind::LoopRestarted)
                        .with_thread(thread_name.as_str())
                        .with_generation(next),
                );
                info!(thread = %thread_name, generation = next, "update loop restarted");
            }
            Err(e) => {
                error!(error = %e, "couldn't restart update loop");
                self.core.on_error.report(&e);
            }
        }
    }

    fn timing(&self) -> LoopTiming {
        LoopTiming {
            initial_delay: self.cfg.initial_delay,
            period: self.cfg.period_clamped(),
        }
    }

    /// Task capturing the identity of the thread that runs it.
    fn bootstrap(&self) -> TaskRef {
        let core = Arc::downgrade(&self.core);
        TaskOnce::arc("bootstrap", move |_| {
            if let Some(core) = core.upgrade() {
                core.identity.capture();
                debug!(thread = ?thread::current().name(), "loop identity captured");
            }
            Ok(())
        })
    }

    /// Forwards bus events to the subscriber set until the run token is cancelled.
    fn spawn_fanout(&self, rt: &Handle, token: &CancellationToken) {
        if self.subscribers.is_empty() {
            return;
        }
        let mut rx = self.core.bus.subscribe();
        let set = SubscriberSet::new(&self.subscribers, self.core.bus.clone(), rt);
        let token = token.clone();

        rt.spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(ev),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("running", &self.is_running())
            .field("tasks", &self.len())
            .field("generation", &self.generation())
            .finish()
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_running() { "running" } else { "stopped" };
        write!(
            f,
            "Scheduler[{status}, {} tasks] max {:?}, avg {:?}",
            self.len(),
            self.core.stats.max(),
            self.core.stats.avg()
        )
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
