use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use super::watchdog::WatchdogTimings;
use super::{ErrorHandler, Scheduler, SchedulerBuilder, SchedulerConfig};
use crate::error::{SchedulerError, TaskError};
use crate::events::{Event, EventKind};
use crate::stats::{RollingStats, SchedulerStats};
use crate::tasks::{RepeatMode, TaskFn, TaskOnce, TaskRef};

fn cfg() -> SchedulerConfig {
    SchedulerConfig {
        period: Duration::from_millis(2),
        thread_prefix: "t".to_string(),
        async_threads: 2,
        ..SchedulerConfig::default()
    }
}

fn started(cfg: SchedulerConfig) -> Arc<Scheduler> {
    let s = Scheduler::new(cfg);
    s.start().unwrap();
    s
}

fn counting(name: &'static str, hits: &Arc<AtomicU32>) -> TaskRef {
    let h = hits.clone();
    TaskFn::arc(name, move |_| {
        h.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

fn next_event(
    rx: &mut broadcast::Receiver<Event>,
    kind: EventKind,
    timeout: Duration,
) -> Option<Event> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        match rx.try_recv() {
            Ok(ev) if ev.kind == kind => return Some(ev),
            Ok(_) => continue,
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => thread::sleep(Duration::from_millis(2)),
        }
    }
    None
}

#[test]
fn test_start_twice_and_stop_idle_fail() {
    let s = Scheduler::new(cfg());
    assert!(matches!(s.stop(), Err(SchedulerError::NotStarted)));

    s.start().unwrap();
    assert!(s.is_running());
    assert!(matches!(s.start(), Err(SchedulerError::AlreadyStarted)));

    s.stop().unwrap();
    assert!(s.is_stopped());
    assert!(matches!(s.stop(), Err(SchedulerError::NotStarted)));
}

#[test]
fn test_completed_tasks_are_pruned() {
    let s = started(cfg());
    let hits = Arc::new(AtomicU32::new(0));
    let t = counting("once", &hits);
    assert!(s.register(t.clone()));
    assert!(!s.register(t.clone()));

    assert!(wait_until(Duration::from_secs(2), || !s.core().registry.contains(&t)));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    s.stop().unwrap();
}

#[test]
fn test_stop_discards_pending_tasks_and_restart_works() {
    let s = started(cfg());
    s.register_repeating(TaskFn::arc("forever", |_| Ok(())), RepeatMode::Forever);
    s.register_delayed(TaskFn::arc("later", |_| Ok(())), Duration::from_secs(60));
    assert!(s.len() >= 2);

    s.stop().unwrap();
    assert!(s.is_empty());

    s.start().unwrap();
    let hits = Arc::new(AtomicU32::new(0));
    s.register(counting("after-restart", &hits));
    assert!(wait_until(Duration::from_secs(2), || hits.load(Ordering::SeqCst) == 1));
    s.stop().unwrap();
}

#[test]
fn test_task_errors_reach_the_error_handler_and_task_stays() {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = seen.clone();
    let s = started(SchedulerConfig {
        on_error: ErrorHandler::new(move |e| sink.lock().unwrap().push(e.to_string())),
        ..cfg()
    });
    let mut rx = s.events();

    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();
    let t = s.register_fn("flaky", move |_| {
        if c.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(TaskError::fail("not yet"))
        } else {
            Ok(())
        }
    });

    let failed = next_event(&mut rx, EventKind::TaskFailed, Duration::from_secs(2)).unwrap();
    assert_eq!(failed.task.as_deref(), Some("flaky"));
    assert!(wait_until(Duration::from_secs(2), || !s.core().registry.contains(&t)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(seen.lock().unwrap().len(), 2);
    s.stop().unwrap();
}

#[test]
fn test_panicking_task_is_reported_not_fatal() {
    let s = started(cfg());
    let mut rx = s.events();
    s.register(TaskOnce::arc("boom", |_| panic!("kaboom")));

    let ev = next_event(&mut rx, EventKind::TaskFailed, Duration::from_secs(2)).unwrap();
    assert!(ev.reason.as_deref().unwrap_or_default().contains("kaboom"));
    assert_eq!(s.await_sync(|| 7).unwrap(), 7);
    s.stop().unwrap();
}

#[test]
fn test_await_sync_runs_on_loop_thread() {
    let s = started(cfg());
    let name = s
        .await_sync(|| thread::current().name().map(str::to_string))
        .unwrap();
    assert_eq!(name.as_deref(), Some("t-loop-0"));

    let inner = s.clone();
    // from inside the loop thread the call short-circuits instead of deadlocking
    let nested = s.await_sync(move || inner.await_sync(|| 41).map(|v| v + 1)).unwrap();
    assert_eq!(nested.unwrap(), 42);
    s.stop().unwrap();
}

#[test]
fn test_await_sync_reports_panics() {
    let s = started(cfg());
    let res: Result<(), _> = s.await_sync(|| panic!("inside"));
    match res {
        Err(SchedulerError::Task { error, .. }) => {
            assert!(matches!(error, TaskError::Panicked { .. }));
        }
        other => panic!("unexpected: {other:?}"),
    }
    s.stop().unwrap();
}

#[test]
fn test_await_async_runs_on_dispatcher() {
    let s = started(cfg());
    let name = s
        .await_async(|| thread::current().name().map(str::to_string))
        .unwrap();
    assert_eq!(name.as_deref(), Some("t-async"));
    assert!(!s.on_scheduler_thread());
    s.stop().unwrap();
}

#[test]
fn test_await_async_from_async_task_runs_inline() {
    let s = started(SchedulerConfig {
        async_threads: 1,
        ..cfg()
    });
    let out = Arc::new(Mutex::new(None));
    let (o, inner) = (out.clone(), s.clone());
    s.register_async(TaskOnce::arc("nested", move |_| {
        let res = inner
            .await_async(|| thread::current().name().map(str::to_string))
            .map_err(|e| e.to_string());
        *o.lock().unwrap() = Some(res);
        Ok(())
    }));

    // a single pool slot is already taken by the caller
    assert!(wait_until(Duration::from_secs(3), || out.lock().unwrap().is_some()));
    let res = out.lock().unwrap().take().unwrap();
    assert_eq!(res.unwrap().as_deref(), Some("t-async"));
    assert!(!s.on_dispatcher_thread());
    s.stop().unwrap();
}

#[test]
fn test_await_all_on_dispatcher_thread_is_rejected() {
    let s = started(SchedulerConfig {
        async_threads: 1,
        ..cfg()
    });
    let rejected = Arc::new(Mutex::new(None));
    let (r, inner) = (rejected.clone(), s.clone());
    s.register_async(TaskOnce::arc("nested-all", move |_| {
        let res = inner.await_all(vec![TaskFn::arc("x", |_| Ok(())) as TaskRef]);
        *r.lock().unwrap() = Some(matches!(res, Err(SchedulerError::InvalidArgument { .. })));
        Ok(())
    }));

    assert!(wait_until(Duration::from_secs(3), || rejected.lock().unwrap().is_some()));
    assert_eq!(*rejected.lock().unwrap(), Some(true));
    s.stop().unwrap();
}

#[test]
fn test_await_requires_running_scheduler() {
    let s = Scheduler::new(cfg());
    assert!(matches!(s.await_sync(|| ()), Err(SchedulerError::NotStarted)));
    assert!(matches!(s.await_async(|| ()), Err(SchedulerError::NotStarted)));
    assert!(matches!(s.execute(|| ()), Err(SchedulerError::NotStarted)));
}

#[test]
fn test_await_all_waits_for_every_task() {
    let s = started(cfg());
    let hits = Arc::new(AtomicU32::new(0));
    let tasks: Vec<TaskRef> = (0..5).map(|_| counting("batch", &hits)).collect();

    s.await_all(tasks).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 5);
    s.await_all(Vec::new()).unwrap();
    s.stop().unwrap();
}

#[test]
fn test_await_all_on_loop_thread_is_rejected() {
    let s = started(cfg());
    let inner = s.clone();
    let res = s
        .await_sync(move || inner.await_all(vec![TaskFn::arc("x", |_| Ok(())) as TaskRef]))
        .unwrap();
    assert!(matches!(res, Err(SchedulerError::InvalidArgument { .. })));
    s.stop().unwrap();
}

#[test]
fn test_await_all_ends_with_stopped_on_stop() {
    let s = started(cfg());
    let never: TaskRef = TaskFn::arc("never", |_| Err(TaskError::fail("again")));

    let stopper = s.clone();
    let h = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        stopper.stop().unwrap();
    });
    assert!(matches!(s.await_all(vec![never]), Err(SchedulerError::Stopped)));
    h.join().unwrap();
}

#[test]
fn test_future_consumes_on_loop_thread() {
    let s = started(cfg());
    let out = Arc::new(Mutex::new(None));
    let o = out.clone();
    s.future(
        || thread::current().name().map(str::to_string),
        move |supplier_thread| {
            let consumer_thread = thread::current().name().map(str::to_string);
            *o.lock().unwrap() = Some((supplier_thread, consumer_thread));
        },
    );

    assert!(wait_until(Duration::from_secs(2), || out.lock().unwrap().is_some()));
    let (supplier, consumer) = out.lock().unwrap().clone().unwrap();
    assert_eq!(supplier.as_deref(), Some("t-async"));
    assert_eq!(consumer.as_deref(), Some("t-loop-0"));
    s.stop().unwrap();
}

#[test]
fn test_future_with_routes_failures_to_handler() {
    let s = started(cfg());
    let errors = Arc::new(Mutex::new(Vec::<String>::new()));

    let e = errors.clone();
    s.future_with(
        || Err::<u32, _>(TaskError::fail("no value")),
        |_| Ok(()),
        move |err| e.lock().unwrap().push(err.to_string()),
    );
    let e = errors.clone();
    s.future_with(
        || Ok(3u32),
        |_| panic!("consumer broke"),
        move |err| e.lock().unwrap().push(err.to_string()),
    );

    assert!(wait_until(Duration::from_secs(2), || errors.lock().unwrap().len() == 2));
    let errors = errors.lock().unwrap();
    assert!(errors.iter().any(|e| e.contains("no value")));
    assert!(errors.iter().any(|e| e.contains("consumer broke")));
    drop(errors);
    s.stop().unwrap();
}

#[test]
fn test_execute_runs_job_on_loop_thread() {
    let s = started(cfg());
    let seen = Arc::new(Mutex::new(None));
    let o = seen.clone();
    let inner = s.clone();
    s.execute(move || *o.lock().unwrap() = Some(inner.on_scheduler_thread()))
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || seen.lock().unwrap().is_some()));
    assert_eq!(*seen.lock().unwrap(), Some(true));
    s.stop().unwrap();
}

#[test]
fn test_tick_and_repeat_helpers() {
    let s = started(cfg());
    assert!(matches!(
        s.register_tick(TaskFn::arc("zero", |_| Ok(())), 0),
        Err(SchedulerError::InvalidArgument { .. })
    ));

    let ticks = Arc::new(AtomicU32::new(0));
    let t = s
        .register_repeating_tick(counting("every-3", &ticks), RepeatMode::Forever, 3)
        .unwrap();
    assert!(wait_until(Duration::from_secs(2), || ticks.load(Ordering::SeqCst) >= 3));
    assert!(s.unregister(&t));

    let left = Arc::new(AtomicU32::new(3));
    let l = left.clone();
    let until = s.register_repeating(
        TaskFn::arc("countdown", move |_| {
            l.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }),
        RepeatMode::until({
            let left = left.clone();
            move || left.load(Ordering::SeqCst) == 0
        }),
    );
    assert!(wait_until(Duration::from_secs(2), || !s.core().registry.contains(&until)));
    assert_eq!(left.load(Ordering::SeqCst), 0);
    s.stop().unwrap();
}

#[test]
fn test_retry_with_exhaustion_runs_fallback() {
    let reported = Arc::new(AtomicU32::new(0));
    let r = reported.clone();
    let s = started(SchedulerConfig {
        on_error: ErrorHandler::new(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        }),
        ..cfg()
    });
    let mut rx = s.events();
    let fallback_hits = Arc::new(AtomicU32::new(0));
    let handled = Arc::new(AtomicU32::new(0));
    let h = handled.clone();

    let t = s.retry_with(
        TaskFn::arc("always-fails", |_| Err(TaskError::fail("nope"))),
        3,
        counting("fallback", &fallback_hits),
        move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        },
    );
    assert!(wait_until(Duration::from_secs(2), || !s.core().registry.contains(&t)));
    assert_eq!(fallback_hits.load(Ordering::SeqCst), 1);
    assert_eq!(handled.load(Ordering::SeqCst), 1);

    // failed attempts stay inside Retry
    assert_eq!(reported.load(Ordering::SeqCst), 0);
    assert!(next_event(&mut rx, EventKind::TaskFailed, Duration::from_millis(50)).is_none());
    s.stop().unwrap();
}

#[test]
fn test_retry_future_delivers_after_failures() {
    let s = started(cfg());
    let attempts = Arc::new(AtomicUsize::new(0));
    let got = Arc::new(Mutex::new(None));

    let a = attempts.clone();
    let g = got.clone();
    s.retry_future(
        move || {
            if a.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TaskError::fail("warming up"))
            } else {
                Ok(String::from("ready"))
            }
        },
        move |v: &String| {
            *g.lock().unwrap() = Some(v.clone());
            Ok(())
        },
        5,
    );

    assert!(wait_until(Duration::from_secs(2), || got.lock().unwrap().is_some()));
    assert_eq!(got.lock().unwrap().as_deref(), Some("ready"));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    s.stop().unwrap();
}

#[test]
fn test_async_then_runs_continuation_after_delegate() {
    let s = started(cfg());
    let order = Arc::new(Mutex::new(Vec::new()));
    let (a, b) = (order.clone(), order.clone());
    s.register_async_then(
        TaskFn::arc("work", move |_| {
            a.lock().unwrap().push("work");
            Ok(())
        }),
        TaskOnce::arc("done", move |_| {
            b.lock().unwrap().push("done");
            Ok(())
        }),
    );
    assert!(wait_until(Duration::from_secs(2), || order.lock().unwrap().len() == 2));
    assert_eq!(*order.lock().unwrap(), ["work", "done"]);
    s.stop().unwrap();
}

#[test]
fn test_remove_while_registering_from_many_threads() {
    let s = started(cfg());
    let keep: Vec<Arc<AtomicU32>> = (0..4).map(|_| Arc::new(AtomicU32::new(0))).collect();
    let gone: Vec<Arc<AtomicU32>> = (0..4).map(|_| Arc::new(AtomicU32::new(0))).collect();
    let late: Vec<Arc<AtomicU32>> = (0..4).map(|_| Arc::new(AtomicU32::new(0))).collect();

    let handles: Vec<_> = keep
        .iter()
        .zip(&gone)
        .map(|(k, g)| {
            let (s, k, g) = (s.clone(), k.clone(), g.clone());
            thread::spawn(move || {
                s.register_repeating(counting("keep", &k), RepeatMode::Forever);
                s.register_repeating(counting("gone", &g), RepeatMode::Forever);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert!(wait_until(Duration::from_secs(2), || {
        keep.iter().chain(&gone).all(|c| c.load(Ordering::SeqCst) > 0)
    }));

    // more registrations race the removal while passes keep iterating
    let handles: Vec<_> = late
        .iter()
        .map(|c| {
            let (s, c) = (s.clone(), c.clone());
            thread::spawn(move || {
                s.register_repeating(counting("late", &c), RepeatMode::Forever);
            })
        })
        .collect();
    assert_eq!(s.remove(|t| t.name() == "gone"), 4);
    for h in handles {
        h.join().unwrap();
    }

    // a pass in flight during remove() may still advance; wait for it to end
    s.await_sync(|| ()).unwrap();
    let frozen: Vec<u32> = gone.iter().map(|c| c.load(Ordering::SeqCst)).collect();
    let before: Vec<u32> = keep.iter().chain(&late).map(|c| c.load(Ordering::SeqCst)).collect();
    assert!(wait_until(Duration::from_secs(2), || {
        keep.iter()
            .chain(&late)
            .zip(&before)
            .all(|(c, b)| c.load(Ordering::SeqCst) > *b + 2)
    }));
    let after: Vec<u32> = gone.iter().map(|c| c.load(Ordering::SeqCst)).collect();
    assert_eq!(frozen, after);
    assert_eq!(s.len(), 8);
    s.stop().unwrap();
}

#[derive(Default)]
struct PassCounter {
    passes: AtomicU32,
    rebases: AtomicU32,
}

impl SchedulerStats for PassCounter {
    fn update(&self, _now: Instant) {
        self.passes.fetch_add(1, Ordering::SeqCst);
    }

    fn max(&self) -> Duration {
        Duration::from_millis(7)
    }

    fn avg(&self) -> Duration {
        Duration::from_millis(3)
    }

    fn rebase(&self) {
        self.rebases.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_custom_stats_collector_sees_every_pass_and_display() {
    let counter = Arc::new(PassCounter::default());
    let s = SchedulerBuilder::new(cfg()).with_stats(counter.clone()).build();
    s.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        counter.passes.load(Ordering::SeqCst) >= 5
    }));
    assert_eq!(counter.rebases.load(Ordering::SeqCst), 1);
    assert_eq!(s.stats().max(), Duration::from_millis(7));

    let shown = s.to_string();
    assert!(shown.starts_with("Scheduler[running"));
    assert!(shown.ends_with("max 7ms, avg 3ms"));
    s.stop().unwrap();
    assert!(s.to_string().starts_with("Scheduler[stopped, 0 tasks]"));

    s.start().unwrap();
    assert_eq!(counter.rebases.load(Ordering::SeqCst), 2);
    s.stop().unwrap();
}

#[test]
fn test_idle_time_between_runs_is_not_lateness() {
    let stats = Arc::new(RollingStats::new(Duration::from_millis(2), 1000));
    let s = SchedulerBuilder::new(cfg()).with_stats(stats.clone()).build();
    s.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || stats.samples() >= 3));
    s.stop().unwrap();

    thread::sleep(Duration::from_millis(300));
    let before = stats.samples();
    s.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || stats.samples() >= before + 3));
    assert!(stats.max() < Duration::from_millis(200), "max = {:?}", stats.max());
    s.stop().unwrap();
}

#[test]
fn test_watchdog_evicts_blocking_task_and_restarts_loop() {
    let stalls = Arc::new(AtomicU32::new(0));
    let st = stalls.clone();
    let s = SchedulerBuilder::new(SchedulerConfig {
        on_error: ErrorHandler::new(move |e| {
            if matches!(e, SchedulerError::Stalled { .. }) {
                st.fetch_add(1, Ordering::SeqCst);
            }
        }),
        ..cfg()
    })
    .with_watchdog_timings(WatchdogTimings {
        grace: Duration::from_millis(50),
        interval: Duration::from_millis(20),
        threshold: Duration::from_millis(150),
    })
    .build();
    s.start().unwrap();
    let mut rx = s.events();

    let survivor_hits = Arc::new(AtomicU32::new(0));
    s.register_repeating(counting("survivor", &survivor_hits), RepeatMode::Forever);
    assert!(wait_until(Duration::from_secs(2), || {
        survivor_hits.load(Ordering::SeqCst) > 0
    }));

    let blocker: TaskRef = TaskFn::arc("blocker", |_| {
        thread::sleep(Duration::from_millis(800));
        Ok(())
    });
    s.register(blocker.clone());

    let stalled = next_event(&mut rx, EventKind::LoopStalled, Duration::from_secs(3)).unwrap();
    assert_eq!(stalled.task.as_deref(), Some("blocker"));
    assert_eq!(stalled.thread.as_deref(), Some("t-loop-0"));

    let evicted = next_event(&mut rx, EventKind::TaskEvicted, Duration::from_secs(1)).unwrap();
    assert_eq!(evicted.task.as_deref(), Some("blocker"));
    let restarted = next_event(&mut rx, EventKind::LoopRestarted, Duration::from_secs(1)).unwrap();
    assert_eq!(restarted.generation, Some(1));

    assert!(!s.core().registry.contains(&blocker));
    assert_eq!(stalls.load(Ordering::SeqCst), 1);

    // the remaining registry keeps running on the new thread
    let before = survivor_hits.load(Ordering::SeqCst);
    assert!(wait_until(Duration::from_secs(2), || {
        survivor_hits.load(Ordering::SeqCst) > before + 3
    }));
    let name = s
        .await_sync(|| thread::current().name().map(str::to_string))
        .unwrap();
    assert_eq!(name.as_deref(), Some("t-loop-1"));
    let inner = s.clone();
    assert!(s.await_sync(move || inner.on_scheduler_thread()).unwrap());

    s.stop().unwrap();
}
