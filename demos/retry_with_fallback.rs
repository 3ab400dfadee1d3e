//! # Example: retry_with_fallback
//!
//! Demonstrates bounded retries on the update loop, the fallback that runs once the
//! attempt budget is spent, and the async `future` bridge.
//!
//! ## Flow
//! ```text
//! pass 1: Retry(flaky) → Err("boom #1")   → swallowed, next attempt on the next pass
//! pass 2: Retry(flaky) → Err("boom #2")   → swallowed
//! pass 3: Retry(flaky) → Ok(())            → TaskPruned
//!
//! pass 1..4: Retry(broken, 4) → Err         → swallowed (no TaskFailed, no on_error)
//!            budget spent → failure handler("backend offline") + fallback → TaskPruned
//!
//! future: supplier on "demo-async" → consumer on "demo-loop-0"
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example retry_with_fallback
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
        mpsc,
    },
    time::Duration,
};

use tickvisor::{
    ErrorHandler, LogWriter, Scheduler, SchedulerConfig, Subscribe, TaskError, TaskFn, TaskRef,
};

static FAIL_COUNT: AtomicU64 = AtomicU64::new(0);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 1. Configure the scheduler (50ms period, failures logged by the default handler)
    let cfg = SchedulerConfig {
        period: Duration::from_millis(50),
        thread_prefix: "demo".to_string(),
        async_threads: 2,
        on_error: ErrorHandler::new(|e| eprintln!("[on_error] {e}")),
        ..SchedulerConfig::default()
    };

    // 2. Attach the built-in log subscriber
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let scheduler = Scheduler::builder(cfg).with_subscribers(subs).build();
    scheduler.start()?;

    // 3. A task that fails twice, then succeeds
    let flaky: TaskRef = TaskFn::arc("flaky", |_| {
        let n = FAIL_COUNT.fetch_add(1, Ordering::Relaxed) + 1;
        if n <= 2 {
            Err(TaskError::fail(format!("boom #{n}")))
        } else {
            println!("[flaky] succeeded on attempt {n}");
            Ok(())
        }
    });
    scheduler.retry(flaky, 5);

    // 4. A task that never succeeds; the fallback takes over after 4 attempts
    let (done_tx, done_rx) = mpsc::channel();
    let broken: TaskRef = TaskFn::arc("broken", |_| Err(TaskError::fail("backend offline")));
    let fallback: TaskRef = TaskFn::arc("use-cache", move |_| {
        println!("[fallback] serving cached value");
        let _ = done_tx.send(());
        Ok(())
    });
    scheduler.retry_with(broken, 4, fallback, |last| {
        println!("[broken] gave up: {last}");
    });

    // 5. Fetch off the loop thread, consume on it
    scheduler.future(
        || std::thread::current().name().map(str::to_string),
        |supplier| {
            let consumer = std::thread::current().name().map(str::to_string);
            println!("[future] supplied on {supplier:?}, consumed on {consumer:?}");
        },
    );

    done_rx.recv_timeout(Duration::from_secs(5))?;
    println!("{scheduler}");
    scheduler.stop()?;
    Ok(())
}
