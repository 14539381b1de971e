//! # Example: screens
//!
//! Two versions of the same screen, one that cleans up after itself and one
//! that leaks.
//!
//! Each screen:
//! - posts a deferred one-shot callback;
//! - runs a background loop that persists a `lastCheck` timestamp;
//! - keeps a click counter that remembers the screen it was clicked on.
//!
//! The safe screen registers everything as [`Scope::Bound`] and the counter
//! keeps only a weak reference. The leaky screen keeps a process-wide strong
//! reference, a self-repeating callback and a loop on a free-standing token,
//! all [`Scope::Detached`].
//!
//! ## Flow
//! ```text
//! Owner::create() ──► LifecycleSupervisor::attach()
//!     ├─► register(one-shot, repeating task, loop, references)
//!     ├─► clicks → ClickCounter::increment(&screen)
//!     ├─► Owner::destroy() ──► on_owner_destroyed()
//!     └─► LeakDetector::verify()
//!           ├─ safe  → Ok(report)
//!           └─ leaky → Err(Leaking { retained, live })
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example screens
//! cargo run --example screens --features logging
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use lifebound::{
    ActionError, ActionFn, BackgroundLoop, Config, LeakDetector, LifecycleSupervisor, Owner,
    ReferenceHandle, ScheduledTask, Scheduler, Scope, Strength, Subscribe,
};

/// In-memory stand-in for the screen's key/value preferences.
#[derive(Default)]
struct Prefs {
    values: Mutex<HashMap<&'static str, u128>>,
}

impl Prefs {
    fn put(&self, key: &'static str, value: u128) {
        self.values.lock().insert(key, value);
    }

    fn get(&self, key: &str) -> Option<u128> {
        self.values.lock().get(key).copied()
    }
}

/// Counts clicks and remembers the screen of the last click.
struct ClickCounter {
    count: AtomicU64,
    screen: ReferenceHandle,
}

impl ClickCounter {
    fn new(strength: Strength) -> Self {
        Self {
            count: AtomicU64::new(0),
            screen: ReferenceHandle::empty(strength),
        }
    }

    fn increment(&self, screen: &Arc<Owner>) -> u64 {
        self.screen.replace(screen);
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn persist_loop(period: Duration, token: CancellationToken, prefs: Arc<Prefs>) -> BackgroundLoop {
    BackgroundLoop::new(
        period,
        token,
        ActionFn::arc("persist-last-check", move |_ctx: CancellationToken| {
            let prefs = prefs.clone();
            async move {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|e| ActionError::Fail { error: e.to_string() })?;
                prefs.put("lastCheck", now.as_millis());
                Ok(())
            }
        }),
    )
}

fn subscribers(detector: &Arc<LeakDetector>) -> Vec<Arc<dyn Subscribe>> {
    #[allow(unused_mut)]
    let mut subs: Vec<Arc<dyn Subscribe>> = vec![detector.clone()];
    #[cfg(feature = "logging")]
    subs.push(Arc::new(lifebound::LogWriter::new()));
    subs
}

async fn safe_screen(scheduler: &Scheduler, detector: &Arc<LeakDetector>) -> anyhow::Result<()> {
    println!("== safe screen ==");
    let screen = Owner::create();
    let sup = LifecycleSupervisor::builder(Config::default())
        .with_scheduler(scheduler.clone())
        .with_subscribers(subscribers(detector))
        .attach(&screen)?;
    let prefs = Arc::new(Prefs::default());

    let deferred = ScheduledTask::once("deferred", Duration::from_millis(600), || {
        println!("[safe] deferred callback ran");
    });
    sup.register(&deferred, Scope::Bound).await?;

    let persist = persist_loop(Duration::from_millis(100), sup.scope_token(), prefs.clone());
    sup.register(&persist, Scope::Bound).await?;

    let counter = ClickCounter::new(Strength::Weak);
    sup.register(&counter.screen, Scope::Bound).await?;
    for _ in 0..3 {
        let n = counter.increment(&screen);
        println!("[safe] clicks: {n}");
    }

    tokio::time::sleep(Duration::from_millis(350)).await;
    println!("[safe] lastCheck = {:?}", prefs.get("lastCheck"));

    screen.destroy().await?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    println!("[safe] deferred fired {} time(s)", deferred.fire_count());
    println!("[safe] loop ticks after destroy stay at {}", persist.ticks());
    let report = detector.verify(&sup).await?;
    println!("[safe] leaking = {}", report.is_leaking());
    Ok(())
}

async fn leaky_screen(scheduler: &Scheduler, detector: &Arc<LeakDetector>) -> anyhow::Result<()> {
    println!("== leaky screen ==");
    let screen = Owner::create();
    let sup = LifecycleSupervisor::builder(Config::default())
        .with_scheduler(scheduler.clone())
        .with_subscribers(subscribers(detector))
        .attach(&screen)?;
    let prefs = Arc::new(Prefs::default());

    // process-wide "current screen" singleton
    let current = ReferenceHandle::strong(screen.clone());
    sup.register(&current, Scope::Detached).await?;

    let runnable = ScheduledTask::repeating("self-rescheduling", Duration::from_millis(100), || {
        println!("[leaky] runnable still running");
    });
    sup.register(&runnable, Scope::Detached).await?;

    let persist = persist_loop(Duration::from_millis(100), CancellationToken::new(), prefs.clone());
    sup.register(&persist, Scope::Detached).await?;

    let counter = ClickCounter::new(Strength::Strong);
    sup.register(&counter.screen, Scope::Detached).await?;
    for _ in 0..3 {
        let n = counter.increment(&screen);
        println!("[leaky] clicks: {n}");
    }

    screen.destroy().await?;
    drop(screen);
    tokio::time::sleep(Duration::from_millis(350)).await;

    let owner = sup.owner_id();
    println!(
        "[leaky] firings after destroy: {}",
        detector.firings_after_destroy(owner).await
    );
    match detector.verify(&sup).await {
        Ok(_) => println!("[leaky] unexpectedly clean"),
        Err(e) => println!("[leaky] {e}"),
    }

    for id in sup.ids(Scope::Detached).await {
        sup.release(id).await;
    }
    println!("[leaky] after manual release, leaking = {}", sup.is_leaking().await);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let scheduler = Scheduler::new();
    let stop = CancellationToken::new();
    let driver = scheduler.drive(Duration::from_millis(10), stop.clone());
    let detector = Arc::new(LeakDetector::new());

    safe_screen(&scheduler, &detector).await?;
    leaky_screen(&scheduler, &detector).await?;

    stop.cancel();
    driver.await?;
    Ok(())
}
