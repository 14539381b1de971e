//! End-to-end lifecycle scenarios: bound vs detached resources across owner teardown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use lifebound::{
    ActionError, ActionFn, BackgroundLoop, CancelOutcome, Config, Event, EventKind, LeakDetector,
    LeakError, LifecycleError, LifecycleSupervisor, Owner, ReferenceHandle, ReleaseOutcome,
    ScheduledTask, Scheduler, Scope, Strength, Subscribe,
};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    (hits, move || {
        h.fetch_add(1, Ordering::SeqCst);
    })
}

fn counting_loop(period: Duration, token: CancellationToken, hits: Arc<AtomicUsize>) -> BackgroundLoop {
    BackgroundLoop::new(
        period,
        token,
        ActionFn::arc("counter", move |_ctx: CancellationToken| {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok::<(), ActionError>(())
            }
        }),
    )
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

#[tokio::test]
async fn bound_strong_reference_is_cleared_on_destroy() {
    let owner = Owner::create();
    let sup = LifecycleSupervisor::attach(&owner).unwrap();
    let h1 = ReferenceHandle::strong(owner.clone());
    sup.register(&h1, Scope::Bound).await.unwrap();

    owner.destroy().await.unwrap();

    assert!(h1.is_empty());
    assert!(h1.get::<Owner>().is_none());
    assert!(!sup.is_leaking().await);
    assert!(sup.is_empty().await);
}

#[tokio::test]
async fn detached_strong_reference_keeps_owner_and_leaks() {
    let owner = Owner::create();
    let sup = LifecycleSupervisor::attach(&owner).unwrap();
    let h2 = ReferenceHandle::strong(owner.clone());
    let id = sup.register(&h2, Scope::Detached).await.unwrap();

    owner.destroy().await.unwrap();

    assert!(h2.points_to(&owner));
    assert!(sup.is_leaking().await);
    assert_eq!(sup.ids(Scope::Detached).await, vec![id]);

    let err = LeakDetector::new().verify(&sup).await.unwrap_err();
    assert_eq!(
        err,
        LeakError::Leaking {
            owner: owner.id(),
            retained: vec![id],
            live: vec![],
        }
    );
}

#[tokio::test]
async fn detached_reference_keeps_owner_alive_after_caller_drops_it() {
    let owner = Owner::create();
    let probe = Arc::downgrade(&owner);
    let sup = LifecycleSupervisor::attach(&owner).unwrap();
    sup.register(ReferenceHandle::strong(owner.clone()), Scope::Detached)
        .await
        .unwrap();

    owner.destroy().await.unwrap();
    drop(owner);

    assert!(probe.upgrade().is_some(), "registry must still retain the owner");
    assert!(sup.is_leaking().await);
}

#[tokio::test]
async fn weak_detached_reference_is_not_a_leak() {
    let owner = Owner::create();
    let sup = LifecycleSupervisor::attach(&owner).unwrap();
    let weak = ReferenceHandle::weak(&owner);
    sup.register(&weak, Scope::Detached).await.unwrap();

    owner.destroy().await.unwrap();
    assert!(!sup.is_leaking().await);

    drop(owner);
    assert!(weak.is_empty());
}

#[tokio::test]
async fn bound_periodic_task_never_fires_after_destroy() {
    let owner = Owner::create();
    let sup = LifecycleSupervisor::attach(&owner).unwrap();
    let (hits, action) = counter();
    let task = ScheduledTask::repeating("poll", secs(10), action);
    sup.register(&task, Scope::Bound).await.unwrap();

    sup.scheduler().advance_to(secs(5));
    owner.destroy().await.unwrap();
    sup.scheduler().advance_to(secs(25));

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(task.is_cancelled());
    assert!(!task.can_fire());
}

#[tokio::test]
async fn bound_one_shot_fires_at_most_once() {
    let owner = Owner::create();
    let sup = LifecycleSupervisor::attach(&owner).unwrap();
    let (hits, action) = counter();
    let task = ScheduledTask::once("persist", secs(3), action);
    sup.register(&task, Scope::Bound).await.unwrap();

    sup.scheduler().advance_to(secs(100));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(task.cancel(), CancelOutcome::Cancelled);
    assert_eq!(task.cancel(), CancelOutcome::AlreadyCancelled);
}

#[tokio::test]
async fn detached_repeating_task_keeps_firing_after_destroy() {
    let owner = Owner::create();
    let sup = LifecycleSupervisor::attach(&owner).unwrap();
    let mut rx = sup.subscribe();
    let detector = LeakDetector::new();
    let (hits, action) = counter();
    let task = ScheduledTask::repeating("runnable", secs(1), action);
    let id = sup.register(&task, Scope::Detached).await.unwrap();

    sup.scheduler().advance_by(secs(3));
    owner.destroy().await.unwrap();
    sup.scheduler().advance_by(secs(5));

    assert_eq!(hits.load(Ordering::SeqCst), 8);
    assert!(sup.is_leaking().await);

    for ev in drain(&mut rx) {
        detector.update(&ev).await;
    }
    assert_eq!(detector.firings_after_destroy(owner.id()).await, 5);

    let report = detector.inspect(&sup).await;
    assert_eq!(report.live_tasks, vec![id]);
    assert!(report.is_leaking());

    // releasing the task is the only way to stop it
    assert_eq!(sup.release(id).await, ReleaseOutcome::Released);
    sup.scheduler().advance_by(secs(5));
    assert_eq!(hits.load(Ordering::SeqCst), 8);
    assert!(!sup.is_leaking().await);
}

#[tokio::test]
async fn teardown_is_idempotent() {
    let owner = Owner::create();
    let sup = LifecycleSupervisor::attach(&owner).unwrap();
    let mut rx = sup.subscribe();
    let h = ReferenceHandle::strong(Arc::new("payload"));
    sup.register(&h, Scope::Bound).await.unwrap();
    let kept = ReferenceHandle::strong(owner.clone());
    let kept_id = sup.register(&kept, Scope::Detached).await.unwrap();

    owner.destroy().await.unwrap();
    let first = drain(&mut rx);
    let after_first = sup.snapshot().await;
    assert!(sup.on_owner_destroyed().await.is_none());
    assert!(sup.on_owner_destroyed().await.is_none());

    assert_eq!(sup.snapshot().await, after_first);
    assert_eq!(sup.ids(Scope::Detached).await, vec![kept_id]);
    assert!(h.is_empty());
    assert!(kept.holds_strong());
    assert!(drain(&mut rx).is_empty());
    let destroyed = first
        .iter()
        .filter(|e| e.kind == EventKind::OwnerDestroyed)
        .count();
    assert_eq!(destroyed, 1);
}

#[tokio::test]
async fn register_after_destroy_is_rejected() {
    let owner = Owner::create();
    let sup = LifecycleSupervisor::attach(&owner).unwrap();
    let mut rx = sup.subscribe();
    owner.destroy().await.unwrap();

    let task = ScheduledTask::once("late", secs(1), || {});
    let err = sup.register(&task, Scope::Bound).await.unwrap_err();
    assert_eq!(
        err,
        LifecycleError::InvalidState {
            owner: owner.id(),
            reason: "owner_destroyed",
        }
    );
    assert!(sup.is_empty().await);
    assert!(drain(&mut rx).iter().any(|e| e.kind == EventKind::RegisterRejected));

    let again = owner.destroy().await.unwrap_err();
    assert_eq!(again.as_label(), "lifecycle_invalid_state");
}

#[tokio::test]
async fn attach_to_destroyed_owner_is_rejected() {
    let owner = Owner::create();
    owner.destroy().await.unwrap();
    assert!(matches!(
        LifecycleSupervisor::attach(&owner),
        Err(LifecycleError::InvalidState { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn bound_loop_stops_and_detached_loop_leaks() {
    let owner = Owner::create();
    let sup = LifecycleSupervisor::attach(&owner).unwrap();
    let bound_hits = Arc::new(AtomicUsize::new(0));
    let detached_hits = Arc::new(AtomicUsize::new(0));

    let bound = counting_loop(Duration::from_millis(10), sup.scope_token(), bound_hits.clone());
    let detached = counting_loop(
        Duration::from_millis(10),
        CancellationToken::new(),
        detached_hits.clone(),
    );
    sup.register(&bound, Scope::Bound).await.unwrap();
    let leaky = sup.register(&detached, Scope::Detached).await.unwrap();

    tokio::time::sleep(Duration::from_millis(35)).await;
    owner.destroy().await.unwrap();
    let stopped_at = bound_hits.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(stopped_at, 3);
    assert_eq!(bound_hits.load(Ordering::SeqCst), stopped_at);
    assert!(!bound.is_running());
    assert!(detached_hits.load(Ordering::SeqCst) >= 10);
    assert!(detached.can_fire());

    let report = LeakDetector::new().inspect(&sup).await;
    assert_eq!(report.live_loops, vec![leaky]);
    assert!(sup.is_leaking().await);

    assert_eq!(sup.release(leaky).await, ReleaseOutcome::Released);
    assert!(!detached.is_running());
    assert!(!sup.is_leaking().await);
}

#[tokio::test(start_paused = true)]
async fn cancelling_mid_sleep_stops_within_one_period() {
    let owner = Owner::create();
    let sup = LifecycleSupervisor::attach(&owner).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let lp = counting_loop(secs(60), sup.scope_token(), hits.clone());
    sup.register(&lp, Scope::Bound).await.unwrap();

    tokio::time::sleep(secs(1)).await;
    let started = tokio::time::Instant::now();
    owner.destroy().await.unwrap();

    assert!(started.elapsed() < secs(60));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(!lp.is_running());
}

#[tokio::test]
async fn owners_are_isolated() {
    let scheduler = Scheduler::new();
    let a = Owner::create();
    let b = Owner::create();
    let sup_a = LifecycleSupervisor::builder(Config::default())
        .with_scheduler(scheduler.clone())
        .attach(&a)
        .unwrap();
    let sup_b = LifecycleSupervisor::builder(Config::default())
        .with_scheduler(scheduler.clone())
        .attach(&b)
        .unwrap();

    let (hits_a, action_a) = counter();
    let (hits_b, action_b) = counter();
    sup_a
        .register(ScheduledTask::repeating("a", secs(1), action_a), Scope::Bound)
        .await
        .unwrap();
    sup_b
        .register(ScheduledTask::repeating("b", secs(1), action_b), Scope::Bound)
        .await
        .unwrap();
    let token_b = sup_b.scope_token();

    a.destroy().await.unwrap();
    scheduler.advance_by(secs(3));

    assert_eq!(hits_a.load(Ordering::SeqCst), 0);
    assert_eq!(hits_b.load(Ordering::SeqCst), 3);
    assert!(!token_b.is_cancelled());
    assert_eq!(sup_b.len().await, 1);
    assert!(!b.is_destroyed());
}

#[tokio::test]
async fn release_unknown_id_is_not_an_error() {
    let owner = Owner::create();
    let other = Owner::create();
    let sup = LifecycleSupervisor::attach(&owner).unwrap();
    let sup_other = LifecycleSupervisor::attach(&other).unwrap();

    let foreign = sup_other
        .register(ReferenceHandle::strong(Arc::new(1_u8)), Scope::Bound)
        .await
        .unwrap();
    assert_eq!(sup.release(foreign).await, ReleaseOutcome::Unknown);
    assert!(sup_other.contains(foreign).await);
}

#[tokio::test]
async fn teardown_events_in_order() {
    let owner = Owner::create();
    let sup = LifecycleSupervisor::attach(&owner).unwrap();
    let mut rx = sup.subscribe();
    sup.register(ReferenceHandle::strong(Arc::new(0_u32)), Scope::Bound)
        .await
        .unwrap();
    sup.register(ReferenceHandle::strong(owner.clone()), Scope::Detached)
        .await
        .unwrap();
    drain(&mut rx);

    owner.destroy().await.unwrap();
    let kinds: Vec<EventKind> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::OwnerDestroyed,
            EventKind::ResourceReleased,
            EventKind::DetachedRetained,
            EventKind::TeardownCompleted,
        ]
    );
}

#[tokio::test]
async fn clean_owner_verifies() {
    let owner = Owner::create();
    let sup = LifecycleSupervisor::attach(&owner).unwrap();
    let (_hits, action) = counter();
    sup.register(ScheduledTask::repeating("tick", secs(1), action), Scope::Bound)
        .await
        .unwrap();
    sup.register(ReferenceHandle::strong(owner.clone()), Scope::Bound)
        .await
        .unwrap();

    owner.destroy().await.unwrap();
    sup.scheduler().advance_by(secs(10));

    let report = LeakDetector::new().verify(&sup).await.unwrap();
    assert!(report.owner_destroyed);
    assert!(report.retained_strong.is_empty());
    assert!(!report.is_leaking());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn register_racing_destroy_is_torn_down_or_rejected() {
    let owner = Owner::create();
    let sup = LifecycleSupervisor::attach(&owner).unwrap();

    let mut joins = Vec::new();
    for i in 0..64_u32 {
        let sup = sup.clone();
        joins.push(tokio::spawn(async move {
            let h = ReferenceHandle::strong(Arc::new(i));
            let res = sup.register(&h, Scope::Bound).await;
            (h, res)
        }));
    }
    owner.destroy().await.unwrap();

    let (mut landed, mut rejected) = (0, 0);
    for join in joins {
        let (h, res) = join.await.unwrap();
        match res {
            Ok(id) => {
                assert!(!sup.contains(id).await, "{id} survived teardown");
                assert!(h.is_empty());
                assert!(h.is_sealed());
                landed += 1;
            }
            Err(e) => {
                assert!(matches!(e, LifecycleError::InvalidState { .. }), "{e}");
                assert_eq!(h.id(), None);
                rejected += 1;
            }
        }
    }
    assert_eq!(landed + rejected, 64);
    assert!(sup.is_empty().await);
    assert!(!sup.is_leaking().await);
}

#[tokio::test]
async fn bound_handle_cannot_reacquire_destroyed_owner() {
    let owner = Owner::create();
    let sup = LifecycleSupervisor::attach(&owner).unwrap();
    let last_screen = ReferenceHandle::empty(Strength::Strong);
    sup.register(&last_screen, Scope::Bound).await.unwrap();
    assert!(last_screen.replace(&owner));

    owner.destroy().await.unwrap();
    assert!(!last_screen.replace(&owner));
    assert!(!last_screen.holds_strong());
    assert!(!last_screen.points_to(&owner));
    assert_eq!(Arc::strong_count(&owner), 1);
}

#[tokio::test(start_paused = true)]
async fn bound_tick_in_flight_at_destroy_is_not_a_leak() {
    let owner = Owner::create();
    let det = Arc::new(LeakDetector::new());
    let sup = LifecycleSupervisor::builder(Config::default())
        .with_subscribers(vec![det.clone() as Arc<dyn Subscribe>])
        .attach(&owner)
        .unwrap();
    let mut rx = sup.subscribe();
    let lp = BackgroundLoop::new(
        Duration::from_millis(10),
        sup.scope_token(),
        ActionFn::arc("slow-save", |_ctx: CancellationToken| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<(), ActionError>(())
        }),
    );
    sup.register(&lp, Scope::Bound).await.unwrap();

    tokio::time::sleep(Duration::from_millis(12)).await;
    owner.destroy().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let events = drain(&mut rx);
    let destroyed = events
        .iter()
        .find(|e| e.kind == EventKind::OwnerDestroyed)
        .map(|e| e.seq)
        .unwrap();
    assert!(
        events
            .iter()
            .any(|e| e.kind == EventKind::LoopTick && e.seq > destroyed)
    );
    assert_eq!(lp.ticks(), 1);
    assert!(!lp.is_running());

    assert!(det.saw_destroyed(owner.id()).await);
    assert_eq!(det.firings_after_destroy(owner.id()).await, 0);
    let report = det.verify(&sup).await.unwrap();
    assert!(!report.is_leaking());
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Subscribe for DropFlag {
    async fn on_event(&self, _ev: &Event) {}

    fn name(&self) -> &'static str {
        "drop-flag"
    }
}

#[tokio::test]
async fn subscriber_workers_stop_after_supervisor_is_dropped() {
    let gone = Arc::new(AtomicBool::new(false));
    let det = Arc::new(LeakDetector::new());
    let owner = Owner::create();
    let owner_id = owner.id();
    let subs: Vec<Arc<dyn Subscribe>> = vec![
        Arc::new(DropFlag(gone.clone())) as Arc<dyn Subscribe>,
        det.clone() as Arc<dyn Subscribe>,
    ];
    let sup = LifecycleSupervisor::builder(Config::default())
        .with_subscribers(subs)
        .attach(&owner)
        .unwrap();

    owner.destroy().await.unwrap();
    drop(sup);
    drop(owner);

    for _ in 0..200 {
        if gone.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(gone.load(Ordering::SeqCst), "subscriber worker still alive");
    // events published before the drop are still delivered
    assert!(det.saw_destroyed(owner_id).await);
}
