//! # Scheduler: cooperative virtual-time timer queue.
//!
//! Fires [`ScheduledTask`]s in due-time order when virtual time is advanced.
//! Time starts at zero and only moves forward through [`Scheduler::advance_by`],
//! [`Scheduler::advance_to`], or the optional [`Scheduler::drive`] task, so
//! tests are fully deterministic.
//!
//! ## Architecture
//! ```text
//! post(task) ──► BinaryHeap<(due, seq, task)>
//!
//! advance_to(t):
//!   while head.due <= t:
//!     pop head, now = head.due          (lock released before firing)
//!     task.fire()
//!       ├─ Skipped (cancelled)  → dropped
//!       ├─ Done                 → dropped
//!       └─ Rearm                → push (due + period)
//!   now = t
//! ```
//!
//! ## Rules
//! - Entries with equal due time fire in posting order.
//! - Actions run without the queue lock held; an action may post or cancel tasks.
//! - Cancellation is lazy: cancelled entries stay queued and are dropped at their due time.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use lifebound::{ScheduledTask, Scheduler};
//!
//! let sched = Scheduler::new();
//! let task = ScheduledTask::repeating("poll", Duration::from_secs(10), || {});
//! sched.post(&task).unwrap();
//!
//! assert_eq!(sched.advance_by(Duration::from_secs(25)), 2);
//! assert_eq!(task.fire_count(), 2);
//! ```

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::LifecycleError;
use crate::resources::{Fired, ScheduledTask};

struct Entry {
    due: Duration,
    seq: u64,
    task: ScheduledTask,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

#[derive(Default)]
struct Timeline {
    now: Duration,
    next_seq: u64,
    queue: BinaryHeap<Reverse<Entry>>,
}

impl Timeline {
    fn push(&mut self, due: Duration, task: ScheduledTask) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Entry { due, seq, task }));
    }

    /// Pops the head if it is due at or before `target`, moving `now` to its due time.
    fn pop_due(&mut self, target: Duration) -> Option<Entry> {
        let due = matches!(self.queue.peek(), Some(Reverse(e)) if e.due <= target);
        if !due {
            return None;
        }
        let Reverse(entry) = self.queue.pop()?;
        self.now = self.now.max(entry.due);
        Some(entry)
    }
}

/// Shared virtual-time scheduler. Clones drive the same timeline.
#[derive(Clone, Default)]
pub struct Scheduler {
    timeline: Arc<Mutex<Timeline>>,
}

impl Scheduler {
    /// Creates a scheduler at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.timeline.lock().now
    }

    /// Posts `task` to fire `task.interval()` from now.
    ///
    /// Posting a task that is already pending, already cancelled, or a one-shot
    /// that already fired is a no-op.
    pub fn post(&self, task: &ScheduledTask) -> Result<(), LifecycleError> {
        task.validate()?;
        let spent = !task.is_repeating() && task.fire_count() > 0;
        if task.is_cancelled() || spent || !task.arm() {
            return Ok(());
        }
        let mut tl = self.timeline.lock();
        let due = tl.now + task.interval();
        tl.push(due, task.clone());
        Ok(())
    }

    /// Advances virtual time by `d`, firing everything that becomes due.
    ///
    /// Returns the number of action invocations.
    pub fn advance_by(&self, d: Duration) -> usize {
        let target = self.now() + d;
        self.advance_to(target)
    }

    /// Advances virtual time to `target` (no-op if already past it).
    ///
    /// Returns the number of action invocations.
    pub fn advance_to(&self, target: Duration) -> usize {
        let mut fired = 0;
        loop {
            let entry = {
                let mut tl = self.timeline.lock();
                match tl.pop_due(target) {
                    Some(e) => e,
                    None => {
                        tl.now = tl.now.max(target);
                        break;
                    }
                }
            };

            match entry.task.fire() {
                Fired::Skipped => {}
                Fired::Done => fired += 1,
                Fired::Rearm => {
                    fired += 1;
                    let next = entry.due + entry.task.interval();
                    self.timeline.lock().push(next, entry.task);
                }
            }
        }
        fired
    }

    /// Jumps from due time to due time until nothing is pending or `limit`
    /// invocations have happened.
    ///
    /// A repeating task never goes idle on its own, so `limit` bounds the run.
    pub fn run_until_idle(&self, limit: usize) -> usize {
        let mut fired = 0;
        while fired < limit {
            let Some(due) = self.next_due() else { break };
            fired += self.advance_to(due);
        }
        fired
    }

    /// Number of queued entries that can still fire.
    pub fn pending(&self) -> usize {
        self.timeline
            .lock()
            .queue
            .iter()
            .filter(|Reverse(e)| !e.task.is_cancelled())
            .count()
    }

    /// Due time of the next entry that can still fire.
    pub fn next_due(&self) -> Option<Duration> {
        self.timeline
            .lock()
            .queue
            .iter()
            .filter(|Reverse(e)| !e.task.is_cancelled())
            .map(|Reverse(e)| e.due)
            .min()
    }

    /// Spawns a task that advances virtual time by `tick` on every tokio
    /// `tick` until `token` is cancelled.
    ///
    /// Must be called inside a tokio runtime.
    pub fn drive(&self, tick: Duration, token: CancellationToken) -> JoinHandle<()> {
        let sched = self.clone();
        let tick = tick.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut interval = time::interval(tick);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        sched.advance_by(tick);
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tl = self.timeline.lock();
        f.debug_struct("Scheduler")
            .field("now", &tl.now)
            .field("queued", &tl.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_once_fires_at_most_once() {
        let task = ScheduledTask::once("once", secs(5), || {});
        let sched = Scheduler::new();
        sched.post(&task).unwrap();

        assert_eq!(sched.advance_by(secs(4)), 0);
        assert_eq!(sched.advance_by(secs(1)), 1);
        assert_eq!(sched.advance_by(secs(100)), 0);
        assert_eq!(task.fire_count(), 1);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_repeating_fires_each_period() {
        let task = ScheduledTask::repeating("tick", secs(10), || {});
        let sched = Scheduler::new();
        sched.post(&task).unwrap();

        sched.advance_to(secs(45));
        assert_eq!(task.fire_count(), 4);
        assert_eq!(sched.now(), secs(45));
        assert_eq!(sched.next_due(), Some(secs(50)));
    }

    #[test]
    fn test_cancelled_repeating_never_rearms() {
        let task = ScheduledTask::repeating("tick", secs(10), || {});
        let sched = Scheduler::new();
        sched.post(&task).unwrap();

        sched.advance_by(secs(20));
        task.cancel();
        sched.advance_by(secs(1000));
        assert_eq!(task.fire_count(), 2);
        assert_eq!(sched.pending(), 0);
        assert!(!task.is_pending());
    }

    #[test]
    fn test_equal_due_times_fire_in_post_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let sched = Scheduler::new();
        for name in ["a", "b", "c"] {
            let order = order.clone();
            let task = ScheduledTask::once(name, secs(1), move || order.lock().push(name));
            sched.post(&task).unwrap();
        }
        sched.advance_by(secs(1));
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_action_may_post_more_work() {
        let sched = Scheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let inner_hits = hits.clone();
        let follow_up = ScheduledTask::once("follow-up", secs(1), move || {
            inner_hits.fetch_add(1, AtomicOrdering::SeqCst);
        });
        let s = sched.clone();
        let first = ScheduledTask::once("first", secs(1), move || {
            let _ = s.post(&follow_up);
        });
        sched.post(&first).unwrap();

        assert_eq!(sched.advance_by(secs(2)), 2);
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_double_post_is_noop() {
        let task = ScheduledTask::once("once", secs(1), || {});
        let sched = Scheduler::new();
        sched.post(&task).unwrap();
        sched.post(&task).unwrap();
        assert_eq!(sched.advance_by(secs(5)), 1);

        sched.post(&task).unwrap();
        assert_eq!(sched.advance_by(secs(5)), 0);
        assert_eq!(task.fire_count(), 1);
    }

    #[test]
    fn test_time_never_goes_backwards() {
        let sched = Scheduler::new();
        sched.advance_to(secs(10));
        sched.advance_to(secs(3));
        assert_eq!(sched.now(), secs(10));
    }

    #[test]
    fn test_run_until_idle_drains_one_shots() {
        let sched = Scheduler::new();
        let a = ScheduledTask::once("a", secs(3), || {});
        let b = ScheduledTask::once("b", secs(7), || {});
        sched.post(&a).unwrap();
        sched.post(&b).unwrap();

        assert_eq!(sched.run_until_idle(100), 2);
        assert_eq!(sched.now(), secs(7));
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_run_until_idle_bounded_by_limit() {
        let sched = Scheduler::new();
        let task = ScheduledTask::repeating("forever", secs(1), || {});
        sched.post(&task).unwrap();

        assert_eq!(sched.run_until_idle(5), 5);
        assert_eq!(task.fire_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_follows_tokio_clock() {
        let task = ScheduledTask::repeating("tick", Duration::from_millis(10), || {});
        let sched = Scheduler::new();
        sched.post(&task).unwrap();
        let token = CancellationToken::new();
        let driver = sched.drive(Duration::from_millis(5), token.clone());

        time::sleep(Duration::from_millis(32)).await;
        token.cancel();
        driver.await.unwrap();
        assert_eq!(task.fire_count(), 3);
    }
}
