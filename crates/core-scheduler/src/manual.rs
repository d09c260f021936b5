use crate::{CancelToken, Scheduler, Task};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

struct Pending {
    token: CancelToken,
    task: Task,
}

/// Queue ordered by (due time, insertion sequence) so equal deadlines run FIFO.
#[derive(Default)]
struct Timeline {
    now: Duration,
    seq: u64,
    queue: BTreeMap<(Duration, u64), Pending>,
}

impl Timeline {
    fn pop_due(&mut self, limit: Option<Duration>) -> Option<Pending> {
        let key = *self.queue.keys().next()?;
        if let Some(limit) = limit
            && key.0 > limit
        {
            return None;
        }
        let pending = self.queue.remove(&key)?;
        self.now = self.now.max(key.0);
        Some(pending)
    }

    /// Drop entries whose token was cancelled after they were queued.
    fn prune(&mut self) {
        self.queue.retain(|_, p| !p.token.is_cancelled());
    }
}

/// Deterministic scheduler driven by a virtual clock.
///
/// Time only moves inside [`advance`](Self::advance),
/// [`run_next`](Self::run_next) and [`run_until_idle`](Self::run_until_idle).
/// Tasks run on the calling thread with the queue lock released, so a task may
/// schedule follow-up work on the same scheduler.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    timeline: Arc<Mutex<Timeline>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Timeline> {
        self.timeline
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current virtual time since creation.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of queued tasks whose token is still live.
    pub fn pending(&self) -> usize {
        let mut timeline = self.lock();
        timeline.prune();
        timeline.queue.len()
    }

    /// Due time of the earliest task that can still run.
    pub fn next_due(&self) -> Option<Duration> {
        let mut timeline = self.lock();
        timeline.prune();
        timeline.queue.keys().next().map(|(due, _)| *due)
    }

    /// Move the clock forward by `by`, running every task that falls due on
    /// the way (including tasks scheduled by those tasks). Returns the number
    /// of tasks executed.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let mut ran = 0;
        loop {
            let next = self.lock().pop_due(Some(target));
            let Some(pending) = next else { break };
            if run(pending) {
                ran += 1;
            }
        }
        let mut timeline = self.lock();
        timeline.now = timeline.now.max(target);
        ran
    }

    /// Jump to the earliest queued task and run it. Returns `false` when the
    /// queue is empty. Cancelled tasks are discarded and count as a step.
    pub fn run_next(&self) -> bool {
        let next = self.lock().pop_due(None);
        match next {
            Some(pending) => {
                run(pending);
                true
            }
            None => false,
        }
    }

    /// Drain the queue, jumping the clock from deadline to deadline. Stops
    /// after `max_steps` tasks to guard against self-perpetuating schedules.
    /// Returns the number of tasks executed.
    pub fn run_until_idle(&self, max_steps: usize) -> usize {
        let mut ran = 0;
        for _ in 0..max_steps {
            let next = self.lock().pop_due(None);
            let Some(pending) = next else { break };
            if run(pending) {
                ran += 1;
            }
        }
        ran
    }
}

fn run(pending: Pending) -> bool {
    if pending.token.is_cancelled() {
        tracing::trace!(target: "scheduler", "manual_task_skipped");
        return false;
    }
    (pending.task)();
    true
}

impl Scheduler for ManualScheduler {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn schedule_after(&self, delay: Duration, token: &CancelToken, task: Task) {
        if token.is_cancelled() {
            return;
        }
        let mut timeline = self.lock();
        let key = (timeline.now + delay, timeline.seq);
        timeline.seq += 1;
        timeline.queue.insert(
            key,
            Pending {
                token: token.clone(),
                task,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = log.clone();
            move |label: &'static str| -> Task {
                let log = log.clone();
                Box::new(move || log.lock().unwrap().push(label))
            }
        };
        (log, make)
    }

    #[test]
    fn tasks_run_in_deadline_then_fifo_order() {
        let sched = ManualScheduler::new();
        let token = CancelToken::new();
        let (log, task) = recorder();
        sched.schedule_after(Duration::from_millis(20), &token, task("late"));
        sched.schedule_after(Duration::from_millis(10), &token, task("first"));
        sched.schedule_after(Duration::from_millis(10), &token, task("second"));
        assert_eq!(sched.pending(), 3);
        assert_eq!(sched.advance(Duration::from_millis(15)), 2);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(sched.now(), Duration::from_millis(15));
        assert_eq!(sched.advance(Duration::from_millis(5)), 1);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "late"]);
    }

    #[test]
    fn cancelled_tasks_never_run() {
        let sched = ManualScheduler::new();
        let live = CancelToken::new();
        let dead = CancelToken::new();
        let (log, task) = recorder();
        sched.schedule_after(Duration::from_millis(5), &dead, task("dead"));
        sched.schedule_after(Duration::from_millis(5), &live, task("live"));
        dead.cancel();
        assert_eq!(sched.pending(), 1);
        assert_eq!(sched.run_until_idle(10), 1);
        assert_eq!(*log.lock().unwrap(), vec!["live"]);
        sched.schedule_after(Duration::from_millis(1), &dead, task("ignored"));
        assert_eq!(sched.next_due(), None);
    }

    #[test]
    fn next_due_ignores_cancelled_work() {
        let sched = ManualScheduler::new();
        let early = CancelToken::new();
        let late = CancelToken::new();
        let (log, task) = recorder();
        sched.schedule_after(Duration::from_millis(5), &early, task("early"));
        sched.schedule_after(Duration::from_millis(50), &late, task("late"));
        assert_eq!(sched.next_due(), Some(Duration::from_millis(5)));

        early.cancel();
        assert_eq!(sched.next_due(), Some(Duration::from_millis(50)));
        late.cancel();
        assert_eq!(sched.next_due(), None);
        assert_eq!(sched.pending(), 0);
        assert!(!sched.run_next());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn tasks_may_schedule_follow_ups() {
        let sched = ManualScheduler::new();
        let token = CancelToken::new();
        let hits = Arc::new(Mutex::new(0u32));

        fn chain(sched: ManualScheduler, token: CancelToken, hits: Arc<Mutex<u32>>) {
            let next = sched.clone();
            let tok = token.clone();
            sched.schedule_after(
                Duration::from_millis(10),
                &token,
                Box::new(move || {
                    let mut h = hits.lock().unwrap();
                    *h += 1;
                    if *h < 5 {
                        drop(h);
                        chain(next, tok, hits.clone());
                    }
                }),
            );
        }

        chain(sched.clone(), token, hits.clone());
        assert_eq!(sched.run_until_idle(100), 5);
        assert_eq!(*hits.lock().unwrap(), 5);
        assert_eq!(sched.now(), Duration::from_millis(50));
    }

    #[test]
    fn run_until_idle_respects_step_limit() {
        let sched = ManualScheduler::new();
        let token = CancelToken::new();
        let (_log, task) = recorder();
        for _ in 0..4 {
            sched.schedule_after(Duration::ZERO, &token, task("x"));
        }
        assert_eq!(sched.run_until_idle(3), 3);
        assert!(sched.run_next());
        assert!(!sched.run_next());
    }
}
