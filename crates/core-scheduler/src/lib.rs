//! Delayed task scheduling for the selection engines.
//!
//! Engines never sleep. They hand the scheduler a closure plus the session's
//! [`CancelToken`] and a delay; the scheduler runs the closure once the delay
//! has elapsed unless the token was cancelled first.
//!
//! Two implementations:
//! * [`TokioScheduler`] spawns one timer task per scheduled closure on a tokio
//!   runtime. Cancelling the token wakes sleeping timers so they exit at once.
//! * [`ManualScheduler`] keeps a virtual clock that only moves when a test
//!   calls [`ManualScheduler::advance`] or [`ManualScheduler::run_until_idle`].

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;

mod manual;
pub use manual::ManualScheduler;

/// Boxed unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Shared cancellation flag for one selection session.
///
/// Clones observe the same flag. Cancelling is idempotent.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

#[derive(Debug, Default)]
struct TokenInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the token. Returns `true` only for the call that flipped it.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, Ordering::AcqRel);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once the token is cancelled (immediately if it already is).
    pub async fn cancelled(&self) {
        let mut notified = pin!(self.inner.notify.notified());
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Runs closures after a delay unless their token is cancelled first.
pub trait Scheduler: Send + Sync + 'static {
    /// Stable identifier used in logs.
    fn name(&self) -> &'static str;

    /// Run `task` once `delay` has elapsed. Tasks whose `token` is cancelled
    /// before they fire are dropped without running.
    fn schedule_after(&self, delay: Duration, token: &CancelToken, task: Task);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }
    fn schedule_after(&self, delay: Duration, token: &CancelToken, task: Task) {
        (**self).schedule_after(delay, token, task)
    }
}

/// Scheduler backed by tokio timers.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime driving the current task.
    pub fn current() -> Result<Self, tokio::runtime::TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn name(&self) -> &'static str {
        "tokio"
    }

    fn schedule_after(&self, delay: Duration, token: &CancelToken, task: Task) {
        if token.is_cancelled() {
            tracing::trace!(target: "scheduler", "schedule_on_cancelled_token");
            return;
        }
        let token = token.clone();
        self.handle.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::trace!(target: "scheduler", "timer_cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    if token.is_cancelled() {
                        tracing::trace!(target: "scheduler", "timer_fired_after_cancel");
                    } else {
                        task();
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_task(hits: &Arc<AtomicUsize>) -> Task {
        let hits = hits.clone();
        Box::new(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.clone().is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_for_existing_and_late_waiters() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        tokio::task::yield_now().await;
        token.cancel();
        waiter.await.expect("waiter joins");
        // Already cancelled: returns immediately.
        token.cancelled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_runs_after_delay() {
        let sched = TokioScheduler::current().expect("inside runtime");
        let token = CancelToken::new();
        let hits = Arc::new(AtomicUsize::new(0));
        sched.schedule_after(Duration::from_millis(60), &token, counter_task(&hits));
        tokio::time::sleep(Duration::from_millis(59)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_skips_cancelled_tasks() {
        let sched = TokioScheduler::current().expect("inside runtime");
        let token = CancelToken::new();
        let hits = Arc::new(AtomicUsize::new(0));
        sched.schedule_after(Duration::from_millis(10), &token, counter_task(&hits));
        token.cancel();
        sched.schedule_after(Duration::from_millis(10), &token, counter_task(&hits));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tokio_scheduler_requires_runtime() {
        assert!(TokioScheduler::current().is_err());
    }
}
