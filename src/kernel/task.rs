//! A kernel task definition (§3, §4.3).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::context::{CancelFn, Context};
use crate::Result;

/// One periodic (or one-shot, when `interval` is `None`) unit of work the
/// kernel drives. Built by a [`crate::service::Service`]'s `Check`, or
/// supplied directly for ad-hoc scheduling.
///
/// `task_ctx` below is the Task record's own `TaskContext`/`CancelFn` pair
/// (§3) — a per-task cancellation handle distinct from the kernel's global
/// root context. `RunFn` is invoked with this context, not the global one;
/// cancelling it does not stop the task, the worker treats it as a request
/// to restart after the configured interval (§4.3 step 2), and issues a
/// fresh pair once the restart has been observed so the handle can be
/// cancelled again on the task's next run.
#[derive(Clone)]
pub struct TaskSpec {
    pub name: String,
    /// `None` means "run once" (§3: "Interval ≤ 0 means run once").
    pub interval: Option<Duration>,
    /// Channel a failure is reported to, as a `Text`-only `Message`.
    pub error_channel_name: Option<String>,
    pub run: Arc<dyn Fn(&Context) -> Result<()> + Send + Sync>,
    task_ctx: Arc<Mutex<(Context, CancelFn)>>,
}

impl TaskSpec {
    pub fn new(
        name: impl Into<String>,
        run: impl Fn(&Context) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        let (ctx, cancel) = Context::with_cancel();
        TaskSpec {
            name: name.into(),
            interval: None,
            error_channel_name: None,
            run: Arc::new(run),
            task_ctx: Arc::new(Mutex::new((ctx, cancel))),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_error_channel(mut self, channel_name: impl Into<String>) -> Self {
        self.error_channel_name = Some(channel_name.into());
        self
    }

    /// The task's current local `Context` (§3's `TaskContext`) — passed to
    /// `RunFn` and cancelled independently of the kernel's global shutdown.
    pub fn task_context(&self) -> Context {
        self.task_ctx
            .lock()
            .expect("task context mutex poisoned")
            .0
            .clone()
    }

    /// The task's current local `CancelFn` (§3). A caller (typically the
    /// service itself, wanting to restart its own schedule) calls this to
    /// request that the in-flight run be treated as complete and the task
    /// rescheduled after its interval, without tearing down the worker.
    pub fn cancel_task(&self) -> CancelFn {
        self.task_ctx
            .lock()
            .expect("task context mutex poisoned")
            .1
            .clone()
    }

    /// Replaces the task-local context/cancel pair with a fresh one, so a
    /// consumed task-local cancellation can be issued again on the task's
    /// next run. Called by the scheduler after observing a restart.
    pub(crate) fn reset_task_context(&self) {
        let fresh = Context::with_cancel();
        *self.task_ctx.lock().expect("task context mutex poisoned") = fresh;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_context_is_independent_of_a_fresh_one() {
        let spec = TaskSpec::new("t", |_ctx| Ok(()));
        let ctx = spec.task_context();
        assert!(!ctx.is_cancelled());
        spec.cancel_task().call();
        assert!(spec.task_context().is_cancelled());
    }

    #[test]
    fn reset_produces_an_uncancelled_context() {
        let spec = TaskSpec::new("t", |_ctx| Ok(()));
        spec.cancel_task().call();
        assert!(spec.task_context().is_cancelled());
        spec.reset_task_context();
        assert!(!spec.task_context().is_cancelled());
    }
}
