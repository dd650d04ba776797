//! Per-task worker loop: resume-from-last-run, periodic `Check`,
//! jittered re-scheduling, and error forwarding (§4.3).

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::deps::Dependencies;
use crate::message::Message;
use crate::state_store::StateStoreExt;
use crate::{Error, Result};

use super::task::TaskSpec;

/// How often the outer select polls `{globalCtx, task.TaskContext, done}`
/// while `RunFn` is in flight (§5: cancellation latency bounded by "one
/// poll interval").
const SELECT_POLL_INTERVAL: Duration = Duration::from_millis(20);

fn last_check_key(task_name: &str) -> String {
    format!("last_check_{task_name}")
}

/// Uniform jitter in `[0, interval/20)`, per §4.3.
fn jitter_for(interval: Duration) -> Duration {
    let max = interval / 20;
    if max.is_zero() {
        return Duration::ZERO;
    }
    let max_nanos = max.as_nanos().min(u64::MAX as u128) as u64;
    let nanos = rand::thread_rng().gen_range(0..max_nanos.max(1));
    Duration::from_nanos(nanos)
}

/// Blocks until `interval` has elapsed since `last_run`, or the root
/// context is cancelled. Returns `true` if cancelled while waiting.
fn resume_from_last_run(deps: &Dependencies, last_run: DateTime<Utc>, interval: Duration) -> bool {
    let elapsed = Utc::now()
        .signed_duration_since(last_run)
        .to_std()
        .unwrap_or(Duration::ZERO);
    if elapsed >= interval {
        return false;
    }
    deps.root_ctx.wait_timeout(interval - elapsed)
}

/// Runs one task to completion: resumes cadence, loops `Check`, persists
/// `last_check_<name>`, forwards errors, and sleeps with jitter until the
/// next run or cancellation. Returns once the task is one-shot-complete or
/// the root context cancels.
pub fn run_task_worker(deps: Arc<Dependencies>, spec: TaskSpec) {
    let key = last_check_key(&spec.name);

    if let Some(interval) = spec.interval {
        if !interval.is_zero() {
            if let Ok(Some(last_run)) = deps.state_store.load::<DateTime<Utc>>(&key) {
                if resume_from_last_run(&deps, last_run, interval) {
                    return;
                }
            }
        }
    }

    loop {
        if deps.root_ctx.is_cancelled() {
            return;
        }

        if run_one(&deps, &spec, &key) {
            return;
        }

        let interval = match spec.interval {
            None => return,
            Some(d) if d.is_zero() => return,
            Some(d) => d,
        };

        if deps.root_ctx.wait_timeout(interval + jitter_for(interval)) {
            return;
        }
    }
}

/// Runs `spec.run` once in its own thread and races its completion against
/// the global and task-local contexts — the three-way
/// `select { globalCtx.Done, task.TaskContext.Done, done }` from §4.3 step
/// 2. Persists `last_check_<name>` and forwards any error exactly once,
/// regardless of which branch resolved the select.
///
/// Returns `true` if the global context was the branch that fired (the
/// caller must stop the worker for good); `false` if the run completed on
/// its own or the task-local context fired, both of which proceed to the
/// ordinary interval wait / restart.
fn run_one(deps: &Arc<Dependencies>, spec: &TaskSpec, key: &str) -> bool {
    let (done_tx, done_rx) = mpsc::channel();
    let run = Arc::clone(&spec.run);
    let task_ctx = spec.task_context();
    let run_ctx = task_ctx.clone();
    std::thread::spawn(move || {
        let result = (run)(&run_ctx);
        let _ = done_tx.send(result);
    });

    let (result, global_fired) = loop {
        match done_rx.recv_timeout(SELECT_POLL_INTERVAL) {
            Ok(result) => break (result, false),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if deps.root_ctx.is_cancelled() {
                    // globalCtx.Done: ask RunFn to stop, then wait for done.
                    spec.cancel_task().call();
                    let result = done_rx
                        .recv()
                        .unwrap_or(Err(Error::Programming("task run panicked")));
                    break (result, true);
                }
                if task_ctx.is_cancelled() {
                    // task.TaskContext.Done: just wait for done, no further
                    // cancellation is issued — the task cancelled itself.
                    let result = done_rx
                        .recv()
                        .unwrap_or(Err(Error::Programming("task run panicked")));
                    break (result, false);
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                break (Err(Error::Programming("task run panicked")), false);
            }
        }
    };

    finish_run(deps, spec, key, result);

    if global_fired {
        true
    } else {
        if task_ctx.is_cancelled() {
            spec.reset_task_context();
        }
        false
    }
}

/// Persists `last_check_<name>` and forwards `result`'s error (if any) to
/// the task's configured error channel — the "After each run" step of §4.3
/// step 2, shared by every branch of the select.
fn finish_run(deps: &Arc<Dependencies>, spec: &TaskSpec, key: &str, result: Result<()>) {
    let now = Utc::now();
    if let Err(e) = deps.state_store.save(key, &now) {
        deps.logger.error(
            "failed to persist last_check",
            &[("task", spec.name.as_str()), ("error", &e.to_string())],
        );
    }

    if let Err(e) = result {
        deps.logger.error(
            "task check failed",
            &[("task", spec.name.as_str()), ("error", &e.to_string())],
        );
        if let Some(channel) = &spec.error_channel_name {
            let failure = Message {
                channel_name: channel.clone(),
                text: Some(format!("Task {} failed: {}", spec.name, e)),
                data: Some(serde_json::Value::String(e.to_string())),
                ..Default::default()
            };
            if let Err(send_err) = deps.messenger.send(failure) {
                deps.logger.error(
                    "failed to forward task error",
                    &[("task", spec.name.as_str()), ("error", &send_err.to_string())],
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::Dependencies;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn one_shot_task_runs_once_and_exits() {
        let deps = Arc::new(Dependencies::for_testing());
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = Arc::clone(&runs);
        let spec = TaskSpec::new("once", move |_ctx| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        run_task_worker(deps, spec);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_run_is_forwarded_to_error_channel() {
        let deps = Arc::new(Dependencies::for_testing());
        let spec = TaskSpec::new("flaky", |_ctx| Err(crate::Error::Programming("boom")))
            .with_error_channel("errors");

        let received = Arc::new(Mutex::new(None));
        let received_clone = Arc::clone(&received);
        let ctx = deps.root_ctx.clone();
        deps.messenger
            .subscribe(
                ctx,
                crate::messenger::SubscribeOptions {
                    source_name: "watcher".into(),
                    channel_name: "errors".into(),
                    ..Default::default()
                },
                move |msg| {
                    *received_clone.lock().unwrap() = msg.text;
                    Ok(())
                },
            )
            .unwrap();

        run_task_worker(Arc::clone(&deps), spec);

        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        while received.lock().unwrap().is_none() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        deps.shutdown();
        deps.messenger.shutdown();

        assert_eq!(
            received.lock().unwrap().as_deref(),
            Some("Task flaky failed: programming error: boom")
        );
    }

    #[test]
    fn resume_waits_out_remaining_interval() {
        let deps = Dependencies::for_testing();
        let last_run = Utc::now() - chrono::Duration::milliseconds(10);
        assert!(!resume_from_last_run(&deps, last_run, Duration::from_millis(5)));
        let recent = Utc::now();
        let (ctx, cancel) = crate::context::Context::with_cancel();
        let mut deps2 = Dependencies::for_testing();
        deps2.root_ctx = ctx;
        deps2.root_cancel = cancel.clone();
        let cancelled = std::thread::scope(|scope| {
            let handle = scope.spawn(|| resume_from_last_run(&deps2, recent, Duration::from_secs(5)));
            std::thread::sleep(Duration::from_millis(10));
            cancel.call();
            handle.join().unwrap()
        });
        assert!(cancelled);
    }

    /// A task-local cancel fired mid-run must restart the task — not tear
    /// the worker down — while a global cancel must stop it for good
    /// (§4.3 step 2's two distinct `Done` branches).
    #[test]
    fn task_local_cancel_restarts_without_exiting_worker() {
        let deps = Arc::new(Dependencies::for_testing());
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = Arc::clone(&runs);

        let spec = TaskSpec::new("self-restarting", move |ctx| {
            let n = runs_clone.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                // First run: block until its own task context is
                // cancelled from another thread, simulating a service
                // that asks to restart mid-check.
                while !ctx.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(2));
                }
            }
            Ok(())
        })
        .with_interval(Duration::from_millis(20));

        let cancel_trigger = spec.cancel_task();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            cancel_trigger.call();
        });

        let deps_for_stop = Arc::clone(&deps);
        let handle = std::thread::spawn(move || run_task_worker(deps_for_stop, spec));

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while runs.load(Ordering::SeqCst) < 2 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(
            runs.load(Ordering::SeqCst),
            2,
            "worker must still be alive and scheduling further runs after a task-local cancel"
        );

        deps.shutdown();
        handle.join().unwrap();
    }
}
