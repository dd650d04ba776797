//! Cooperative cancellation, the crate's stand-in for a `ctx.Done()` channel.
//!
//! A [`Context`] is cheap to clone and share across threads. Every blocking
//! wait in the queue, the messenger's subscriber workers, and the kernel's
//! task loop goes through [`Context::wait_timeout`] so cancellation is
//! observed within one poll interval everywhere, per §5.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: Mutex<bool>,
    cond: Condvar,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            inner: Arc::new(Inner {
                cancelled: Mutex::new(false),
                cond: Condvar::new(),
            }),
        }
    }

    /// A context paired with the function that cancels it, mirroring the
    /// root `(context, cancel)` pair the kernel owns.
    pub fn with_cancel() -> (Context, CancelFn) {
        let ctx = Context::new();
        let cancel = CancelFn { ctx: ctx.clone() };
        (ctx, cancel)
    }

    pub fn cancel(&self) {
        let mut guard = self.inner.cancelled.lock().expect("context lock poisoned");
        *guard = true;
        self.inner.cond.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock().expect("context lock poisoned")
    }

    /// Sleep for up to `dur`, waking early if the context is cancelled.
    /// Returns `true` if the context was (or became) cancelled.
    pub fn wait_timeout(&self, dur: Duration) -> bool {
        let guard = self.inner.cancelled.lock().expect("context lock poisoned");
        if *guard {
            return true;
        }
        let (guard, _timeout) = self
            .inner
            .cond
            .wait_timeout(guard, dur)
            .expect("context lock poisoned");
        *guard
    }
}

/// A clonable handle that cancels the [`Context`] it was derived from.
#[derive(Clone)]
pub struct CancelFn {
    ctx: Context,
}

impl CancelFn {
    pub fn call(&self) {
        self.ctx.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn wait_timeout_elapses_without_cancel() {
        let ctx = Context::new();
        let start = Instant::now();
        let cancelled = ctx.wait_timeout(Duration::from_millis(20));
        assert!(!cancelled);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn cancel_wakes_waiter_immediately() {
        let (ctx, cancel) = Context::with_cancel();
        let waiter_ctx = ctx.clone();
        let handle = thread::spawn(move || {
            let start = Instant::now();
            let cancelled = waiter_ctx.wait_timeout(Duration::from_secs(5));
            (cancelled, start.elapsed())
        });
        thread::sleep(Duration::from_millis(20));
        cancel.call();
        let (cancelled, elapsed) = handle.join().expect("waiter thread");
        assert!(cancelled);
        assert!(elapsed < Duration::from_secs(1));
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn already_cancelled_returns_immediately() {
        let (ctx, cancel) = Context::with_cancel();
        cancel.call();
        assert!(ctx.wait_timeout(Duration::from_secs(5)));
    }
}
