//! Wake-on-append signaling for blocking dequeue (§4.1, §5).
//!
//! A plain generation counter guarded by a `Condvar`: every successful
//! `enqueue` bumps the counter and notifies all waiters. A waiter records the
//! generation it last observed and blocks until the counter moves past it,
//! a timeout elapses, or the caller's [`crate::context::Context`] is
//! cancelled.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::context::Context;

/// Why a [`Notifier::wait`] call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The generation counter advanced past the caller's `since` value.
    Signaled,
    /// The poll interval elapsed with no new data.
    TimedOut,
    /// The context was cancelled while waiting.
    Cancelled,
}

#[derive(Debug, Default)]
pub struct Notifier(Arc<(Mutex<u64>, Condvar)>);

impl Clone for Notifier {
    fn clone(&self) -> Self {
        Notifier(Arc::clone(&self.0))
    }
}

impl Notifier {
    pub fn new() -> Self {
        Notifier(Arc::new((Mutex::new(0), Condvar::new())))
    }

    /// The current generation, to pass as `since` on the next wait.
    pub fn generation(&self) -> u64 {
        *self.0 .0.lock().expect("notifier mutex poisoned")
    }

    /// Bumps the generation and wakes every waiter.
    pub fn notify_all(&self) {
        let (lock, cond) = &*self.0;
        let mut gen = lock.lock().expect("notifier mutex poisoned");
        *gen = gen.wrapping_add(1);
        cond.notify_all();
    }

    /// Blocks until the generation advances past `since`, `timeout`
    /// elapses, or `ctx` is cancelled — whichever happens first.
    pub fn wait(&self, since: u64, timeout: Duration, ctx: &Context) -> NotifyOutcome {
        if ctx.is_cancelled() {
            return NotifyOutcome::Cancelled;
        }
        let (lock, cond) = &*self.0;
        let guard = lock.lock().expect("notifier mutex poisoned");
        if *guard != since {
            return NotifyOutcome::Signaled;
        }
        let (guard, _timeout) = cond
            .wait_timeout(guard, timeout)
            .expect("notifier mutex poisoned");
        if *guard != since {
            return NotifyOutcome::Signaled;
        }
        drop(guard);
        if ctx.is_cancelled() {
            return NotifyOutcome::Cancelled;
        }
        // Either a real timeout or a spurious wake with no generation
        // change; the caller re-checks its own condition either way.
        NotifyOutcome::TimedOut
    }
}
