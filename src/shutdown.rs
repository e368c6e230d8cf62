//! Cooperative shutdown signal shared by every worker (spec.md §2, §5).
//!
//! Triggering is idempotent. `wait_timeout` is the single primitive every
//! worker's suspension points (queue gets, inter-cycle sleeps, upload
//! backoff) build on so shutdown is observed promptly without polling.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub struct ShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Set the signal. Safe to call more than once, from any thread.
    pub fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        let mut triggered = lock.lock().unwrap();
        if !*triggered {
            *triggered = true;
            cvar.notify_all();
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.inner.0.lock().unwrap()
    }

    /// Block for up to `timeout`, returning early and `true` as soon as the
    /// signal is triggered. Returns `false` if `timeout` elapses first.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap();
        if *guard {
            return true;
        }
        let (guard, _result) = cvar.wait_timeout(guard, timeout).unwrap();
        *guard
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn trigger_is_idempotent() {
        let sig = ShutdownSignal::new();
        sig.trigger();
        sig.trigger();
        assert!(sig.is_triggered());
    }

    #[test]
    fn wait_timeout_returns_false_when_not_triggered() {
        let sig = ShutdownSignal::new();
        let start = Instant::now();
        assert!(!sig.wait_timeout(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn wait_timeout_wakes_up_early_on_trigger() {
        let sig = ShutdownSignal::new();
        let sig2 = sig.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sig2.trigger();
        });
        let start = Instant::now();
        assert!(sig.wait_timeout(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
