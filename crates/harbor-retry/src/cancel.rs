//! A one-shot, set-once cancellation signal observable by a waiting task,
//! and the cancellable retry loop built on top of it.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// A cancellation signal shared between the issuer (the webhook HTTP
/// thread, replacing a repo's in-flight signal with a fresh one) and the
/// waiter (a worker-pool thread running the retry loop for that repo).
///
/// Cloning shares the same underlying flag; `set()` wakes any thread
/// currently blocked in [`CancellationSignal::wait`].
#[derive(Clone)]
pub struct CancellationSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Set the signal. Idempotent; safe to call from any thread, any
    /// number of times.
    pub fn set(&self) {
        let (lock, cvar) = &*self.inner;
        let mut cancelled = lock.lock().unwrap_or_else(|e| e.into_inner());
        *cancelled = true;
        cvar.notify_all();
    }

    pub fn is_set(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// True if `self` and `other` are clones of the same underlying signal.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Block for up to `timeout`, waking early if the signal is set.
    /// Returns `true` if the signal was set (either already, or during the
    /// wait), `false` if the full timeout elapsed uncancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        if *guard {
            return true;
        }
        let (guard, _timeout_result) = cvar
            .wait_timeout(guard, timeout)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a [`retry_until_ready`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// `try_once` returned `true` on the given attempt.
    Ready { attempt: u32 },
    /// The attempt budget was exhausted without `try_once` ever returning `true`.
    Exhausted { attempts: u32 },
    /// The cancellation signal was set before success or exhaustion.
    Cancelled { attempts: u32 },
}

/// Run `try_once` up to `max_attempts` times, waiting `delay` between
/// attempts, stopping early if `signal` is set. This is the shape of the
/// webhook intake's per-repository asset-visibility retry loop: poll until
/// the predicate is true, a fixed number of times, with a fixed delay, and
/// let a fresh webhook for the same repo cancel the wait.
pub fn retry_until_ready<F>(
    max_attempts: u32,
    delay: Duration,
    signal: &CancellationSignal,
    mut try_once: F,
) -> RetryOutcome
where
    F: FnMut(u32) -> bool,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        if try_once(attempt) {
            return RetryOutcome::Ready { attempt };
        }
        if attempt >= max_attempts {
            return RetryOutcome::Exhausted { attempts: attempt };
        }
        if signal.wait(delay) {
            return RetryOutcome::Cancelled { attempts: attempt };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    #[test]
    fn succeeds_on_first_attempt() {
        let signal = CancellationSignal::new();
        let outcome = retry_until_ready(5, Duration::from_millis(1), &signal, |_attempt| true);
        assert_eq!(outcome, RetryOutcome::Ready { attempt: 1 });
    }

    #[test]
    fn succeeds_after_a_few_attempts() {
        let signal = CancellationSignal::new();
        let calls = AtomicU32::new(0);
        let outcome = retry_until_ready(5, Duration::from_millis(1), &signal, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst) >= 2
        });
        assert_eq!(outcome, RetryOutcome::Ready { attempt: 3 });
    }

    #[test]
    fn exhausts_attempt_budget() {
        let signal = CancellationSignal::new();
        let outcome = retry_until_ready(3, Duration::from_millis(1), &signal, |_attempt| false);
        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 3 });
    }

    #[test]
    fn cancellation_stops_the_loop_early() {
        let signal = CancellationSignal::new();
        let signal_for_canceller = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            signal_for_canceller.set();
        });

        let outcome = retry_until_ready(100, Duration::from_secs(5), &signal, |_attempt| false);
        handle.join().unwrap();

        match outcome {
            RetryOutcome::Cancelled { .. } => {}
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }

    #[test]
    fn same_as_distinguishes_clones_from_independent_signals() {
        let signal = CancellationSignal::new();
        let cloned = signal.clone();
        let other = CancellationSignal::new();

        assert!(signal.same_as(&cloned));
        assert!(!signal.same_as(&other));
    }

    #[test]
    fn already_set_signal_cancels_on_first_wait() {
        let signal = CancellationSignal::new();
        signal.set();
        let outcome = retry_until_ready(5, Duration::from_secs(5), &signal, |_attempt| false);
        assert_eq!(outcome, RetryOutcome::Cancelled { attempts: 1 });
    }
}
