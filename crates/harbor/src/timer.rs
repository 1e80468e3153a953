//! A one-shot, cancellable timer that can be rearmed in place with the same
//! `(delay, callback)` it was last started with.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use harbor_retry::CancellationSignal;

type Callback = Arc<dyn Fn() + Send + Sync>;

struct Armed {
    delay: Duration,
    callback: Callback,
    signal: CancellationSignal,
    handle: JoinHandle<()>,
}

/// See module docs. `start`/`cancel`/`restart` mirror the semantics of the
/// Python original this design is based on: `fn` runs at most once per arm,
/// on a thread separate from the caller of `start`.
pub struct ReusableTimer {
    armed: Mutex<Option<Armed>>,
}

#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    #[error("timer is already armed; cancel it first or call restart")]
    AlreadyArmed,
    #[error("timer has never been started")]
    NeverStarted,
}

impl ReusableTimer {
    pub fn new() -> Self {
        Self {
            armed: Mutex::new(None),
        }
    }

    /// Arm a single firing of `callback` after `delay`. Collapses to
    /// cancel-then-arm when already armed, matching the "implementation
    /// may collapse to cancel+arm" allowance.
    pub fn start(&self, delay: Duration, callback: impl Fn() + Send + Sync + 'static) {
        self.cancel();
        self.arm(delay, Arc::new(callback));
    }

    /// Cancel the current arm, if any. Idempotent.
    pub fn cancel(&self) {
        let mut guard = self.armed.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(armed) = guard.take() {
            armed.signal.set();
            // Don't block the caller on the fired/cancelled thread; it
            // observes the signal and exits on its own.
            drop(armed.handle);
        }
    }

    /// Rearm with the same `(delay, callback)` as the most recent `start`.
    pub fn restart(&self) -> Result<(), TimerError> {
        let (delay, callback) = {
            let guard = self.armed.lock().unwrap_or_else(|e| e.into_inner());
            match guard.as_ref() {
                Some(armed) => (armed.delay, armed.callback.clone()),
                None => return Err(TimerError::NeverStarted),
            }
        };
        self.cancel();
        self.arm(delay, callback);
        Ok(())
    }

    fn arm(&self, delay: Duration, callback: Callback) {
        let signal = CancellationSignal::new();
        let signal_for_thread = signal.clone();
        let callback_for_thread = callback.clone();

        let handle = std::thread::spawn(move || {
            if !signal_for_thread.wait(delay) {
                callback_for_thread();
            }
        });

        let mut guard = self.armed.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Armed {
            delay,
            callback,
            signal,
            handle,
        });
    }
}

impl Default for ReusableTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[test]
    fn fires_once_after_delay() {
        let timer = ReusableTimer::new();
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();

        timer.start(Duration::from_millis(20), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_before_firing_prevents_callback() {
        let timer = ReusableTimer::new();
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();

        timer.start(Duration::from_millis(100), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        timer.cancel();

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_is_idempotent() {
        let timer = ReusableTimer::new();
        timer.cancel();
        timer.cancel();
    }

    #[test]
    fn restart_replays_same_delay_and_callback() {
        let timer = ReusableTimer::new();
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();

        timer.start(Duration::from_millis(30), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        timer.restart().unwrap();
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn restart_without_start_is_an_error() {
        let timer = ReusableTimer::new();
        assert!(matches!(timer.restart(), Err(TimerError::NeverStarted)));
    }

    #[test]
    fn rearm_before_firing_resets_the_deadline() {
        let timer = ReusableTimer::new();
        let fired_at = Arc::new(Mutex::new(None::<Instant>));
        let started_at = Instant::now();

        let fired_at_clone = fired_at.clone();
        timer.start(Duration::from_millis(200), move || {
            *fired_at_clone.lock().unwrap() = Some(Instant::now());
        });

        std::thread::sleep(Duration::from_millis(50));
        let fired_at_clone = fired_at.clone();
        // Re-arming with `start` collapses to cancel+arm, so the original
        // 200ms deadline should never fire.
        timer.start(Duration::from_millis(50), move || {
            *fired_at_clone.lock().unwrap() = Some(Instant::now());
        });

        std::thread::sleep(Duration::from_millis(150));
        let elapsed = fired_at.lock().unwrap().expect("should have fired") - started_at;
        assert!(elapsed < Duration::from_millis(200));
    }
}
