//! Cancellable timers owned by controllers.
//!
//! A [`Debouncer`] keeps at most one pending action: scheduling replaces the
//! previous one. Cancellation only affects actions still waiting out their
//! delay; an action that already started runs to completion.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Trailing-edge debounce
#[derive(Debug, Default)]
pub struct Debouncer {
    pending: Mutex<Option<CancellationToken>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after `delay` unless rescheduled or cancelled first
    pub fn schedule<F>(&self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let previous = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    // Fired: later cancel_pending() calls must not report it as pending
                    token.cancel();
                    action.await;
                }
            }
        });
    }

    /// Drop the pending action, if any. Returns whether one was waiting.
    pub fn cancel_pending(&self) -> bool {
        match self.pending.lock().unwrap_or_else(|e| e.into_inner()).take() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

/// Leading-edge throttle with a trailing run.
///
/// An action runs immediately when the interval has elapsed since the last
/// run; otherwise it is scheduled for the end of the current window,
/// replacing any action already scheduled there.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_run: Arc<Mutex<Option<Instant>>>,
    trailing: Debouncer,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: Arc::new(Mutex::new(None)),
            trailing: Debouncer::new(),
        }
    }

    /// Returns `true` when `action` ran synchronously
    pub fn run<F>(&self, action: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let now = Instant::now();
        let mut last = self.last_run.lock().unwrap_or_else(|e| e.into_inner());

        match *last {
            Some(at) if now.duration_since(at) < self.interval => {
                let remaining = self.interval - now.duration_since(at);
                let last_run = Arc::clone(&self.last_run);
                drop(last);
                self.trailing.schedule(remaining, async move {
                    *last_run.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
                    action();
                });
                false
            }
            _ => {
                *last = Some(now);
                drop(last);
                self.trailing.cancel_pending();
                action();
                true
            }
        }
    }

    /// Drop any trailing action without running it
    pub fn cancel_pending(&self) -> bool {
        self.trailing.cancel_pending()
    }

    /// Forget the last run so the next action runs immediately
    pub fn reset(&self) {
        self.trailing.cancel_pending();
        *self.last_run.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        (count, move || Arc::clone(&handle))
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_to_last() {
        let debouncer = Debouncer::new();
        let last = Arc::new(Mutex::new(None));

        for value in 1..=3 {
            let last = Arc::clone(&last);
            debouncer.schedule(Duration::from_millis(500), async move {
                *last.lock().unwrap() = Some(value);
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*last.lock().unwrap(), Some(3));
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_is_idempotent() {
        let debouncer = Debouncer::new();
        let (count, handle) = counter();
        let c = handle();
        debouncer.schedule(Duration::from_millis(50), async move {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(debouncer.cancel_pending());
        assert!(!debouncer.cancel_pending());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_is_noop() {
        let debouncer = Debouncer::new();
        let (count, handle) = counter();
        let c = handle();
        debouncer.schedule(Duration::from_millis(10), async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!debouncer.cancel_pending());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_leading_then_trailing() {
        let throttle = Throttle::new(Duration::from_millis(100));
        let (count, handle) = counter();

        let c = handle();
        assert!(throttle.run(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        for _ in 0..5 {
            let c = handle();
            assert!(!throttle.run(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(250)).await;
        // Only the last trailing action ran
        assert_eq!(count.load(Ordering::SeqCst), 2);

        let c = handle();
        assert!(throttle.run(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_cancel_drops_trailing() {
        let throttle = Throttle::new(Duration::from_millis(100));
        let (count, handle) = counter();
        throttle.run(|| {});
        let c = handle();
        throttle.run(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(throttle.cancel_pending());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
