//! Double-submission guard for forms.
//!
//! The first submission is admitted and locks the form for a fixed window;
//! submissions inside the window are rejected. The lock lifts on its own.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Admits one submission per lock window.
#[derive(Debug)]
pub struct SubmitGuard {
    window: Duration,
    locked_until: Mutex<Option<Instant>>,
}

impl SubmitGuard {
    /// Guard locking for `window` after each admitted submission.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            locked_until: Mutex::new(None),
        }
    }

    /// Admit a submission if the form is unlocked, locking it again.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut locked_until = self.locked_until.lock();
        match *locked_until {
            Some(until) if now < until => {
                tracing::debug!(remaining_ms = (until - now).as_millis() as u64, "submission rejected");
                false
            }
            _ => {
                *locked_until = Some(now + self.window);
                true
            }
        }
    }

    /// Whether a submission would currently be rejected.
    pub fn is_locked(&self) -> bool {
        matches!(*self.locked_until.lock(), Some(until) if Instant::now() < until)
    }

    /// Unlock early (e.g. after the request settled with a validation error).
    pub fn release(&self) {
        *self.locked_until.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_second_submit_inside_window_is_rejected() {
        let guard = SubmitGuard::new(Duration::from_millis(3000));
        assert!(guard.try_acquire());
        assert!(!guard.try_acquire());
        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert!(guard.is_locked());
        assert!(!guard.try_acquire());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!guard.is_locked());
        assert!(guard.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_unlocks_immediately() {
        let guard = SubmitGuard::new(Duration::from_secs(3));
        assert!(guard.try_acquire());
        guard.release();
        assert!(guard.try_acquire());
    }
}
