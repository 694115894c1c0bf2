//! Input debouncing
//!
//! Collapses a burst of calls under one key into a single delayed callback.
//! Each call bumps the key's generation and arms a fresh timer; a timer whose
//! captured generation is no longer current does nothing when it wakes.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tokio_live_orchestrator::Debouncer;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let debouncer = Debouncer::new();
//! for query in ["a", "ad", "adm", "admin"] {
//!     let query = query.to_string();
//!     debouncer.debounce("user-search", Duration::from_millis(500), move || async move {
//!         println!("searching for {query}");
//!     });
//! }
//! // Only "admin" is searched, 500ms after the last keystroke.
//! # }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::AbortHandle;
use tracing::trace;

struct Pending {
    generation: u64,
    timer: Option<AbortHandle>,
}

/// Per-key "last call wins" delay line.
///
/// Cloning is cheap; clones share pending timers.
#[derive(Clone, Default)]
pub struct Debouncer {
    slots: Arc<DashMap<String, Pending>>,
    // Shared across keys so a generation is never reused after a slot is removed.
    generations: Arc<AtomicU64>,
}

impl Debouncer {
    /// Create a debouncer with no pending inputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `callback` to run after `delay`, cancelling whatever was pending
    /// under `key`. Returns the generation assigned to this call.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn debounce<F, Fut>(&self, key: impl Into<String>, delay: Duration, callback: F) -> u64
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let mut slot = self.slots.entry(key.clone()).or_insert_with(|| Pending {
            generation,
            timer: None,
        });
        if let Some(previous) = slot.timer.take() {
            previous.abort();
        }
        slot.generation = generation;

        let slots = Arc::clone(&self.slots);
        let timer_key = key.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let current = slots
                .remove_if(&timer_key, |_, pending| pending.generation == generation)
                .is_some();
            if current {
                trace!(key = %timer_key, generation = generation, "debounced callback fired");
                callback().await;
            }
        });
        slot.timer = Some(timer.abort_handle());
        trace!(key = %key, generation = generation, "debounce armed");
        generation
    }

    /// Drop the pending call under `key`. Returns `false` if nothing was pending.
    pub fn cancel(&self, key: &str) -> bool {
        match self.slots.remove(key) {
            Some((_, pending)) => {
                if let Some(timer) = pending.timer {
                    timer.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Whether a call is pending under `key`.
    pub fn is_pending(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Drop every pending call.
    pub fn cancel_all(&self) {
        self.slots.retain(|_, pending| {
            if let Some(timer) = pending.timer.take() {
                timer.abort();
            }
            false
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(debouncer: &Debouncer, seen: &Arc<Mutex<Vec<String>>>, key: &str, value: &str) {
        let seen = Arc::clone(seen);
        let value = value.to_string();
        debouncer.debounce(key, Duration::from_millis(500), move || async move {
            seen.lock().push(value);
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once_with_last_payload() {
        let debouncer = Debouncer::new();
        let seen = recorder();

        for value in ["a", "ad", "adm", "admin"] {
            push(&debouncer, &seen, "search", value);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(*seen.lock(), vec!["admin".to_string()]);
        assert!(!debouncer.is_pending("search"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_longer_than_window_fires_each_burst() {
        let debouncer = Debouncer::new();
        let seen = recorder();

        push(&debouncer, &seen, "search", "first");
        tokio::time::sleep(Duration::from_millis(700)).await;
        push(&debouncer, &seen, "search", "second");
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(*seen.lock(), vec!["first".to_string(), "second".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let debouncer = Debouncer::new();
        let seen = recorder();

        push(&debouncer, &seen, "users", "u");
        push(&debouncer, &seen, "logs", "l");
        tokio::time::sleep(Duration::from_millis(600)).await;

        let mut got = seen.lock().clone();
        got.sort();
        assert_eq!(got, vec!["l".to_string(), "u".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_call() {
        let debouncer = Debouncer::new();
        let seen = recorder();

        push(&debouncer, &seen, "search", "never");
        assert!(debouncer.is_pending("search"));
        assert!(debouncer.cancel("search"));
        assert!(!debouncer.cancel("search"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(seen.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_increases_per_call() {
        let debouncer = Debouncer::new();
        let g1 = debouncer.debounce("k", Duration::from_millis(10), || async {});
        let g2 = debouncer.debounce("k", Duration::from_millis(10), || async {});
        assert!(g2 > g1);
    }
}
