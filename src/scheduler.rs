//! # Scheduler — named, cancellable, non-reentrant timers
//!
//! ## Responsibility
//! Wrap repeating and one-shot timers into named tasks that can be cancelled
//! individually or all at once, and that never run the same callback twice
//! concurrently.
//!
//! ## Guarantees
//! - Interval tasks first fire after one full interval, never immediately
//! - A tick that arrives while the previous execution is unsettled is
//!   skipped, not queued
//! - The running flag is cleared after every execution, including failed
//!   and panicked ones
//! - A failing callback never stops later ticks; the failure goes to the
//!   fallback handler
//! - `cancel` is idempotent
//!
//! ## NOT Responsible For
//! - Deciding what a tick does (callers supply the callback)
//! - Overlap between *different* tasks (see: `refresh` busy guard)

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::fallback::FallbackHandler;
use crate::OrchestratorError;

/// Handle to a registered task.
///
/// Clones observe the same task. Dropping a handle does not cancel the task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: String,
    serial: u64,
    interval: Option<Duration>,
    running: Arc<AtomicBool>,
    runs: Arc<AtomicU64>,
    skipped: Arc<AtomicU64>,
    driver: AbortHandle,
    registry: Weak<DashMap<String, TaskHandle>>,
}

impl TaskHandle {
    /// Task name.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Repeat interval; `None` for one-shot tasks.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Whether an execution is currently in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of executions started so far.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Number of ticks skipped because an execution was still in flight.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Whether the timer has been stopped (cancelled or, for one-shots, fired).
    pub fn is_finished(&self) -> bool {
        self.driver.is_finished()
    }

    /// Stop future firings and unregister the task. An in-flight execution
    /// is left to settle. A newer task registered under the same id is kept.
    pub fn cancel(&self) {
        self.stop();
        if let Some(tasks) = self.registry.upgrade() {
            tasks.remove_if(&self.id, |_, handle| handle.serial == self.serial);
        }
    }

    fn stop(&self) {
        self.driver.abort();
    }
}

/// Registry of named timer tasks.
///
/// Cloning is cheap; clones share the registry.
#[derive(Clone)]
pub struct Scheduler {
    tasks: Arc<DashMap<String, TaskHandle>>,
    serial: Arc<AtomicU64>,
    fallback: Option<FallbackHandler>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

struct Execution<F> {
    id: String,
    callback: Arc<F>,
    running: Arc<AtomicBool>,
    runs: Arc<AtomicU64>,
    skipped: Arc<AtomicU64>,
    fallback: Option<FallbackHandler>,
}

impl<F, Fut> Execution<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), OrchestratorError>> + Send + 'static,
{
    fn fire(&self) {
        if self.running.swap(true, Ordering::AcqRel) {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(task = %self.id, "previous run still in flight, tick skipped");
            return;
        }
        let run = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(task = %self.id, run = run, "task fired");

        let callback = Arc::clone(&self.callback);
        let work = tokio::spawn(async move { (*callback)().await });

        let id = self.id.clone();
        let running = Arc::clone(&self.running);
        let fallback = self.fallback.clone();
        tokio::spawn(async move {
            let outcome = work.await;
            running.store(false, Ordering::Release);
            match outcome {
                Ok(Ok(())) => trace!(task = %id, "task settled"),
                Ok(Err(e)) => {
                    warn!(task = %id, error = %e, "scheduled task failed");
                    if let Some(fallback) = &fallback {
                        fallback.report(&id, &e);
                    }
                }
                Err(join) => {
                    warn!(task = %id, error = %join, "scheduled task aborted");
                    if let Some(fallback) = &fallback {
                        fallback.report_join(&id, join);
                    }
                }
            }
        });
    }
}

impl Scheduler {
    /// Create an empty scheduler that only logs callback failures.
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            serial: Arc::new(AtomicU64::new(0)),
            fallback: None,
        }
    }

    /// Route callback failures to `fallback` as well as the log.
    pub fn with_fallback(mut self, fallback: FallbackHandler) -> Self {
        self.fallback = Some(fallback);
        self
    }

    fn execution<F>(&self, id: &str, callback: F) -> Execution<F> {
        Execution {
            id: id.to_string(),
            callback: Arc::new(callback),
            running: Arc::new(AtomicBool::new(false)),
            runs: Arc::new(AtomicU64::new(0)),
            skipped: Arc::new(AtomicU64::new(0)),
            fallback: self.fallback.clone(),
        }
    }

    fn register(&self, handle: TaskHandle) -> TaskHandle {
        if let Some(previous) = self.tasks.insert(handle.id.clone(), handle.clone()) {
            previous.stop();
            debug!(task = %handle.id, "task replaced");
        }
        handle
    }

    /// Register a repeating task that fires every `interval`, starting one
    /// interval from now. Re-using an id replaces the previous task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero (validated configs never produce one).
    pub fn schedule<F, Fut>(&self, id: impl Into<String>, interval: Duration, callback: F) -> TaskHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), OrchestratorError>> + Send + 'static,
    {
        let id = id.into();
        let exec = self.execution(&id, callback);
        let (running, runs, skipped) = (
            Arc::clone(&exec.running),
            Arc::clone(&exec.runs),
            Arc::clone(&exec.skipped),
        );

        let driver = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                exec.fire();
            }
        });

        debug!(task = %id, interval_ms = interval.as_millis() as u64, "task scheduled");
        self.register(TaskHandle {
            id,
            serial: self.serial.fetch_add(1, Ordering::Relaxed),
            interval: Some(interval),
            running,
            runs,
            skipped,
            driver: driver.abort_handle(),
            registry: Arc::downgrade(&self.tasks),
        })
    }

    /// Register a task that fires once after `delay` and then unregisters
    /// itself. Re-using an id replaces the previous task.
    pub fn schedule_once<F, Fut>(&self, id: impl Into<String>, delay: Duration, callback: F) -> TaskHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), OrchestratorError>> + Send + 'static,
    {
        let id = id.into();
        let exec = self.execution(&id, callback);
        let (running, runs, skipped) = (
            Arc::clone(&exec.running),
            Arc::clone(&exec.runs),
            Arc::clone(&exec.skipped),
        );
        let serial = self.serial.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);
        let key = id.clone();

        let driver = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            exec.fire();
            tasks.remove_if(&key, |_, handle| handle.serial == serial);
        });

        debug!(task = %id, delay_ms = delay.as_millis() as u64, "one-shot scheduled");
        self.register(TaskHandle {
            id,
            serial,
            interval: None,
            running,
            runs,
            skipped,
            driver: driver.abort_handle(),
            registry: Arc::downgrade(&self.tasks),
        })
    }

    /// Stop future firings of `id`. Returns `false` if no such task exists.
    pub fn cancel(&self, id: &str) -> bool {
        match self.tasks.remove(id) {
            Some((_, handle)) => {
                handle.stop();
                debug!(task = id, "task cancelled");
                true
            }
            None => false,
        }
    }

    /// Handle of a registered task.
    pub fn task(&self, id: &str) -> Option<TaskHandle> {
        self.tasks.get(id).map(|entry| entry.value().clone())
    }

    /// Whether `id` is registered.
    pub fn is_scheduled(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no tasks are registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancel every task (page teardown).
    pub fn shutdown(&self) {
        let count = self.tasks.len();
        self.tasks.retain(|_, handle| {
            handle.stop();
            false
        });
        debug!(cancelled = count, "scheduler shut down");
    }
}
