//! # Refresh orchestration
//!
//! ## Responsibility
//! Run registered producers as one coordinated *cycle*, guarded by a single
//! busy flag so cycles never overlap.
//!
//! ## Guarantees
//! - Non-overlapping: a trigger while busy is a no-op ([`CycleOutcome::Skipped`]),
//!   never a queued retry
//! - Isolated: producers run as separate tasks; one failing or panicking
//!   never prevents the others from completing
//! - Settled: busy clears exactly once, after every invoked producer settled,
//!   and the loading indicator never outlives its cycle
//! - Reported: each failure raises one error notification naming its producer
//!   as soon as that producer settles
//!
//! ## NOT Responsible For
//! - Timing (the [`Scheduler`] fires cadences, the debouncer fires searches)
//! - Request timeouts: a hung producer keeps the orchestrator busy

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::config::RefreshConfig;
use crate::dispatch::{Dispatcher, Intent};
use crate::fallback::FallbackHandler;
use crate::notification::{NotificationCenter, NotificationKind};
use crate::scheduler::{Scheduler, TaskHandle};
use crate::transport::{Method, Request, Transport};
use crate::OrchestratorError;

/// Query parameter carrying the listing page.
pub const PAGE_PARAM: &str = "pagina";
/// Query parameter carrying the search text.
pub const SEARCH_PARAM: &str = "busqueda";

/// Info message shown before a manual refresh.
pub const MANUAL_REFRESH_MESSAGE: &str = "Refreshing data...";
/// Success message shown after a clean manual refresh.
pub const REFRESH_SUCCESS_MESSAGE: &str = "Data updated successfully";

/// Listing parameters passed to every producer of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleParams {
    /// 1-based listing page.
    pub page: u32,
    /// Search text, if any.
    pub query: Option<String>,
    /// Extra listing filters, sent as query parameters.
    pub filters: Vec<(String, String)>,
}

impl Default for CycleParams {
    fn default() -> Self {
        Self {
            page: 1,
            query: None,
            filters: Vec::new(),
        }
    }
}

impl CycleParams {
    /// First page filtered by `query`. Empty text clears the search.
    pub fn search(query: impl Into<String>) -> Self {
        let query = query.into();
        Self {
            page: 1,
            query: (!query.trim().is_empty()).then_some(query),
            filters: Vec::new(),
        }
    }

    /// Same filters, different page.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Add a listing filter.
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }

    /// Append these parameters to `request`.
    pub fn apply(&self, mut request: Request) -> Request {
        request = request.with_query(PAGE_PARAM, self.page.to_string());
        if let Some(query) = &self.query {
            request = request.with_query(SEARCH_PARAM, query.clone());
        }
        for (key, value) in &self.filters {
            request = request.with_query(key.clone(), value.clone());
        }
        request
    }
}

/// Which producers a cycle runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleScope {
    /// Every registered producer.
    All,
    /// Only the named producers (still in registration order).
    Only(Vec<String>),
}

impl CycleScope {
    /// Scope of a single producer.
    pub fn one(name: impl Into<String>) -> Self {
        CycleScope::Only(vec![name.into()])
    }

    fn includes(&self, name: &str) -> bool {
        match self {
            CycleScope::All => true,
            CycleScope::Only(names) => names.iter().any(|n| n == name),
        }
    }
}

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Autonomous cadence.
    Timer,
    /// Refresh button.
    Manual,
    /// Debounced search input or listing navigation.
    Search,
    /// Reload after a successful mutation.
    Action,
}

/// Result of a cycle that ran.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Correlation id, also recorded on the `refresh_cycle` span.
    pub cycle_id: Uuid,
    /// What started the cycle.
    pub trigger: Trigger,
    /// Producers that settled successfully, in registration order.
    pub succeeded: Vec<String>,
    /// Producers that failed, in registration order.
    pub failed: Vec<(String, OrchestratorError)>,
    /// Wall time from start until every producer settled.
    pub elapsed: Duration,
}

impl CycleReport {
    /// Whether every invoked producer succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of [`RefreshOrchestrator::trigger_cycle`].
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Another cycle was running; nothing was invoked.
    Skipped,
    /// The cycle ran to settlement.
    Completed(CycleReport),
    /// The cycle task panicked or was cancelled before settling.
    Aborted,
}

impl CycleOutcome {
    /// The report, if the cycle ran.
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleOutcome::Skipped | CycleOutcome::Aborted => None,
            CycleOutcome::Completed(report) => Some(report),
        }
    }
}

type ProducerFn = dyn Fn(CycleParams) -> BoxFuture<'static, Result<(), OrchestratorError>> + Send + Sync;

/// A named unit of work in a refresh cycle.
#[derive(Clone)]
pub struct Producer {
    name: String,
    run: Arc<ProducerFn>,
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer").field("name", &self.name).finish()
    }
}

impl Producer {
    /// Wrap an async function of the cycle parameters.
    pub fn new<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(CycleParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), OrchestratorError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Arc::new(move |params| run(params).boxed()),
        }
    }

    /// `GET path` and hand the payload to `render`.
    ///
    /// `render` runs at most once per successful fetch and never on failure.
    /// Its errors are reported as [`OrchestratorError::Render`].
    pub fn fetch_and_render<R>(
        name: impl Into<String>,
        transport: Arc<dyn Transport>,
        path: impl Into<String>,
        render: R,
    ) -> Self
    where
        R: Fn(Value) -> Result<(), OrchestratorError> + Send + Sync + 'static,
    {
        Self::fetch_with(name, transport, path, false, render)
    }

    /// Like [`Producer::fetch_and_render`] but sends the cycle's page, search
    /// text and filters as query parameters.
    pub fn paged_listing<R>(
        name: impl Into<String>,
        transport: Arc<dyn Transport>,
        path: impl Into<String>,
        render: R,
    ) -> Self
    where
        R: Fn(Value) -> Result<(), OrchestratorError> + Send + Sync + 'static,
    {
        Self::fetch_with(name, transport, path, true, render)
    }

    fn fetch_with<R>(
        name: impl Into<String>,
        transport: Arc<dyn Transport>,
        path: impl Into<String>,
        paged: bool,
        render: R,
    ) -> Self
    where
        R: Fn(Value) -> Result<(), OrchestratorError> + Send + Sync + 'static,
    {
        let path = path.into();
        let render = Arc::new(render);
        Self::new(name, move |params: CycleParams| {
            let transport = Arc::clone(&transport);
            let render = Arc::clone(&render);
            let mut request = Request::new(Method::Get, path.clone());
            if paged {
                request = params.apply(request);
            }
            async move {
                let payload = transport.send(request).await?;
                (*render)(payload).map_err(|e| match e {
                    OrchestratorError::Render(_) => e,
                    other => OrchestratorError::Render(other.to_string()),
                })
            }
        })
    }

    /// Producer name, used in failure notifications.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the producer once.
    pub fn invoke(&self, params: CycleParams) -> BoxFuture<'static, Result<(), OrchestratorError>> {
        (self.run)(params)
    }
}

/// Clears the busy flag exactly once, on release or drop.
struct BusyGuard {
    busy: Arc<AtomicBool>,
    released: bool,
}

impl BusyGuard {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.busy.store(false, Ordering::Release);
        }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.release();
    }
}

struct Inner {
    producers: RwLock<Vec<Producer>>,
    busy: Arc<AtomicBool>,
    current: Mutex<CycleParams>,
    completed: AtomicU64,
    skipped: AtomicU64,
    notifications: NotificationCenter,
    fallback: FallbackHandler,
    dispatcher: Dispatcher,
    config: RefreshConfig,
}

/// Busy-guarded coordinator of refresh producers.
///
/// Cloning is cheap; clones share producers, busy flag and parameters.
#[derive(Clone)]
pub struct RefreshOrchestrator {
    inner: Arc<Inner>,
}

impl RefreshOrchestrator {
    /// Create an orchestrator reporting through `notifications` and driving
    /// the loading indicator through `dispatcher`.
    pub fn new(config: RefreshConfig, notifications: NotificationCenter, dispatcher: Dispatcher) -> Self {
        Self {
            inner: Arc::new(Inner {
                producers: RwLock::new(Vec::new()),
                busy: Arc::new(AtomicBool::new(false)),
                current: Mutex::new(CycleParams::default()),
                completed: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
                fallback: FallbackHandler::new(notifications.clone()),
                notifications,
                dispatcher,
                config,
            }),
        }
    }

    /// Register `producer`. A producer with the same name is replaced in place,
    /// keeping its position in the invocation order.
    pub fn register_producer(&self, producer: Producer) {
        let mut producers = self.inner.producers.write();
        match producers.iter_mut().find(|p| p.name == producer.name) {
            Some(slot) => *slot = producer,
            None => producers.push(producer),
        }
    }

    /// Names of registered producers, in invocation order.
    pub fn producer_names(&self) -> Vec<String> {
        self.inner.producers.read().iter().map(|p| p.name.clone()).collect()
    }

    /// Whether a cycle is in flight.
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Cycles that ran to settlement.
    pub fn completed_cycles(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }

    /// Triggers dropped because a cycle was in flight.
    pub fn skipped_cycles(&self) -> u64 {
        self.inner.skipped.load(Ordering::Relaxed)
    }

    /// Parameters of the most recent trigger; timer cycles reuse them.
    pub fn current_params(&self) -> CycleParams {
        self.inner.current.lock().clone()
    }

    /// Run one cycle over the producers selected by `scope`.
    ///
    /// `params` become the current parameters even when the cycle is skipped,
    /// so the next timer cycle picks up the latest search.
    ///
    /// The cycle runs in its own task. Dropping the returned future does not
    /// cancel it: busy and the loading indicator still clear once every
    /// producer has settled.
    pub async fn trigger_cycle(
        &self,
        scope: CycleScope,
        trigger: Trigger,
        params: CycleParams,
    ) -> CycleOutcome {
        *self.inner.current.lock() = params.clone();

        if self
            .inner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.inner.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(trigger = ?trigger, "refresh cycle skipped: busy");
            return CycleOutcome::Skipped;
        }
        let guard = BusyGuard {
            busy: Arc::clone(&self.inner.busy),
            released: false,
        };

        let cycle_id = Uuid::new_v4();
        let span = info_span!("refresh_cycle", cycle_id = %cycle_id, trigger = ?trigger);
        let orchestrator = self.clone();
        let cycle = tokio::spawn(
            async move {
                orchestrator
                    .run_cycle(guard, cycle_id, scope, trigger, params)
                    .await
            }
            .instrument(span),
        );

        match cycle.await {
            Ok(report) => CycleOutcome::Completed(report),
            Err(join_error) => {
                self.inner.fallback.report_join("refresh_cycle", join_error);
                CycleOutcome::Aborted
            }
        }
    }

    async fn run_cycle(
        &self,
        mut guard: BusyGuard,
        cycle_id: Uuid,
        scope: CycleScope,
        trigger: Trigger,
        params: CycleParams,
    ) -> CycleReport {
        let started = Instant::now();
        let selected: Vec<Producer> = self
            .inner
            .producers
            .read()
            .iter()
            .filter(|p| scope.includes(&p.name))
            .cloned()
            .collect();
        if let CycleScope::Only(names) = &scope {
            for name in names.iter().filter(|n| !selected.iter().any(|p| &p.name == *n)) {
                warn!(producer = %name, "no producer registered under this name");
            }
        }

        if trigger == Trigger::Manual && self.inner.config.announce_manual {
            self.inner
                .notifications
                .notify(MANUAL_REFRESH_MESSAGE, NotificationKind::Info);
        }
        self.inner.dispatcher.emit(Intent::LoadingStarted);
        info!(producers = selected.len(), "refresh cycle started");

        let mut pending: FuturesUnordered<_> = selected
            .iter()
            .enumerate()
            .map(|(index, producer)| {
                let work = tokio::spawn(producer.invoke(params.clone()).instrument(Span::current()));
                async move { (index, work.await) }
            })
            .collect();

        // Failures are reported as they arrive, not when the slowest producer settles.
        let mut settled = Vec::with_capacity(selected.len());
        while let Some((index, result)) = pending.next().await {
            let name = &selected[index].name;
            let outcome = match result {
                Ok(Ok(())) => {
                    debug!(producer = %name, "producer settled");
                    Ok(())
                }
                Ok(Err(e)) => {
                    warn!(producer = %name, error = %e, kind = e.kind(), "producer failed");
                    self.inner
                        .notifications
                        .error(format!("Failed to refresh {name}: {e}"));
                    Err(e)
                }
                Err(join_error) => {
                    self.inner
                        .notifications
                        .error(format!("Failed to refresh {name}"));
                    self.inner.fallback.report_join(name, join_error);
                    Err(OrchestratorError::TaskPanicked(name.clone()))
                }
            };
            settled.push((index, outcome));
        }
        settled.sort_by_key(|(index, _)| *index);

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (index, outcome) in settled {
            let name = selected[index].name.clone();
            match outcome {
                Ok(()) => succeeded.push(name),
                Err(e) => failed.push((name, e)),
            }
        }

        self.inner.dispatcher.emit(Intent::LoadingFinished);
        guard.release();
        self.inner.completed.fetch_add(1, Ordering::Relaxed);

        let report = CycleReport {
            cycle_id,
            trigger,
            succeeded,
            failed,
            elapsed: started.elapsed(),
        };
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "refresh cycle settled"
        );
        if trigger == Trigger::Manual && report.is_success() && self.inner.config.summary_on_success {
            self.inner
                .notifications
                .notify(REFRESH_SUCCESS_MESSAGE, NotificationKind::Success);
        }
        report
    }

    /// Fire a [`Trigger::Timer`] cycle over `scope` every `interval`, reusing
    /// the current parameters. The first cycle fires after one full interval.
    pub fn schedule_cadence(
        &self,
        scheduler: &Scheduler,
        id: impl Into<String>,
        interval: Duration,
        scope: CycleScope,
    ) -> TaskHandle {
        let orchestrator = self.clone();
        scheduler.schedule(id, interval, move || {
            let orchestrator = orchestrator.clone();
            let scope = scope.clone();
            async move {
                let params = orchestrator.current_params();
                orchestrator.trigger_cycle(scope, Trigger::Timer, params).await;
                Ok(())
            }
        })
    }
}
