//! # Console lifecycle
//!
//! ## Responsibility
//! Build the shared state objects of one console page (notification centre,
//! scheduler, orchestrator, animator, debouncer), register the standard
//! producers, run the initial refresh, arm the cadences, and tear it all down
//! on [`LiveConsole::shutdown`].
//!
//! ## Cadences
//!
//! | Producer | Endpoint              | Cadence                 |
//! |----------|-----------------------|-------------------------|
//! | `stats`  | `endpoints.stats`     | `refresh.stats_interval`  |
//! | `charts` | `endpoints.activity`  | `refresh.charts_interval` |
//! | `logs`   | `endpoints.logs`      | `refresh.listing_interval`|
//! | `users`  | `endpoints.users`     | on demand only          |
//!
//! Chart and listing producers exist only when a renderer is supplied.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument};

use crate::actions::ActionRunner;
use crate::animator::ValueAnimator;
use crate::config::validation::check;
use crate::config::LiveConfig;
use crate::counters::CounterBoard;
use crate::debounce::Debouncer;
use crate::dispatch::{Dispatcher, Surface};
use crate::fallback::FallbackHandler;
use crate::notification::NotificationCenter;
use crate::refresh::{CycleOutcome, CycleParams, CycleScope, Producer, RefreshOrchestrator, Trigger};
use crate::scheduler::Scheduler;
use crate::submit_guard::SubmitGuard;
use crate::transport::Transport;
use crate::OrchestratorError;

/// Stat counters producer.
pub const STATS_PRODUCER: &str = "stats";
/// Activity chart producer.
pub const CHARTS_PRODUCER: &str = "charts";
/// User listing producer.
pub const USERS_PRODUCER: &str = "users";
/// Log listing producer.
pub const LOGS_PRODUCER: &str = "logs";

const SEARCH_KEY: &str = "listing-search";

/// Caller-supplied render callback for a payload.
pub type RenderFn = Arc<dyn Fn(Value) -> Result<(), OrchestratorError> + Send + Sync>;

/// Configures which page features a [`LiveConsole`] drives.
pub struct ConsoleBuilder {
    config: LiveConfig,
    transport: Arc<dyn Transport>,
    surface: Arc<dyn Surface>,
    charts: Option<RenderFn>,
    users: Option<RenderFn>,
    logs: Option<RenderFn>,
}

impl ConsoleBuilder {
    /// Render activity chart data with `render`.
    pub fn on_charts<R>(mut self, render: R) -> Self
    where
        R: Fn(Value) -> Result<(), OrchestratorError> + Send + Sync + 'static,
    {
        self.charts = Some(Arc::new(render));
        self
    }

    /// Render the paged user listing with `render`.
    pub fn on_users<R>(mut self, render: R) -> Self
    where
        R: Fn(Value) -> Result<(), OrchestratorError> + Send + Sync + 'static,
    {
        self.users = Some(Arc::new(render));
        self
    }

    /// Render the paged log listing with `render`.
    pub fn on_logs<R>(mut self, render: R) -> Self
    where
        R: Fn(Value) -> Result<(), OrchestratorError> + Send + Sync + 'static,
    {
        self.logs = Some(Arc::new(render));
        self
    }

    /// Validate the config, wire the components and run the initial refresh.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] listing every validation failure.
    pub async fn start(self) -> Result<LiveConsole, OrchestratorError> {
        LiveConsole::assemble(self).await
    }
}

/// One running console page.
pub struct LiveConsole {
    config: LiveConfig,
    notifications: NotificationCenter,
    scheduler: Scheduler,
    orchestrator: RefreshOrchestrator,
    animator: ValueAnimator,
    debouncer: Debouncer,
    actions: ActionRunner,
    submit_guard: Arc<SubmitGuard>,
    listing_scope: Option<CycleScope>,
}

impl LiveConsole {
    /// Start configuring a console.
    pub fn builder(
        config: LiveConfig,
        transport: Arc<dyn Transport>,
        surface: Arc<dyn Surface>,
    ) -> ConsoleBuilder {
        ConsoleBuilder {
            config,
            transport,
            surface,
            charts: None,
            users: None,
            logs: None,
        }
    }

    /// Start a console driving only the stat counters.
    ///
    /// # Errors
    ///
    /// See [`ConsoleBuilder::start`].
    pub async fn start(
        config: LiveConfig,
        transport: Arc<dyn Transport>,
        surface: Arc<dyn Surface>,
    ) -> Result<Self, OrchestratorError> {
        Self::builder(config, transport, surface).start().await
    }

    #[instrument(skip_all, fields(base_url = %builder.config.endpoints.base_url))]
    async fn assemble(builder: ConsoleBuilder) -> Result<Self, OrchestratorError> {
        let ConsoleBuilder {
            config,
            transport,
            surface,
            charts,
            users,
            logs,
        } = builder;

        check(&config, "console config").map_err(|e| OrchestratorError::Config(e.to_string()))?;

        let dispatcher = Dispatcher::new(surface);
        let notifications = NotificationCenter::new(config.notifications.clone(), dispatcher.clone());
        let scheduler = Scheduler::new().with_fallback(FallbackHandler::new(notifications.clone()));
        let orchestrator =
            RefreshOrchestrator::new(config.refresh.clone(), notifications.clone(), dispatcher.clone());
        let animator = ValueAnimator::new(&config.animation, dispatcher.clone());
        let endpoints = &config.endpoints;

        let counters = CounterBoard::dashboard(animator.clone(), dispatcher, config.animation.duration());
        orchestrator.register_producer(counters.producer(
            STATS_PRODUCER,
            Arc::clone(&transport),
            endpoints.stats.clone(),
        ));
        if let Some(render) = charts {
            orchestrator.register_producer(Producer::fetch_and_render(
                CHARTS_PRODUCER,
                Arc::clone(&transport),
                endpoints.activity.clone(),
                move |payload| (*render)(payload),
            ));
        }
        let mut listings = Vec::new();
        if let Some(render) = users {
            orchestrator.register_producer(Producer::paged_listing(
                USERS_PRODUCER,
                Arc::clone(&transport),
                endpoints.users.clone(),
                move |payload| (*render)(payload),
            ));
            listings.push(USERS_PRODUCER.to_string());
        }
        let has_logs = logs.is_some();
        if let Some(render) = logs {
            orchestrator.register_producer(Producer::paged_listing(
                LOGS_PRODUCER,
                Arc::clone(&transport),
                endpoints.logs.clone(),
                move |payload| (*render)(payload),
            ));
            listings.push(LOGS_PRODUCER.to_string());
        }

        let console = Self {
            actions: ActionRunner::new(transport, notifications.clone(), orchestrator.clone()),
            submit_guard: Arc::new(SubmitGuard::new(config.forms.submit_lock())),
            listing_scope: (!listings.is_empty()).then_some(CycleScope::Only(listings)),
            debouncer: Debouncer::new(),
            notifications,
            scheduler,
            orchestrator,
            animator,
            config,
        };

        console
            .orchestrator
            .trigger_cycle(CycleScope::All, Trigger::Timer, CycleParams::default())
            .await;

        let refresh = &console.config.refresh;
        console.orchestrator.schedule_cadence(
            &console.scheduler,
            STATS_PRODUCER,
            refresh.stats_interval(),
            CycleScope::one(STATS_PRODUCER),
        );
        if console.orchestrator.producer_names().iter().any(|n| n == CHARTS_PRODUCER) {
            console.orchestrator.schedule_cadence(
                &console.scheduler,
                CHARTS_PRODUCER,
                refresh.charts_interval(),
                CycleScope::one(CHARTS_PRODUCER),
            );
        }
        if has_logs {
            console.orchestrator.schedule_cadence(
                &console.scheduler,
                LOGS_PRODUCER,
                refresh.listing_interval(),
                CycleScope::one(LOGS_PRODUCER),
            );
        }

        info!(
            producers = ?console.orchestrator.producer_names(),
            cadences = console.scheduler.len(),
            "console started"
        );
        Ok(console)
    }

    /// Refresh button: announce, run every producer, summarise.
    pub async fn refresh(&self) -> CycleOutcome {
        let params = self.orchestrator.current_params();
        self.orchestrator
            .trigger_cycle(CycleScope::All, Trigger::Manual, params)
            .await
    }

    /// Search input changed. Reloads page 1 of the listings once typing
    /// pauses for the configured debounce window.
    pub fn search(&self, text: impl Into<String>) {
        let Some(scope) = self.listing_scope.clone() else {
            return;
        };
        let text = text.into();
        let orchestrator = self.orchestrator.clone();
        self.debouncer
            .debounce(SEARCH_KEY, self.config.search.debounce(), move || async move {
                orchestrator
                    .trigger_cycle(scope, Trigger::Search, CycleParams::search(text))
                    .await;
            });
    }

    /// Whether a search is waiting for typing to pause.
    pub fn search_pending(&self) -> bool {
        self.debouncer.is_pending(SEARCH_KEY)
    }

    /// Load `page` of the listings, keeping the current search and filters.
    pub async fn go_to_page(&self, page: u32) -> CycleOutcome {
        let Some(scope) = self.listing_scope.clone() else {
            return CycleOutcome::Skipped;
        };
        let params = self.orchestrator.current_params().with_page(page);
        self.orchestrator
            .trigger_cycle(scope, Trigger::Search, params)
            .await
    }

    /// Configuration the console was started with.
    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Shared notification centre.
    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Shared refresh orchestrator.
    pub fn orchestrator(&self) -> &RefreshOrchestrator {
        &self.orchestrator
    }

    /// Shared scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Shared counter animator.
    pub fn animator(&self) -> &ValueAnimator {
        &self.animator
    }

    /// Mutation runner reloading the listings on success.
    pub fn actions(&self) -> &ActionRunner {
        &self.actions
    }

    /// Form double-submission guard.
    pub fn submit_guard(&self) -> &SubmitGuard {
        &self.submit_guard
    }

    /// Cancel every cadence, pending search and animation, and close the
    /// notification centre.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        self.debouncer.cancel_all();
        self.animator.cancel_all();
        self.notifications.shutdown();
        info!("console shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::TOTAL_USERS_ANCHOR;
    use crate::dispatch::MemorySurface;
    use crate::transport::{Method, ScriptedTransport};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_start_rejects_invalid_config() {
        let mut config = LiveConfig::default();
        config.refresh.stats_interval_ms = 0;
        let result = LiveConsole::start(
            config,
            Arc::new(ScriptedTransport::new()),
            Arc::new(MemorySurface::new()),
        )
        .await;
        assert!(matches!(result, Err(OrchestratorError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_refreshes_stats_and_arms_cadence() {
        let config = LiveConfig::default();
        let transport = ScriptedTransport::new();
        transport.respond(Method::Get, &config.endpoints.stats, json!({"total_usuarios": 42}));
        let surface = Arc::new(MemorySurface::new().with_anchor(TOTAL_USERS_ANCHOR, "0"));

        let console = LiveConsole::start(config.clone(), Arc::new(transport.clone()), surface.clone())
            .await
            .expect("test: valid config");
        assert_eq!(transport.calls_to(&config.endpoints.stats).len(), 1);
        assert!(console.scheduler().is_scheduled(STATS_PRODUCER));
        assert!(!console.scheduler().is_scheduled(CHARTS_PRODUCER));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(surface.text(TOTAL_USERS_ANCHOR).as_deref(), Some("42"));

        tokio::time::sleep(config.refresh.stats_interval()).await;
        assert_eq!(transport.calls_to(&config.endpoints.stats).len(), 2);

        console.shutdown();
        assert!(console.scheduler().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_is_debounced_onto_listings() {
        let config = LiveConfig::default();
        let transport = ScriptedTransport::new();
        transport.respond(Method::Get, &config.endpoints.stats, json!({}));
        transport.respond(Method::Get, &config.endpoints.users, json!({"usuarios": []}));

        let console = LiveConsole::builder(
            config.clone(),
            Arc::new(transport.clone()),
            Arc::new(MemorySurface::new()),
        )
        .on_users(|_| Ok(()))
        .start()
        .await
        .expect("test: valid config");
        assert_eq!(transport.calls_to(&config.endpoints.users).len(), 1);

        for text in ["a", "ad", "adm"] {
            console.search(text);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(console.search_pending());
        tokio::time::sleep(Duration::from_millis(600)).await;

        let calls = transport.calls_to(&config.endpoints.users);
        assert_eq!(calls.len(), 2);
        assert!(calls[1]
            .query
            .contains(&(crate::refresh::SEARCH_PARAM.to_string(), "adm".to_string())));
        assert_eq!(transport.calls_to(&config.endpoints.stats).len(), 1);
        console.shutdown();
    }
}
