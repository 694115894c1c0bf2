//! Demo binary for tokio-live-orchestrator
//!
//! Starts a console against a live backend (or a scripted one) with a
//! headless surface that logs every intent, then runs until Ctrl-C.
//!
//! ## Environment Variables
//!
//! - `LIVE_CONFIG` — path to a TOML config file; its `endpoints.base_url` is
//!   the backend unless `LIVE_BASE_URL` overrides it
//! - `LIVE_BASE_URL` — backend base URL; when neither variable is set a
//!   scripted backend with drifting statistics is used
//! - `LOG_FORMAT=json` — structured JSON output (production)
//! - `RUST_LOG=info` — log level filter

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_live_orchestrator::config::loader::load_from_file;
use tokio_live_orchestrator::counters::{
    ACTIVE_RECORDS_ANCHOR, TODAY_ACTIVITY_ANCHOR, TOTAL_MESSAGES_ANCHOR, TOTAL_USERS_ANCHOR,
};
use tokio_live_orchestrator::{
    init_tracing, HttpTransport, Intent, LiveConfig, LiveConsole, MemorySurface, Method,
    OrchestratorError, ScriptedTransport, Surface, Transport,
};
use tracing::info;

/// Memory surface that logs what the page would show.
struct LoggingSurface {
    inner: MemorySurface,
}

impl Surface for LoggingSurface {
    fn apply(&self, intent: &Intent) -> Result<(), OrchestratorError> {
        self.inner.apply(intent)?;
        match intent {
            Intent::SetText { anchor, text } => info!(anchor = %anchor, text = %text, "text"),
            Intent::InsertNotification { id, kind, message } => {
                info!(id = %id, kind = %kind, message = %message, "toast")
            }
            Intent::LoadingStarted => info!("loading..."),
            Intent::LoadingFinished => info!("loaded"),
            other => tracing::debug!(intent = ?other, "surface"),
        }
        Ok(())
    }

    fn read_text(&self, anchor: &str) -> Option<String> {
        self.inner.read_text(anchor)
    }
}

fn scripted_backend(config: &LiveConfig) -> ScriptedTransport {
    let transport = ScriptedTransport::new();
    let stats = config.endpoints.stats.clone();
    transport.respond(
        Method::Get,
        &stats,
        json!({"total_usuarios": 1200, "total_mensajes": 48000, "actividad_hoy": 35}),
    );
    transport.respond_after(
        Method::Get,
        &config.endpoints.activity,
        Duration::from_millis(80),
        json!({"labels": ["mon", "tue", "wed"], "values": [12, 30, 18]}),
    );

    let drifting = transport.clone();
    tokio::spawn(async move {
        let mut users = 1200;
        let mut messages = 48000;
        loop {
            tokio::time::sleep(Duration::from_secs(10)).await;
            users += 3;
            messages += 120;
            drifting.respond(
                Method::Get,
                &stats,
                json!({"total_usuarios": users, "total_mensajes": messages, "actividad_hoy": 35}),
            );
        }
    });
    transport
}

/// Backend to connect to: `LIVE_BASE_URL` first, then the loaded config file.
/// `None` selects the scripted backend.
fn backend_url(config: &LiveConfig, from_file: bool, env_url: Option<String>) -> Option<String> {
    env_url
        .filter(|url| !url.trim().is_empty())
        .or_else(|| from_file.then(|| config.endpoints.base_url.clone()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = init_tracing();

    let (mut config, from_file) = match std::env::var("LIVE_CONFIG") {
        Ok(path) => (load_from_file(Path::new(&path))?, true),
        Err(_) => (LiveConfig::default(), false),
    };

    let transport: Arc<dyn Transport> =
        match backend_url(&config, from_file, std::env::var("LIVE_BASE_URL").ok()) {
            Some(base_url) => {
                config.endpoints.base_url = base_url;
                Arc::new(HttpTransport::new(config.endpoints.base_url.clone()))
            }
            None => {
                info!("no LIVE_CONFIG or LIVE_BASE_URL, using scripted backend");
                Arc::new(scripted_backend(&config))
            }
        };

    let surface = Arc::new(LoggingSurface {
        inner: MemorySurface::new()
            .with_anchor(TOTAL_USERS_ANCHOR, "0")
            .with_anchor(TOTAL_MESSAGES_ANCHOR, "0")
            .with_anchor(TODAY_ACTIVITY_ANCHOR, "0")
            .with_anchor(ACTIVE_RECORDS_ANCHOR, "0"),
    });

    info!(base_url = %config.endpoints.base_url, "Starting tokio-live-orchestrator demo");

    let console = LiveConsole::builder(config, transport, surface)
        .on_charts(|payload| {
            info!(points = %payload, "chart data");
            Ok(())
        })
        .start()
        .await?;

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down");
    console.shutdown();
    Ok(())
}
