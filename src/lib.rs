//! # tokio-live-orchestrator
//!
//! Live-update and notification orchestration for polling admin consoles,
//! built on Tokio.
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────── Scheduler (30s / 120s / 60s cadences)
//!            │                     │
//! search ─► Debouncer(500ms) ─► RefreshOrchestrator ──► producers ──► Transport
//! button ──────────────────────►   (busy guard)          │
//!                                                         ├─► ValueAnimator ─┐
//!                                                         ├─► render callback │
//!                                                         └─► NotificationCenter
//!                                                                             │
//!                                        Dispatcher ──► Surface (page) ◄──────┘
//! ```
//!
//! Every component is an explicit state object created by [`console::LiveConsole`]
//! at start-up and torn down by [`console::LiveConsole::shutdown`]. Components
//! never touch the page directly; they emit [`dispatch::Intent`]s which the
//! [`dispatch::Dispatcher`] applies to a [`dispatch::Surface`].

// ── Lint policy ───────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod actions;
pub mod animator;
pub mod config;
pub mod console;
pub mod counters;
pub mod debounce;
pub mod dispatch;
pub mod fallback;
pub mod notification;
pub mod refresh;
pub mod scheduler;
pub mod submit_guard;
pub mod transport;

// Re-exports for convenience
pub use actions::{ActionMessages, ActionRunner};
pub use animator::ValueAnimator;
pub use config::LiveConfig;
pub use console::{ConsoleBuilder, LiveConsole};
pub use counters::CounterBoard;
pub use debounce::Debouncer;
pub use dispatch::{Dispatcher, Intent, MemorySurface, Surface};
pub use notification::{NotificationCenter, NotificationId, NotificationKind};
pub use refresh::{CycleOutcome, CycleParams, CycleScope, Producer, RefreshOrchestrator, Trigger};
pub use scheduler::{Scheduler, TaskHandle};
pub use submit_guard::SubmitGuard;
pub use transport::{HttpTransport, Method, Request, ScriptedTransport, Transport};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"` — structured JSON output for log aggregators
/// - anything else (including unset) — human-readable pretty output
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`OrchestratorError::Other`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
///
/// # Panics
///
/// This function never panics.
///
/// # Example
///
/// ```no_run
/// # use tokio_live_orchestrator::{init_tracing, OrchestratorError};
/// # fn example() -> Result<(), OrchestratorError> {
/// init_tracing()?;
/// # Ok(()) }
/// ```
pub fn init_tracing() -> Result<(), OrchestratorError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| OrchestratorError::Other(format!("tracing init failed: {e}")))
}

/// Top-level orchestrator errors.
///
/// Every failure a producer, scheduled task or surface write can raise is
/// mapped to a variant here. None of them escape the orchestrator: they are
/// converted into error notifications at the producer boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    /// The request failed to complete or returned a non-success status.
    #[error("network error: {message}")]
    Network {
        /// HTTP status, when the server answered at all.
        status: Option<u16>,
        /// Human-readable failure description.
        message: String,
    },

    /// The response body was not the JSON the caller expected.
    #[error("parse error: {0}")]
    Parse(String),

    /// A render callback rejected the payload it was given.
    #[error("render error: {0}")]
    Render(String),

    /// A required anchor (stacking container, counter element) is missing,
    /// or a configuration value is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A spawned callback panicked instead of returning.
    #[error("task '{0}' panicked")]
    TaskPanicked(String),

    /// Catch-all for errors that do not fit a specific variant.
    #[error("{0}")]
    Other(String),
}

impl OrchestratorError {
    /// Build a [`OrchestratorError::Network`] without a status code.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            status: None,
            message: message.into(),
        }
    }

    /// Build a [`OrchestratorError::Network`] for a non-success HTTP status.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Network {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Short, stable label for the error kind, used as a tracing field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Parse(_) => "parse",
            Self::Render(_) => "render",
            Self::Config(_) => "config",
            Self::TaskPanicked(_) => "panic",
            Self::Other(_) => "other",
        }
    }
}
