//! # Console Configuration
//!
//! ## Responsibility
//! Parse and validate the TOML configuration that drives refresh cadences,
//! debounce windows, animation timing, notification lifetimes and the API
//! endpoints the standard producers poll.
//!
//! ## Guarantees
//! - Deterministic: same TOML input always produces the same `LiveConfig`
//! - Complete defaults: an empty document is a valid configuration
//! - Validated: all semantic constraints are checked before a config is accepted
//! - Schema-exportable: JSON Schema output enables IDE autocomplete
//!
//! ## NOT Responsible For
//! - Arming timers from the config (that belongs to `console`)
//! - Performing requests (that belongs to `transport`)

pub mod loader;
pub mod validation;

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Default value functions ──────────────────────────────────────────────

/// Default stat-counter refresh cadence: 30 s.
fn default_stats_interval_ms() -> u64 {
    30_000
}

/// Default chart refresh cadence: 120 s.
fn default_charts_interval_ms() -> u64 {
    120_000
}

/// Default listing (logs) refresh cadence: 60 s.
fn default_listing_interval_ms() -> u64 {
    60_000
}

/// Default search debounce window: 500 ms.
fn default_search_debounce_ms() -> u64 {
    500
}

/// Default counter animation duration: 1000 ms.
fn default_animation_duration_ms() -> u64 {
    1000
}

/// Default frame interval: 16 ms (~60 fps).
fn default_frame_interval_ms() -> u64 {
    16
}

/// Default thousands separator for counter text.
fn default_group_separator() -> String {
    ",".to_string()
}

/// Default toast lifetime: 5000 ms.
fn default_notification_duration_ms() -> u64 {
    5000
}

/// Default delay before a toast's enter transition: 100 ms.
fn default_enter_delay_ms() -> u64 {
    100
}

/// Default exit transition length: 300 ms.
fn default_exit_ms() -> u64 {
    300
}

/// Default double-submission lock window: 3000 ms.
fn default_submit_lock_ms() -> u64 {
    3000
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_stats_path() -> String {
    "/admin/api/estadisticas".to_string()
}

fn default_activity_path() -> String {
    "/admin/api/actividad?dias=7".to_string()
}

fn default_users_path() -> String {
    "/admin/api/usuarios".to_string()
}

fn default_logs_path() -> String {
    "/admin/api/logs".to_string()
}

/// Default enabled state: true.
fn default_true() -> bool {
    true
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration for a live console instance.
///
/// Every section and field has a documented default, so an empty TOML
/// document yields the same behaviour as the stock console.
///
/// # Example
///
/// ```toml
/// [refresh]
/// stats_interval_ms = 30000
/// charts_interval_ms = 120000
///
/// [search]
/// debounce_ms = 500
///
/// [endpoints]
/// base_url = "https://console.example.org"
/// ```
///
/// # Panics
///
/// This type never panics during construction or access.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct LiveConfig {
    /// Refresh cadences and cycle announcements.
    #[serde(default)]
    pub refresh: RefreshConfig,
    /// Search input debouncing.
    #[serde(default)]
    pub search: SearchConfig,
    /// Counter animation timing and formatting.
    #[serde(default)]
    pub animation: AnimationConfig,
    /// Toast lifetimes and stacking behaviour.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Form submission guard.
    #[serde(default)]
    pub forms: FormsConfig,
    /// API endpoints polled by the standard producers.
    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

// ── Refresh ──────────────────────────────────────────────────────────────

/// Refresh cadence configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RefreshConfig {
    /// Stat-counter refresh interval (ms).
    #[serde(default = "default_stats_interval_ms")]
    pub stats_interval_ms: u64,
    /// Full chart refresh interval (ms).
    #[serde(default = "default_charts_interval_ms")]
    pub charts_interval_ms: u64,
    /// Paged listing refresh interval (ms).
    #[serde(default = "default_listing_interval_ms")]
    pub listing_interval_ms: u64,
    /// Show an info toast before a manually triggered cycle.
    #[serde(default = "default_true")]
    pub announce_manual: bool,
    /// Show a success toast once a manually triggered cycle settles.
    #[serde(default = "default_true")]
    pub summary_on_success: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            stats_interval_ms: default_stats_interval_ms(),
            charts_interval_ms: default_charts_interval_ms(),
            listing_interval_ms: default_listing_interval_ms(),
            announce_manual: true,
            summary_on_success: true,
        }
    }
}

impl RefreshConfig {
    /// Stat-counter cadence as a [`Duration`].
    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }

    /// Chart cadence as a [`Duration`].
    pub fn charts_interval(&self) -> Duration {
        Duration::from_millis(self.charts_interval_ms)
    }

    /// Listing cadence as a [`Duration`].
    pub fn listing_interval(&self) -> Duration {
        Duration::from_millis(self.listing_interval_ms)
    }
}

// ── Search ───────────────────────────────────────────────────────────────

/// Search input configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SearchConfig {
    /// Quiet period (ms) after the last keystroke before a search fires.
    #[serde(default = "default_search_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_search_debounce_ms(),
        }
    }
}

impl SearchConfig {
    /// Debounce window as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

// ── Animation ────────────────────────────────────────────────────────────

/// Counter animation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AnimationConfig {
    /// Length of a counter transition (ms).
    #[serde(default = "default_animation_duration_ms")]
    pub duration_ms: u64,
    /// Interval between animation frames (ms).
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Thousands separator used when writing counter text.
    #[serde(default = "default_group_separator")]
    pub group_separator: String,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            duration_ms: default_animation_duration_ms(),
            frame_interval_ms: default_frame_interval_ms(),
            group_separator: default_group_separator(),
        }
    }
}

impl AnimationConfig {
    /// Transition length as a [`Duration`].
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Frame interval as a [`Duration`].
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

// ── Notifications ────────────────────────────────────────────────────────

/// Toast configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct NotificationConfig {
    /// Lifetime (ms) of a toast created without an explicit duration.
    #[serde(default = "default_notification_duration_ms")]
    pub default_duration_ms: u64,
    /// Delay (ms) between insertion and the enter transition.
    #[serde(default = "default_enter_delay_ms")]
    pub enter_delay_ms: u64,
    /// Length (ms) of the exit transition before removal.
    #[serde(default = "default_exit_ms")]
    pub exit_ms: u64,
    /// Collapse identical messages while one is still on screen.
    #[serde(default = "default_true")]
    pub dedupe: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: default_notification_duration_ms(),
            enter_delay_ms: default_enter_delay_ms(),
            exit_ms: default_exit_ms(),
            dedupe: true,
        }
    }
}

impl NotificationConfig {
    /// Default toast lifetime as a [`Duration`].
    pub fn default_duration(&self) -> Duration {
        Duration::from_millis(self.default_duration_ms)
    }

    /// Enter delay as a [`Duration`].
    pub fn enter_delay(&self) -> Duration {
        Duration::from_millis(self.enter_delay_ms)
    }

    /// Exit transition as a [`Duration`].
    pub fn exit(&self) -> Duration {
        Duration::from_millis(self.exit_ms)
    }
}

// ── Forms ────────────────────────────────────────────────────────────────

/// Form submission configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct FormsConfig {
    /// Window (ms) during which a second submission is rejected.
    #[serde(default = "default_submit_lock_ms")]
    pub submit_lock_ms: u64,
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            submit_lock_ms: default_submit_lock_ms(),
        }
    }
}

impl FormsConfig {
    /// Submission lock window as a [`Duration`].
    pub fn submit_lock(&self) -> Duration {
        Duration::from_millis(self.submit_lock_ms)
    }
}

// ── Endpoints ────────────────────────────────────────────────────────────

/// API endpoints polled by the standard producers.
///
/// Paths are joined onto `base_url` by the transport.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct EndpointsConfig {
    /// Scheme and authority of the console API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Aggregate statistics (counter board).
    #[serde(default = "default_stats_path")]
    pub stats: String,
    /// Activity chart series.
    #[serde(default = "default_activity_path")]
    pub activity: String,
    /// Paged user listing.
    #[serde(default = "default_users_path")]
    pub users: String,
    /// Paged log listing.
    #[serde(default = "default_logs_path")]
    pub logs: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stats: default_stats_path(),
            activity: default_activity_path(),
            users: default_users_path(),
            logs: default_logs_path(),
        }
    }
}

/// Export the JSON Schema for `LiveConfig`.
///
/// # Errors
///
/// Returns `serde_json::Error` if schema serialization fails.
///
/// # Panics
///
/// This function never panics.
pub fn export_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(LiveConfig);
    serde_json::to_string_pretty(&schema)
}
