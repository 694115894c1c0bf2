//! Stat-counter board
//!
//! Maps fields of the statistics payload onto counter anchors and animates
//! each counter whose displayed value differs from the fresh one.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::animator::{parse_grouped, ValueAnimator};
use crate::dispatch::Dispatcher;
use crate::refresh::Producer;
use crate::transport::Transport;
use crate::OrchestratorError;

/// Anchor showing the registered user count.
pub const TOTAL_USERS_ANCHOR: &str = "stat.total_users";
/// Anchor showing the message count.
pub const TOTAL_MESSAGES_ANCHOR: &str = "stat.total_messages";
/// Anchor showing today's activity.
pub const TODAY_ACTIVITY_ANCHOR: &str = "stat.today_activity";
/// Anchor showing users plus today's activity.
pub const ACTIVE_RECORDS_ANCHOR: &str = "stat.active_records";

/// One payload field shown on one anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterBinding {
    /// Field of the statistics object.
    pub key: String,
    /// Anchor showing it.
    pub anchor: String,
}

/// Anchor showing the sum of several fields. Missing fields count as 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedCounter {
    /// Anchor showing the sum.
    pub anchor: String,
    /// Summed fields.
    pub keys: Vec<String>,
}

/// Set of animated stat counters fed from one statistics payload.
#[derive(Clone)]
pub struct CounterBoard {
    animator: ValueAnimator,
    dispatcher: Dispatcher,
    duration: Duration,
    bindings: Vec<CounterBinding>,
    derived: Vec<DerivedCounter>,
}

impl CounterBoard {
    /// Empty board animating over `duration`.
    pub fn new(animator: ValueAnimator, dispatcher: Dispatcher, duration: Duration) -> Self {
        Self {
            animator,
            dispatcher,
            duration,
            bindings: Vec::new(),
            derived: Vec::new(),
        }
    }

    /// The dashboard's four counters.
    pub fn dashboard(animator: ValueAnimator, dispatcher: Dispatcher, duration: Duration) -> Self {
        Self::new(animator, dispatcher, duration)
            .bind("total_usuarios", TOTAL_USERS_ANCHOR)
            .bind("total_mensajes", TOTAL_MESSAGES_ANCHOR)
            .bind("actividad_hoy", TODAY_ACTIVITY_ANCHOR)
            .derive(ACTIVE_RECORDS_ANCHOR, ["total_usuarios", "actividad_hoy"])
    }

    /// Show `key` on `anchor`.
    pub fn bind(mut self, key: impl Into<String>, anchor: impl Into<String>) -> Self {
        self.bindings.push(CounterBinding {
            key: key.into(),
            anchor: anchor.into(),
        });
        self
    }

    /// Show the sum of `keys` on `anchor`.
    pub fn derive<I, K>(mut self, anchor: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.derived.push(DerivedCounter {
            anchor: anchor.into(),
            keys: keys.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Animate every counter whose value changed. Returns how many started.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Render`] if `stats` is not a JSON object.
    pub fn apply(&self, stats: &Value) -> Result<usize, OrchestratorError> {
        let fields = stats
            .as_object()
            .ok_or_else(|| OrchestratorError::Render("statistics payload is not an object".into()))?;

        let mut started = 0;
        for binding in &self.bindings {
            if let Some(value) = fields.get(&binding.key).and_then(numeric) {
                started += usize::from(self.update(&binding.anchor, value));
            }
        }
        for derived in &self.derived {
            let total = derived
                .keys
                .iter()
                .map(|k| fields.get(k).and_then(numeric).unwrap_or(0))
                .fold(0i64, i64::saturating_add);
            started += usize::from(self.update(&derived.anchor, total));
        }
        Ok(started)
    }

    fn update(&self, anchor: &str, value: i64) -> bool {
        let Some(text) = self.dispatcher.read_text(anchor) else {
            debug!(anchor = anchor, "counter anchor missing, skipped");
            return false;
        };
        let current = parse_grouped(&text, self.animator.separator());
        self.animator
            .animate(anchor, current, value, self.duration)
            .is_some()
    }

    /// Producer fetching `path` through `transport` and applying the payload.
    pub fn producer(
        &self,
        name: impl Into<String>,
        transport: Arc<dyn Transport>,
        path: impl Into<String>,
    ) -> Producer {
        let board = self.clone();
        Producer::fetch_and_render(name, transport, path, move |stats| {
            board.apply(&stats).map(|_| ())
        })
    }
}

fn numeric(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.floor() as i64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}
