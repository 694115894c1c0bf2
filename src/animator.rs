//! # Animated counters
//!
//! Drives a numeric anchor from one value to another over a fixed duration
//! with a quartic ease-out curve, one write per frame.
//!
//! At most one run is active per anchor. Starting a new run bumps the
//! anchor's generation; the previous run notices on its next frame and stops
//! without writing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::config::AnimationConfig;
use crate::dispatch::{Dispatcher, Intent};

/// Quartic ease-out: fast start, slow settle. Input is clamped to `[0, 1]`.
#[inline]
pub fn ease_out_quart(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(4)
}

/// Value displayed `elapsed` into a `duration`-long run from `from` to `to`.
///
/// Returns exactly `to` once `elapsed >= duration` and never overshoots.
pub fn frame_value(from: i64, to: i64, elapsed: Duration, duration: Duration) -> i64 {
    if duration.is_zero() || elapsed >= duration {
        return to;
    }
    let progress = elapsed.as_secs_f64() / duration.as_secs_f64();
    let eased = ease_out_quart(progress);
    let raw = (from as f64 + (to as f64 - from as f64) * eased).floor() as i64;
    raw.clamp(from.min(to), from.max(to))
}

/// Render `value` with `separator` between groups of three digits.
///
/// ```
/// use tokio_live_orchestrator::animator::format_grouped;
/// assert_eq!(format_grouped(1_234_567, ","), "1,234,567");
/// assert_eq!(format_grouped(-950, ","), "-950");
/// ```
pub fn format_grouped(value: i64, separator: &str) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 * separator.len() + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(ch);
    }
    out
}

/// Parse text previously written by [`format_grouped`]. Anything that is not
/// a grouped integer reads as `0`.
pub fn parse_grouped(text: &str, separator: &str) -> i64 {
    let cleaned: String = if separator.is_empty() {
        text.trim().to_string()
    } else {
        text.trim().replace(separator, "")
    };
    cleaned.parse().unwrap_or(0)
}

/// How an animation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationEnd {
    /// Final frame written.
    Completed,
    /// A newer run on the same anchor took over.
    Superseded,
    /// The surface rejected a write (anchor missing); remaining frames dropped.
    TargetMissing,
}

/// Per-anchor eased counter animations.
#[derive(Clone)]
pub struct ValueAnimator {
    dispatcher: Dispatcher,
    frame_interval: Duration,
    separator: String,
    default_duration: Duration,
    active: Arc<DashMap<String, u64>>,
    generations: Arc<AtomicU64>,
}

impl ValueAnimator {
    /// Create an animator writing through `dispatcher`.
    pub fn new(config: &AnimationConfig, dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            frame_interval: config.frame_interval().max(Duration::from_millis(1)),
            separator: config.group_separator.clone(),
            default_duration: config.duration(),
            active: Arc::new(DashMap::new()),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Separator used for grouped numerals.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Animate over the configured default duration.
    pub fn animate_default(
        &self,
        anchor: impl Into<String>,
        from: i64,
        to: i64,
    ) -> Option<JoinHandle<AnimationEnd>> {
        self.animate(anchor, from, to, self.default_duration)
    }

    /// Start a run on `anchor`, superseding any active one.
    ///
    /// Returns `None` without writing anything when `from == to`. The first
    /// frame is written immediately and shows `from`.
    pub fn animate(
        &self,
        anchor: impl Into<String>,
        from: i64,
        to: i64,
        duration: Duration,
    ) -> Option<JoinHandle<AnimationEnd>> {
        if from == to {
            return None;
        }
        let anchor = anchor.into();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(previous) = self.active.insert(anchor.clone(), generation) {
            debug!(anchor = %anchor, superseded = previous, generation = generation, "animation superseded");
        }

        let dispatcher = self.dispatcher.clone();
        let active = Arc::clone(&self.active);
        let separator = self.separator.clone();
        let frame_interval = self.frame_interval;

        Some(tokio::spawn(async move {
            let start = Instant::now();
            let mut frames = tokio::time::interval(frame_interval);
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                frames.tick().await;
                if active.get(&anchor).map(|g| *g) != Some(generation) {
                    return AnimationEnd::Superseded;
                }
                let elapsed = start.elapsed();
                let value = frame_value(from, to, elapsed, duration);
                let written = dispatcher.emit(Intent::SetText {
                    anchor: anchor.clone(),
                    text: format_grouped(value, &separator),
                });
                let end = if !written {
                    Some(AnimationEnd::TargetMissing)
                } else if elapsed >= duration {
                    Some(AnimationEnd::Completed)
                } else {
                    None
                };
                if let Some(end) = end {
                    active.remove_if(&anchor, |_, g| *g == generation);
                    debug!(anchor = %anchor, generation = generation, end = ?end, "animation finished");
                    return end;
                }
            }
        }))
    }

    /// Whether a run is active on `anchor`.
    pub fn is_animating(&self, anchor: &str) -> bool {
        self.active.contains_key(anchor)
    }

    /// Stop every active run. Their next frame becomes a no-op.
    pub fn cancel_all(&self) {
        self.active.clear();
    }
}
