//! Notification Centre
//!
//! Page-lifetime registry of toast notifications shared by every console
//! feature. Handles insertion, stacking, timed auto-dismiss, manual dismiss
//! and collapsing of identical concurrent messages.
//!
//! ## Lifecycle
//!
//! ```text
//! notify ──► inserted (visible=false) ──enter delay──► visible
//!                │                                        │
//!                └────────── dismiss / timeout ───────────┘
//!                                   │
//!                            dismissing=true ──exit delay──► removed
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_live_orchestrator::config::NotificationConfig;
//! use tokio_live_orchestrator::{Dispatcher, MemorySurface, NotificationCenter, NotificationKind};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let dispatcher = Dispatcher::new(Arc::new(MemorySurface::new()));
//! let center = NotificationCenter::new(NotificationConfig::default(), dispatcher);
//!
//! let id = center.notify("Data updated", NotificationKind::Success);
//! center.dismiss(id);
//! # }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;
use crate::dispatch::{Dispatcher, Intent};

/// Registry id of a notification. Ids grow monotonically in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "toast-{}", self.0)
    }
}

/// Visual category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Neutral progress information.
    Info,
    /// An operation completed.
    Success,
    /// Attention needed, nothing failed yet.
    Warning,
    /// An operation failed.
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One entry in the notification registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Registry id.
    pub id: NotificationId,
    /// Message body.
    pub message: String,
    /// Visual category.
    pub kind: NotificationKind,
    /// Creation instant.
    pub created_at: Instant,
    /// Auto-dismiss delay; `Duration::ZERO` means sticky.
    pub duration: Duration,
    /// Enter transition has been applied.
    pub visible: bool,
    /// Exit transition is in progress; removal is scheduled.
    pub dismissing: bool,
}

impl Notification {
    /// Whether this notification stays until dismissed manually.
    pub fn is_sticky(&self) -> bool {
        self.duration.is_zero()
    }
}

struct Inner {
    entries: Mutex<Vec<Notification>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    dispatcher: Dispatcher,
    config: NotificationConfig,
}

impl Inner {
    fn reveal(&self, id: NotificationId) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.iter_mut().find(|n| n.id == id) {
            if entry.dismissing || entry.visible {
                return;
            }
            entry.visible = true;
            self.dispatcher.emit(Intent::ShowNotification { id });
        }
    }

    fn dismiss(self: &Arc<Self>, id: NotificationId) -> bool {
        {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.iter_mut().find(|n| n.id == id) else {
                return false;
            };
            if entry.dismissing {
                return false;
            }
            entry.dismissing = true;
            entry.visible = false;
            self.dispatcher.emit(Intent::HideNotification { id });
        }
        debug!(id = %id, "notification dismissing");

        let inner = Arc::clone(self);
        let exit = self.config.exit();
        tokio::spawn(async move {
            tokio::time::sleep(exit).await;
            inner.remove(id);
        });
        true
    }

    fn remove(&self, id: NotificationId) {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|n| n.id != id);
        if entries.len() < before {
            self.dispatcher.emit(Intent::RemoveNotification { id });
            debug!(id = %id, remaining = entries.len(), "notification removed");
        }
    }
}

/// Stacking, auto-expiring toast registry.
///
/// Cloning is cheap and every clone shares the same registry, so one centre
/// can be handed to every console feature.
///
/// All operations that start timers must be called from within a Tokio
/// runtime.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

impl NotificationCenter {
    /// Create an empty centre writing to `dispatcher`.
    pub fn new(config: NotificationConfig, dispatcher: Dispatcher) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                dispatcher,
                config,
            }),
        }
    }

    /// Show `message` for the configured default duration.
    pub fn notify(&self, message: impl Into<String>, kind: NotificationKind) -> NotificationId {
        self.notify_for(message, kind, self.inner.config.default_duration())
    }

    /// Show an error notification for the default duration.
    pub fn error(&self, message: impl Into<String>) -> NotificationId {
        self.notify(message, NotificationKind::Error)
    }

    /// Show `message` and auto-dismiss it after `duration`.
    ///
    /// `Duration::ZERO` keeps the notification until [`dismiss`](Self::dismiss)
    /// is called. When de-duplication is enabled and an identical message of
    /// the same kind and duration is still on screen, that entry's id is
    /// returned and nothing new is stacked.
    ///
    /// # Panics
    ///
    /// This function never panics; a missing stacking container is logged.
    pub fn notify_for(
        &self,
        message: impl Into<String>,
        kind: NotificationKind,
        duration: Duration,
    ) -> NotificationId {
        let message = message.into();

        let id = {
            let mut entries = self.inner.entries.lock();
            if self.inner.config.dedupe {
                if let Some(existing) = entries
                    .iter()
                    .find(|n| {
                        !n.dismissing
                            && n.kind == kind
                            && n.duration == duration
                            && n.message == message
                    })
                {
                    debug!(id = %existing.id, kind = %kind, "duplicate notification collapsed");
                    return existing.id;
                }
            }

            let id = NotificationId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
            if self.inner.closed.load(Ordering::Acquire) {
                warn!(id = %id, "notification centre closed, message dropped");
                return id;
            }

            entries.push(Notification {
                id,
                message: message.clone(),
                kind,
                created_at: Instant::now(),
                duration,
                visible: false,
                dismissing: false,
            });
            self.inner.dispatcher.emit(Intent::InsertNotification {
                id,
                kind,
                message: message.clone(),
            });
            id
        };

        info!(
            id = %id,
            kind = %kind,
            duration_ms = duration.as_millis() as u64,
            message = %message,
            "notification shown"
        );

        let inner = Arc::clone(&self.inner);
        let enter = self.inner.config.enter_delay();
        tokio::spawn(async move {
            if enter.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(enter).await;
            }
            inner.reveal(id);
        });

        if !duration.is_zero() {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                inner.dismiss(id);
            });
        }

        id
    }

    /// Start the exit transition of `id` and remove it after the exit delay.
    ///
    /// Returns `false` if `id` is unknown or already dismissing.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        self.inner.dismiss(id)
    }

    /// Snapshot of the registry in display order.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.inner.entries.lock().clone()
    }

    /// Registry entry for `id`, if still present.
    pub fn get(&self, id: NotificationId) -> Option<Notification> {
        self.inner.entries.lock().iter().find(|n| n.id == id).cloned()
    }

    /// Whether `id` is still in the registry.
    pub fn contains(&self, id: NotificationId) -> bool {
        self.inner.entries.lock().iter().any(|n| n.id == id)
    }

    /// Number of registered notifications, including dismissing ones.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every notification and refuse new ones (page unload).
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let mut entries = self.inner.entries.lock();
        for entry in entries.drain(..) {
            self.inner
                .dispatcher
                .emit(Intent::RemoveNotification { id: entry.id });
        }
        debug!("notification centre shut down");
    }
}
