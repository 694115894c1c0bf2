//! # Dispatch — the boundary between coordination logic and the page
//!
//! ## Responsibility
//! Components never write to the page directly. They describe what should
//! change as an [`Intent`] and hand it to a [`Dispatcher`], which applies it
//! to the configured [`Surface`].
//!
//! ## Guarantees
//! - Non-throwing: a failed surface write is logged and reported as `false`,
//!   never propagated into the caller's flow
//! - Ordered: intents are applied synchronously in emission order
//!
//! ## NOT Responsible For
//! - Rendering tables or charts (caller-supplied render callbacks)
//! - Deciding *when* to emit (scheduler, animator, notification centre)

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::notification::{NotificationId, NotificationKind};
use crate::OrchestratorError;

/// A single requested change to the rendered page.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Replace the text content of a named anchor.
    SetText {
        /// Anchor name (e.g. `"stat.total_users"`).
        anchor: String,
        /// New text content.
        text: String,
    },
    /// Append a toast element to the stacking container (not yet visible).
    InsertNotification {
        /// Registry id of the toast.
        id: NotificationId,
        /// Visual category.
        kind: NotificationKind,
        /// Message body.
        message: String,
    },
    /// Start the enter transition of an inserted toast.
    ShowNotification {
        /// Registry id of the toast.
        id: NotificationId,
    },
    /// Start the exit transition of a toast.
    HideNotification {
        /// Registry id of the toast.
        id: NotificationId,
    },
    /// Remove a toast element from the stacking container.
    RemoveNotification {
        /// Registry id of the toast.
        id: NotificationId,
    },
    /// A refresh cycle started; show the loading indicator.
    LoadingStarted,
    /// A refresh cycle settled; hide the loading indicator.
    LoadingFinished,
}

/// The page, as seen by the orchestrator.
///
/// Implementations translate intents into real DOM/terminal/widget updates.
/// A missing anchor or container must be reported as
/// [`OrchestratorError::Config`] so the dispatcher can degrade gracefully.
pub trait Surface: Send + Sync {
    /// Apply one intent.
    fn apply(&self, intent: &Intent) -> Result<(), OrchestratorError>;

    /// Current text of a named anchor, or `None` if the anchor is absent.
    fn read_text(&self, anchor: &str) -> Option<String>;
}

/// Applies intents to a [`Surface`], swallowing and logging failures.
#[derive(Clone)]
pub struct Dispatcher {
    surface: Arc<dyn Surface>,
}

impl Dispatcher {
    /// Create a dispatcher bound to `surface`.
    pub fn new(surface: Arc<dyn Surface>) -> Self {
        Self { surface }
    }

    /// Apply `intent`. Returns `false` if the surface rejected it.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn emit(&self, intent: Intent) -> bool {
        match self.surface.apply(&intent) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind(), intent = ?intent, "surface rejected intent");
                false
            }
        }
    }

    /// Read the current text of an anchor.
    pub fn read_text(&self, anchor: &str) -> Option<String> {
        self.surface.read_text(anchor)
    }
}

// ============================================================================
// In-memory surface
// ============================================================================

/// Rendered state of a toast on a [`MemorySurface`].
#[derive(Debug, Clone, PartialEq)]
pub struct ToastView {
    /// Registry id.
    pub id: NotificationId,
    /// Visual category.
    pub kind: NotificationKind,
    /// Message body.
    pub message: String,
    /// Enter transition applied.
    pub shown: bool,
    /// Exit transition applied.
    pub leaving: bool,
}

#[derive(Default)]
struct MemoryState {
    texts: HashMap<String, String>,
    anchors: HashSet<String>,
    toasts: Vec<ToastView>,
    loading: bool,
    journal: Vec<Intent>,
}

/// Headless surface that records every intent it accepts.
///
/// Used by the demo binary and throughout the test suite as a stand-in for
/// the real page.
pub struct MemorySurface {
    state: Mutex<MemoryState>,
    stack_container: bool,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySurface {
    /// Surface with a notification stacking container and no anchors.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            stack_container: true,
        }
    }

    /// Surface whose page has no notification stacking container.
    pub fn without_notification_stack() -> Self {
        Self {
            stack_container: false,
            ..Self::new()
        }
    }

    /// Add an anchor with initial text.
    pub fn with_anchor(self, anchor: impl Into<String>, text: impl Into<String>) -> Self {
        {
            let mut state = self.state.lock();
            let anchor = anchor.into();
            state.anchors.insert(anchor.clone());
            state.texts.insert(anchor, text.into());
        }
        self
    }

    /// Current text of `anchor`.
    pub fn text(&self, anchor: &str) -> Option<String> {
        self.state.lock().texts.get(anchor).cloned()
    }

    /// Toasts currently in the stacking container, in display order.
    pub fn toasts(&self) -> Vec<ToastView> {
        self.state.lock().toasts.clone()
    }

    /// Whether the loading indicator is currently shown.
    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    /// Every accepted intent, in order.
    pub fn journal(&self) -> Vec<Intent> {
        self.state.lock().journal.clone()
    }

    /// Texts written to `anchor`, in order.
    pub fn writes_to(&self, anchor: &str) -> Vec<String> {
        self.state
            .lock()
            .journal
            .iter()
            .filter_map(|intent| match intent {
                Intent::SetText { anchor: a, text } if a == anchor => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn toast_mut<'a>(
        toasts: &'a mut [ToastView],
        id: NotificationId,
    ) -> Result<&'a mut ToastView, OrchestratorError> {
        toasts
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| OrchestratorError::Config(format!("no toast element for {id}")))
    }
}

impl Surface for MemorySurface {
    fn apply(&self, intent: &Intent) -> Result<(), OrchestratorError> {
        let mut state = self.state.lock();
        match intent {
            Intent::SetText { anchor, text } => {
                if !state.anchors.contains(anchor) {
                    return Err(OrchestratorError::Config(format!("missing anchor '{anchor}'")));
                }
                state.texts.insert(anchor.clone(), text.clone());
            }
            Intent::InsertNotification { id, kind, message } => {
                if !self.stack_container {
                    return Err(OrchestratorError::Config(
                        "missing notification stacking container".into(),
                    ));
                }
                state.toasts.push(ToastView {
                    id: *id,
                    kind: *kind,
                    message: message.clone(),
                    shown: false,
                    leaving: false,
                });
            }
            Intent::ShowNotification { id } => {
                Self::toast_mut(&mut state.toasts, *id)?.shown = true;
            }
            Intent::HideNotification { id } => {
                let toast = Self::toast_mut(&mut state.toasts, *id)?;
                toast.shown = false;
                toast.leaving = true;
            }
            Intent::RemoveNotification { id } => {
                let before = state.toasts.len();
                state.toasts.retain(|t| t.id != *id);
                if state.toasts.len() == before {
                    return Err(OrchestratorError::Config(format!("no toast element for {id}")));
                }
            }
            Intent::LoadingStarted => state.loading = true,
            Intent::LoadingFinished => state.loading = false,
        }
        state.journal.push(intent.clone());
        Ok(())
    }

    fn read_text(&self, anchor: &str) -> Option<String> {
        self.text(anchor)
    }
}
