//! Last-resort error reporting.
//!
//! Producers and actions report their own failures with specific messages.
//! Anything that slips past them (a scheduled callback returning `Err`, a
//! spawned task panicking) ends up here and is shown as a generic error toast
//! so it never disappears silently or takes the console down.

use tokio::task::JoinError;

use crate::notification::{NotificationCenter, NotificationKind};
use crate::OrchestratorError;

/// Generic message shown for failures without a more specific handler.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred.";

/// Converts stray failures into generic error notifications.
#[derive(Clone)]
pub struct FallbackHandler {
    notifications: NotificationCenter,
    message: String,
}

impl FallbackHandler {
    /// Report through `notifications` using [`GENERIC_ERROR_MESSAGE`].
    pub fn new(notifications: NotificationCenter) -> Self {
        Self {
            notifications,
            message: GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    /// Override the user-visible message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Log `error` against `context` and raise a generic error toast.
    pub fn report(&self, context: &str, error: &OrchestratorError) {
        tracing::error!(context = context, error = %error, kind = error.kind(), "unhandled error");
        self.notifications
            .notify(self.message.clone(), NotificationKind::Error);
    }

    /// Report a failed join of a spawned task. Cancelled tasks are ignored.
    pub fn report_join(&self, context: &str, error: JoinError) {
        if error.is_cancelled() {
            tracing::debug!(context = context, "task cancelled");
            return;
        }
        self.report(context, &OrchestratorError::TaskPanicked(context.to_string()));
    }
}
