//! Mutation actions
//!
//! Runs a PUT/DELETE against the backend, tells the user how it went, and on
//! success reloads the affected listing with its current page and search.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::notification::{NotificationCenter, NotificationKind};
use crate::refresh::{CycleOutcome, CycleScope, RefreshOrchestrator, Trigger};
use crate::transport::{Method, Transport};
use crate::OrchestratorError;

/// User-visible outcome messages of one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMessages {
    /// Shown as a success toast.
    pub success: String,
    /// Shown as an error toast.
    pub failure: String,
}

impl ActionMessages {
    /// Messages for an action.
    pub fn new(success: impl Into<String>, failure: impl Into<String>) -> Self {
        Self {
            success: success.into(),
            failure: failure.into(),
        }
    }
}

/// Executes mutations and reloads what they touched.
#[derive(Clone)]
pub struct ActionRunner {
    transport: Arc<dyn Transport>,
    notifications: NotificationCenter,
    orchestrator: RefreshOrchestrator,
}

impl ActionRunner {
    /// Runner sending through `transport`.
    pub fn new(
        transport: Arc<dyn Transport>,
        notifications: NotificationCenter,
        orchestrator: RefreshOrchestrator,
    ) -> Self {
        Self {
            transport,
            notifications,
            orchestrator,
        }
    }

    /// Send `method path` with `body`, notify, and on success reload `scope`.
    ///
    /// The reload goes through the orchestrator's busy guard; if a cycle is
    /// already in flight it is skipped.
    ///
    /// # Errors
    ///
    /// Returns the transport error after raising the failure toast.
    pub async fn run(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        messages: &ActionMessages,
        scope: CycleScope,
    ) -> Result<Value, OrchestratorError> {
        match self.transport.request(method, path, body).await {
            Ok(response) => {
                info!(method = %method, path = path, "action succeeded");
                self.notifications
                    .notify(messages.success.clone(), NotificationKind::Success);
                let params = self.orchestrator.current_params();
                if let CycleOutcome::Skipped = self
                    .orchestrator
                    .trigger_cycle(scope, Trigger::Action, params)
                    .await
                {
                    warn!(path = path, "reload after action skipped: refresh in flight");
                }
                Ok(response)
            }
            Err(e) => {
                warn!(method = %method, path = path, error = %e, kind = e.kind(), "action failed");
                self.notifications.error(messages.failure.clone());
                Err(e)
            }
        }
    }

    /// `PUT path` with `body`.
    ///
    /// # Errors
    ///
    /// See [`ActionRunner::run`].
    pub async fn put(
        &self,
        path: &str,
        body: Value,
        messages: &ActionMessages,
        scope: CycleScope,
    ) -> Result<Value, OrchestratorError> {
        self.run(Method::Put, path, Some(body), messages, scope).await
    }

    /// `DELETE path`.
    ///
    /// # Errors
    ///
    /// See [`ActionRunner::run`].
    pub async fn delete(
        &self,
        path: &str,
        messages: &ActionMessages,
        scope: CycleScope,
    ) -> Result<Value, OrchestratorError> {
        self.run(Method::Delete, path, None, messages, scope).await
    }
}
