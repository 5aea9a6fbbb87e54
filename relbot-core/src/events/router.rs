//! Event type → handler table

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info_span, Instrument};

use super::handlers::{CreateHandler, PullRequestHandler, PushHandler, ReviewHandler};
use super::{EventHandler, Outcome};
use crate::bootstrap::AppContext;
use crate::Result;

/// Dispatches each delivery to the handler registered for its event type
#[derive(Clone, Default)]
pub struct EventRouter {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("events", &self.event_types())
            .finish()
    }
}

impl EventRouter {
    /// An empty router; every event is ignored
    pub fn new() -> Self {
        Self::default()
    }

    /// The router relbot serves: push, create, pull_request, pull_request_review
    pub fn standard() -> Self {
        Self::new()
            .route("push", PushHandler)
            .route("create", CreateHandler)
            .route("pull_request", PullRequestHandler)
            .route("pull_request_review", ReviewHandler)
    }

    /// Register `handler` for `event_type`, replacing any previous one
    pub fn route(mut self, event_type: impl Into<String>, handler: impl EventHandler + 'static) -> Self {
        self.handlers.insert(event_type.into(), Arc::new(handler));
        self
    }

    /// Registered event types, sorted
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Whether a handler is registered for `event_type`
    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Run the handler for `event_type`
    ///
    /// Unregistered event types are accepted and ignored.
    pub async fn dispatch(
        &self,
        ctx: &AppContext,
        event_type: &str,
        delivery: Option<&str>,
        payload: &Value,
    ) -> Result<Outcome> {
        let Some(handler) = self.handlers.get(event_type) else {
            debug!(event = %event_type, "No handler registered, ignoring");
            return Ok(Outcome::ignored(format!("no handler for {}", event_type)));
        };

        let span = info_span!("event", event = %event_type, delivery = delivery.unwrap_or("-"));
        handler.handle(ctx, payload).instrument(span).await
    }
}
