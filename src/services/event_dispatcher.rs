//! Event-type to handler routing.
//!
//! Handlers are registered explicitly per [`EventType`] and invoked
//! sequentially in registration order. A failing or panicking handler is
//! logged and does not prevent the remaining handlers from running.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Event, EventType};

/// Trait for pipeline event handlers.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Process one event.
    async fn handle(&self, event: &Event) -> DomainResult<()>;
}

/// Outcome of dispatching one event.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers invoked.
    pub invoked: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

impl DispatchReport {
    /// Handlers that completed without error.
    pub fn succeeded(&self) -> usize {
        self.invoked - self.failed
    }
}

/// Routes events to every handler registered for their type.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: RwLock<HashMap<EventType, Vec<Arc<dyn EventHandler>>>>,
}

impl EventDispatcher {
    /// Dispatcher with no handlers registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `event_type`.
    pub async fn register(&self, event_type: EventType, handler: Arc<dyn EventHandler>) {
        tracing::debug!(event_type = %event_type, handler = handler.name(), "registering handler");
        self.handlers
            .write()
            .await
            .entry(event_type)
            .or_default()
            .push(handler);
    }

    /// Number of handlers registered for `event_type`.
    pub async fn handler_count(&self, event_type: EventType) -> usize {
        self.handlers
            .read()
            .await
            .get(&event_type)
            .map_or(0, Vec::len)
    }

    /// Invoke every handler registered for the event's type, in order.
    pub async fn dispatch(&self, event: &Event) -> DispatchReport {
        // Snapshot so registration is never blocked by a slow handler.
        let handlers = self
            .handlers
            .read()
            .await
            .get(&event.event_type)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            tracing::warn!(
                event_type = %event.event_type,
                event_id = %event.id,
                "no handlers registered for event"
            );
            return DispatchReport::default();
        }

        let mut report = DispatchReport::default();
        for handler in handlers {
            report.invoked += 1;
            let outcome = AssertUnwindSafe(handler.handle(event)).catch_unwind().await;
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(_) => DomainError::HandlerPanicked(handler.name().to_string()),
            };
            report.failed += 1;
            tracing::error!(
                handler = handler.name(),
                event_type = %event.event_type,
                event_id = %event.id,
                error = %error,
                "event handler failed"
            );
        }
        report
    }
}
