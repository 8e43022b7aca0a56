//! Single-consumer event loop.
//!
//! Drains the [`EventQueue`] one entry at a time and hands each event to the
//! [`EventDispatcher`]. The loop owns the `Processing -> Done` transitions so
//! the queue can re-admit a key as soon as its previous event is finished.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::Instrument;

use crate::domain::models::{EventLoopSettings, QueueEntry};
use crate::services::event_dispatcher::EventDispatcher;
use crate::services::event_queue::EventQueue;
use crate::services::lifecycle::Lifecycle;

/// Configuration for the EventLoop.
#[derive(Debug, Clone)]
pub struct EventLoopConfig {
    /// Upper bound on one idle wait before the stop signal is re-checked.
    pub dequeue_timeout: Duration,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            dequeue_timeout: Duration::from_secs(1),
        }
    }
}

impl From<&EventLoopSettings> for EventLoopConfig {
    fn from(settings: &EventLoopSettings) -> Self {
        Self {
            dequeue_timeout: Duration::from_millis(settings.dequeue_timeout_ms.max(1)),
        }
    }
}

/// Drains the queue serially and dispatches each event.
pub struct EventLoop {
    queue: Arc<EventQueue>,
    dispatcher: Arc<EventDispatcher>,
    config: EventLoopConfig,
    lifecycle: Lifecycle,
    processed: AtomicU64,
}

impl EventLoop {
    /// Loop draining `queue` into `dispatcher`, initially stopped.
    pub fn new(queue: Arc<EventQueue>, dispatcher: Arc<EventDispatcher>, config: EventLoopConfig) -> Self {
        Self {
            queue,
            dispatcher,
            config,
            lifecycle: Lifecycle::new(),
            processed: AtomicU64::new(0),
        }
    }

    /// Run the loop until [`EventLoop::stop`] is called.
    ///
    /// Returns immediately if the loop is already running. Await this future
    /// (or the task spawned by [`EventLoop::spawn`]) to know the loop exited.
    pub async fn start(&self) {
        let Some(guard) = self.lifecycle.begin() else {
            tracing::warn!("event loop already running, ignoring start");
            return;
        };
        tracing::info!(
            dequeue_timeout_ms = self.config.dequeue_timeout.as_millis() as u64,
            "event loop started"
        );

        while guard.is_active() {
            let next = tokio::select! {
                entry = self.queue.dequeue() => Some(entry),
                _ = guard.wait_for_stop(self.config.dequeue_timeout) => None,
            };
            if let Some(mut entry) = next {
                self.process(&mut entry).await;
            }
        }

        tracing::info!(processed = self.processed_count(), "event loop stopped");
    }

    /// Spawn [`EventLoop::start`] on the runtime.
    pub fn spawn(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.start().await })
    }

    /// Request the loop to exit after its current event and discard every
    /// pending entry. Does not wait for the loop to exit.
    pub async fn stop(&self) {
        if self.lifecycle.request_stop() {
            tracing::info!("event loop stop requested");
        }
        let discarded = self.queue.clear().await;
        if discarded > 0 {
            tracing::warn!(discarded, "discarded pending events on shutdown");
        }
    }

    /// True while a consumer owns the loop.
    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Events fully processed since creation.
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    async fn process(&self, entry: &mut QueueEntry) {
        self.queue.mark_processing(entry).await;

        let span = tracing::info_span!(
            "event",
            event_type = %entry.event.event_type,
            event_id = %entry.event.id,
            identity_key = %entry.key,
        );
        let dispatched = AssertUnwindSafe(self.dispatcher.dispatch(&entry.event))
            .catch_unwind()
            .instrument(span)
            .await;
        match dispatched {
            Ok(report) if report.failed > 0 => tracing::warn!(
                identity_key = %entry.key,
                invoked = report.invoked,
                failed = report.failed,
                "event processed with handler failures"
            ),
            Ok(report) => tracing::debug!(
                identity_key = %entry.key,
                invoked = report.invoked,
                "event processed"
            ),
            Err(_) => tracing::error!(identity_key = %entry.key, "event dispatch panicked"),
        }

        self.queue.mark_done(entry).await;
        self.processed.fetch_add(1, Ordering::Relaxed);
    }
}
