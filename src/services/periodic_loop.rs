//! Wall-clock periodic loops.
//!
//! [`PeriodicLoop`] runs one [`PeriodicTask`] repeatedly: execute once, then
//! sleep until the interval elapses or a stop is requested. A failing or
//! panicking pass is logged and the loop keeps going. [`PeriodicChecker`] and
//! [`BackgroundMemoryGenerator`] are the two concrete loops the worker runs.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;

use crate::domain::errors::{DomainError, DomainResult};
use crate::services::lifecycle::Lifecycle;

/// One unit of periodic work.
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Execute one pass.
    async fn run_once(&self) -> DomainResult<()>;
}

/// Idempotent start/stop loop around a [`PeriodicTask`].
pub struct PeriodicLoop {
    task: Arc<dyn PeriodicTask>,
    interval: Duration,
    lifecycle: Lifecycle,
    iterations: AtomicU64,
    failures: AtomicU64,
}

impl PeriodicLoop {
    /// Loop running `task` every `interval`, initially stopped.
    pub fn new(task: Arc<dyn PeriodicTask>, interval: Duration) -> Self {
        Self {
            task,
            interval,
            lifecycle: Lifecycle::new(),
            iterations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Name of the wrapped task.
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Pause between passes.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until stopped. Returns immediately if already running.
    pub async fn start(&self) {
        let Some(guard) = self.lifecycle.begin() else {
            tracing::warn!(task = self.task.name(), "periodic loop already running, ignoring start");
            return;
        };
        let interval_secs = self.interval.as_secs();
        tracing::info!(task = self.task.name(), interval_secs, "periodic loop started");

        while guard.is_active() {
            let outcome = AssertUnwindSafe(self.task.run_once())
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(DomainError::HandlerPanicked(self.task.name().to_string())));
            if let Err(e) = outcome {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    task = self.task.name(),
                    interval_secs,
                    error = %e,
                    "periodic task failed"
                );
            }
            self.iterations.fetch_add(1, Ordering::Relaxed);

            if guard.wait_for_stop(self.interval).await {
                break;
            }
        }

        tracing::info!(
            task = self.task.name(),
            iterations = self.iteration_count(),
            "periodic loop stopped"
        );
    }

    /// Run [`PeriodicLoop::start`] on a new task.
    pub fn spawn(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.start().await })
    }

    /// Request the loop to exit after the current pass. Does not wait.
    pub fn stop(&self) {
        if self.lifecycle.request_stop() {
            tracing::info!(task = self.task.name(), "periodic loop stop requested");
        }
    }

    /// True between `start` and the loop observing a stop.
    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Passes completed, successful or not.
    pub fn iteration_count(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Passes that returned an error or panicked.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

macro_rules! periodic_loop_wrapper {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name {
            inner: Arc<PeriodicLoop>,
        }

        impl $name {
            /// Loop running `task` every `interval`.
            pub fn new(task: Arc<dyn PeriodicTask>, interval: Duration) -> Self {
                Self {
                    inner: Arc::new(PeriodicLoop::new(task, interval)),
                }
            }

            /// Run until stopped. Returns immediately if already running.
            pub async fn start(&self) {
                self.inner.start().await
            }

            /// Run the loop on a new task.
            pub fn spawn(&self) -> tokio::task::JoinHandle<()> {
                self.inner.spawn()
            }

            /// Request exit after the current pass.
            pub fn stop(&self) {
                self.inner.stop()
            }

            /// True while the loop owns its lifecycle.
            pub fn is_running(&self) -> bool {
                self.inner.is_running()
            }

            /// Passes completed.
            pub fn iteration_count(&self) -> u64 {
                self.inner.iteration_count()
            }
        }
    };
}

periodic_loop_wrapper!(
    /// Runs the autonomous response check on a fixed cadence.
    PeriodicChecker
);

periodic_loop_wrapper!(
    /// Refreshes channel memory summaries on a fixed cadence.
    BackgroundMemoryGenerator
);
