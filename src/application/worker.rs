//! Worker composition root.
//!
//! Builds the event pipeline and the standalone periodic loops over one set
//! of repositories and collaborators, then owns their start/stop lifecycle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::adapters::anthropic::AnthropicClient;
use crate::adapters::slack::SlackClient;
use crate::adapters::sqlite::{initialize_database, sqlite_repositories};
use crate::domain::errors::DomainResult;
use crate::domain::models::{Config, Event, EventType, IncomingMessage};
use crate::domain::ports::{LlmClient, MessagingClient, Repositories};
use crate::services::{
    AutonomousCheckHandler, AutonomousResponseConfig, AutonomousResponseService, BackgroundMemoryGenerator,
    ChannelSyncHandler, ChannelSyncService, EventDispatcher, EventLoop, EventLoopConfig, EventQueue, EventScheduler,
    HealthReport, MemorySummaryConfig, MemorySummaryService, MessageHandler, MessageIntakeService, PeriodicChecker,
    SchedulerConfig, SummaryHandler,
};

/// How long `run_until` waits for loops to finish after requesting stop.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

const STOP_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// The assembled worker.
pub struct Worker {
    config: Config,
    pool: SqlitePool,
    repos: Repositories,
    queue: Arc<EventQueue>,
    event_loop: Arc<EventLoop>,
    scheduler: Arc<EventScheduler>,
    checker: PeriodicChecker,
    memory_generator: BackgroundMemoryGenerator,
    responder: Arc<AutonomousResponseService>,
    summarizer: Arc<MemorySummaryService>,
    channel_sync: Arc<ChannelSyncService>,
    intake: Arc<MessageIntakeService>,
    shutdown_grace: Duration,
}

impl Worker {
    /// Open the database and build the Slack and Anthropic clients from config.
    pub async fn from_config(config: Config) -> Result<Self> {
        let pool = initialize_database(&config.database)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;
        let messaging: Arc<dyn MessagingClient> =
            Arc::new(SlackClient::new(&config.slack).context("Failed to build Slack client")?);
        let llm: Arc<dyn LlmClient> =
            Arc::new(AnthropicClient::new(&config.llm).context("Failed to build Anthropic client")?);
        Ok(Self::new(config, pool, messaging, llm).await)
    }

    /// Wire every component over an already-migrated pool.
    pub async fn new(
        config: Config,
        pool: SqlitePool,
        messaging: Arc<dyn MessagingClient>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        let repos = sqlite_repositories(&pool);

        let responder = Arc::new(AutonomousResponseService::new(
            repos.clone(),
            messaging.clone(),
            llm.clone(),
            AutonomousResponseConfig::from_config(&config),
        ));
        let summarizer = Arc::new(MemorySummaryService::new(
            repos.clone(),
            llm,
            MemorySummaryConfig::from_config(&config),
        ));
        let channel_sync = Arc::new(ChannelSyncService::new(repos.clone(), messaging));
        let intake = Arc::new(MessageIntakeService::new(
            repos.clone(),
            responder.clone(),
            config.agent.bot_user_id.clone(),
        ));

        let dispatcher = Arc::new(EventDispatcher::new());
        dispatcher
            .register(EventType::AutonomousCheck, Arc::new(AutonomousCheckHandler::new(responder.clone())))
            .await;
        dispatcher
            .register(EventType::Summary, Arc::new(SummaryHandler::new(summarizer.clone())))
            .await;
        dispatcher
            .register(EventType::ChannelSync, Arc::new(ChannelSyncHandler::new(channel_sync.clone())))
            .await;
        dispatcher
            .register(EventType::Message, Arc::new(MessageHandler::new(intake.clone())))
            .await;

        let queue = Arc::new(EventQueue::new());
        let event_loop = Arc::new(EventLoop::new(
            queue.clone(),
            dispatcher,
            EventLoopConfig::from(&config.event_loop),
        ));
        let scheduler = Arc::new(EventScheduler::new(
            queue.clone(),
            SchedulerConfig::from_settings(&config.scheduler, &config.workspace_id),
        ));
        let checker = PeriodicChecker::new(responder.clone(), config.periodic.check_interval());
        let memory_generator = BackgroundMemoryGenerator::new(summarizer.clone(), config.periodic.memory_interval());

        Self {
            config,
            pool,
            repos,
            queue,
            event_loop,
            scheduler,
            checker,
            memory_generator,
            responder,
            summarizer,
            channel_sync,
            intake,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Override how long shutdown waits for loops to exit.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Repositories over the worker's pool.
    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    /// Autonomous response use case shared by the event and periodic paths.
    pub fn responder(&self) -> &Arc<AutonomousResponseService> {
        &self.responder
    }

    /// Memory summary use case.
    pub fn summarizer(&self) -> &Arc<MemorySummaryService> {
        &self.summarizer
    }

    /// Channel sync use case.
    pub fn channel_sync(&self) -> &Arc<ChannelSyncService> {
        &self.channel_sync
    }

    /// Hand an inbound chat message to the pipeline.
    ///
    /// The message is stored right away and a MESSAGE event is enqueued for
    /// its scope. Returns false when a check for that scope is already
    /// pending; the stored message is picked up by that check.
    pub async fn enqueue_message(&self, message: IncomingMessage) -> DomainResult<bool> {
        self.intake.record(&message).await?;
        let event = Event::message(&message)?;
        Ok(self.queue.enqueue(event).await)
    }

    /// Current liveness of every loop plus queue depth.
    pub async fn health(&self) -> HealthReport {
        HealthReport {
            mode: self.config.mode,
            event_loop_running: self.event_loop.is_running(),
            scheduler_running: self.scheduler.is_running(),
            checker_running: self.checker.is_running(),
            memory_generator_running: self.memory_generator.is_running(),
            queue_depth: self.queue.len().await,
        }
    }

    /// Start the loops the scheduling mode selects, run until `shutdown`
    /// resolves, then stop everything and close the pool.
    ///
    /// Returns true when every loop finished inside the grace period.
    pub async fn run_until<F>(&self, shutdown: F) -> bool
    where
        F: Future<Output = ()>,
    {
        let mode = self.config.mode;
        let mut handles: Vec<(&'static str, JoinHandle<()>)> = Vec::new();
        if mode.uses_events() {
            handles.push(("event-loop", self.event_loop.spawn()));
            handles.push(("event-scheduler", self.scheduler.spawn()));
        }
        if mode.uses_periodic() {
            handles.push(("periodic-checker", self.checker.spawn()));
            handles.push(("memory-generator", self.memory_generator.spawn()));
        }
        info!(mode = ?mode, loops = handles.len(), "worker started");

        shutdown.await;
        info!("shutdown requested");

        self.request_stop_all().await;
        let clean = self.join(handles).await;
        self.pool.close().await;
        info!(clean, "worker stopped");
        clean
    }

    async fn request_stop_all(&self) {
        // Scheduler first so nothing new lands in a queue that is being drained.
        self.scheduler.stop();
        self.checker.stop();
        self.memory_generator.stop();
        self.event_loop.stop().await;
    }

    /// Wait for every loop task, re-issuing stop requests so that a loop whose
    /// task had not begun when shutdown arrived still exits.
    async fn join(&self, handles: Vec<(&'static str, JoinHandle<()>)>) -> bool {
        let aborts: Vec<_> = handles.iter().map(|(_, handle)| handle.abort_handle()).collect();
        let names: Vec<&'static str> = handles.iter().map(|(name, _)| *name).collect();

        let joined = join_all(handles.into_iter().map(|(_, handle)| handle));
        let deadline = tokio::time::sleep(self.shutdown_grace);
        tokio::pin!(joined, deadline);

        loop {
            tokio::select! {
                results = &mut joined => {
                    let mut clean = true;
                    for (name, result) in names.iter().zip(results) {
                        if let Err(e) = result {
                            error!(task = name, error = %e, "loop task ended abnormally");
                            clean = false;
                        }
                    }
                    return clean;
                }
                () = &mut deadline => {
                    warn!(
                        grace_secs = self.shutdown_grace.as_secs(),
                        "loops did not stop within the grace period, aborting"
                    );
                    for abort in aborts {
                        abort.abort();
                    }
                    return false;
                }
                () = tokio::time::sleep(STOP_RETRY_INTERVAL) => self.request_stop_all().await,
            }
        }
    }
}
