//! Time-based event scheduler.
//!
//! Fires workspace-scoped events into the [`EventQueue`] on three independent
//! interval timers (autonomous check, summary, channel sync). A single poll
//! loop drives all timers; each timer's fire time drifts by up to one poll
//! tick, and missed fires are not caught up.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::models::{Event, EventType, SchedulerSettings};
use crate::services::event_queue::EventQueue;
use crate::services::lifecycle::Lifecycle;

/// Configuration for the EventScheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Workspace id carried in every fired event.
    pub workspace_id: String,
    /// A zero interval disables that timer.
    pub check_interval: Duration,
    /// Interval of the SUMMARY timer.
    pub summary_interval: Duration,
    /// Interval of the CHANNEL_SYNC timer.
    pub channel_sync_interval: Duration,
    /// Finest allowed poll tick.
    pub min_poll_interval: Duration,
    /// Coarsest allowed poll tick.
    pub max_poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from_settings(&SchedulerSettings::default(), crate::domain::models::WORKSPACE_SCOPE)
    }
}

impl SchedulerConfig {
    /// Convert config settings into durations.
    pub fn from_settings(settings: &SchedulerSettings, workspace_id: &str) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            check_interval: Duration::from_secs(settings.check_interval_secs),
            summary_interval: Duration::from_secs(settings.summary_interval_secs),
            channel_sync_interval: Duration::from_secs(settings.channel_sync_interval_secs),
            min_poll_interval: Duration::from_millis(settings.min_poll_interval_ms),
            max_poll_interval: Duration::from_millis(settings.max_poll_interval_ms),
        }
    }

    /// Interval of the timer firing `event_type`, or `None` if it is disabled or not a timer type.
    pub fn interval_for(&self, event_type: EventType) -> Option<Duration> {
        let interval = match event_type {
            EventType::AutonomousCheck => self.check_interval,
            EventType::Summary => self.summary_interval,
            EventType::ChannelSync => self.channel_sync_interval,
            EventType::Message => return None,
        };
        (!interval.is_zero()).then_some(interval)
    }

    /// One tenth of the smallest enabled interval, clamped to the poll bounds.
    pub fn poll_interval(&self) -> Duration {
        let smallest = EventType::TIMER_TYPES
            .iter()
            .filter_map(|t| self.interval_for(*t))
            .min();
        match smallest {
            Some(interval) => (interval / 10)
                .max(self.min_poll_interval)
                .min(self.max_poll_interval),
            None => self.max_poll_interval,
        }
    }
}

#[derive(Debug)]
struct Timer {
    event_type: EventType,
    interval: Duration,
    last_fired: Instant,
}

/// Multi-interval scheduler feeding one queue.
pub struct EventScheduler {
    queue: Arc<EventQueue>,
    config: SchedulerConfig,
    lifecycle: Lifecycle,
    fired: AtomicU64,
}

impl EventScheduler {
    /// Scheduler feeding `queue`, initially stopped.
    pub fn new(queue: Arc<EventQueue>, config: SchedulerConfig) -> Self {
        Self {
            queue,
            config,
            lifecycle: Lifecycle::new(),
            fired: AtomicU64::new(0),
        }
    }

    /// Timer settings in use.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Fire every enabled timer once, then poll until [`EventScheduler::stop`].
    ///
    /// Returns immediately if already running.
    pub async fn start(&self) {
        let Some(guard) = self.lifecycle.begin() else {
            tracing::warn!("event scheduler already running, ignoring start");
            return;
        };

        let poll_interval = self.config.poll_interval();
        let mut timers: Vec<Timer> = Vec::new();
        for event_type in EventType::TIMER_TYPES {
            match self.config.interval_for(event_type) {
                Some(interval) => {
                    self.fire(event_type).await;
                    timers.push(Timer {
                        event_type,
                        interval,
                        last_fired: Instant::now(),
                    });
                }
                None => tracing::info!(event_type = %event_type, "timer disabled"),
            }
        }
        tracing::info!(
            timers = timers.len(),
            poll_interval_ms = poll_interval.as_millis() as u64,
            "event scheduler started"
        );

        while guard.is_active() {
            if guard.wait_for_stop(poll_interval).await {
                break;
            }
            let now = Instant::now();
            for timer in timers.iter_mut() {
                if now.duration_since(timer.last_fired) >= timer.interval {
                    self.fire(timer.event_type).await;
                    timer.last_fired = now;
                }
            }
        }

        tracing::info!(fired = self.fired_count(), "event scheduler stopped");
    }

    /// Spawn [`EventScheduler::start`] on the runtime.
    pub fn spawn(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.start().await })
    }

    /// Request the poll loop to exit. Does not wait for it.
    pub fn stop(&self) {
        if self.lifecycle.request_stop() {
            tracing::info!("event scheduler stop requested");
        }
    }

    /// True while the poll loop runs.
    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Timer fires since creation, including ones coalesced by the queue.
    pub fn fired_count(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    async fn fire(&self, event_type: EventType) {
        let admitted = self
            .queue
            .enqueue(Event::workspace(event_type, &self.config.workspace_id))
            .await;
        self.fired.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(event_type = %event_type, admitted, "timer fired");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::WORKSPACE_SCOPE;

    fn config(check: Duration, summary: Duration, sync: Duration) -> SchedulerConfig {
        SchedulerConfig {
            workspace_id: WORKSPACE_SCOPE.to_string(),
            check_interval: check,
            summary_interval: summary,
            channel_sync_interval: sync,
            min_poll_interval: Duration::from_millis(5),
            max_poll_interval: Duration::from_secs(1),
        }
    }

    const HOUR: Duration = Duration::from_secs(3600);

    async fn drain(queue: &EventQueue) -> Vec<EventType> {
        let mut types = Vec::new();
        while let Some(mut entry) = queue.try_dequeue().await {
            queue.mark_processing(&mut entry).await;
            queue.mark_done(&mut entry).await;
            types.push(entry.event.event_type);
        }
        types
    }

    #[test]
    fn test_poll_interval_is_tenth_of_smallest() {
        let cfg = config(Duration::from_secs(5), HOUR, HOUR);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_poll_interval_clamped() {
        let fine = config(Duration::from_millis(20), HOUR, HOUR);
        assert_eq!(fine.poll_interval(), Duration::from_millis(5));

        let coarse = config(HOUR, HOUR, HOUR);
        assert_eq!(coarse.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_interval_disables_timer() {
        let cfg = config(Duration::ZERO, HOUR, HOUR);
        assert_eq!(cfg.interval_for(EventType::AutonomousCheck), None);
        assert_eq!(cfg.interval_for(EventType::Summary), Some(HOUR));
        assert_eq!(cfg.interval_for(EventType::Message), None);
    }

    #[test]
    fn test_from_settings_defaults() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.check_interval, Duration::from_secs(300));
        assert_eq!(cfg.min_poll_interval, Duration::from_millis(10));
        assert_eq!(cfg.max_poll_interval, Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_start_fires_each_type_once_immediately() {
        let queue = Arc::new(EventQueue::new());
        let scheduler = Arc::new(EventScheduler::new(queue.clone(), config(HOUR, HOUR, HOUR)));
        let handle = scheduler.spawn();

        for _ in 0..200 {
            if queue.len().await == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let mut fired = drain(&queue).await;
        fired.sort_by_key(|t| t.as_str());
        let mut expected = EventType::TIMER_TYPES.to_vec();
        expected.sort_by_key(|t| t.as_str());
        assert_eq!(fired, expected);
        assert_eq!(scheduler.fired_count(), 3);

        scheduler.stop();
        handle.await.unwrap();
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_second_start_returns_promptly() {
        let queue = Arc::new(EventQueue::new());
        let scheduler = Arc::new(EventScheduler::new(queue.clone(), config(HOUR, HOUR, HOUR)));
        let handle = scheduler.spawn();
        while !scheduler.is_running() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        tokio::time::timeout(Duration::from_secs(1), scheduler.start())
            .await
            .expect("second start must not block");

        scheduler.stop();
        handle.await.unwrap();
        // Only the first run fired its immediate events.
        assert_eq!(queue.admitted_count(), 3);
    }

    #[tokio::test]
    async fn test_short_interval_fires_repeatedly() {
        let queue = Arc::new(EventQueue::new());
        let scheduler = Arc::new(EventScheduler::new(
            queue.clone(),
            config(Duration::from_millis(40), HOUR, HOUR),
        ));
        let handle = scheduler.spawn();

        tokio::time::sleep(Duration::from_millis(20)).await;
        drain(&queue).await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        let refired = drain(&queue).await;
        assert_eq!(refired, vec![EventType::AutonomousCheck]);

        scheduler.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_fires_into_busy_key_are_coalesced() {
        let queue = Arc::new(EventQueue::new());
        let scheduler = Arc::new(EventScheduler::new(
            queue.clone(),
            config(Duration::from_millis(20), HOUR, HOUR),
        ));
        let handle = scheduler.spawn();

        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.stop();
        handle.await.unwrap();

        assert_eq!(queue.len().await, 3);
        assert!(queue.dropped_count() >= 1);
        assert!(scheduler.fired_count() > 3);
    }

    #[tokio::test]
    async fn test_stop_is_prompt() {
        let queue = Arc::new(EventQueue::new());
        let mut cfg = config(HOUR, HOUR, HOUR);
        cfg.max_poll_interval = Duration::from_secs(60);
        cfg.min_poll_interval = Duration::from_secs(60);
        let scheduler = Arc::new(EventScheduler::new(queue, cfg));
        let handle = scheduler.spawn();
        while !scheduler.is_running() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        scheduler.stop();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler should notice stop without waiting a full tick")
            .unwrap();
    }
}
