//! End-to-end tests of the event pipeline: queue -> loop -> dispatcher ->
//! handlers -> use cases, over SQLite and mock collaborators.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use autoreply::adapters::mock::MockLlmClient;
use autoreply::application::Worker;
use autoreply::domain::errors::DomainResult;
use autoreply::domain::models::{Config, Event, EventType, Judgment, Scope, SchedulingMode};
use autoreply::services::{
    AutonomousCheckHandler, AutonomousResponseConfig, AutonomousResponseService, EventDispatcher, EventHandler,
    EventLoop, EventLoopConfig, EventQueue,
};

use common::{incoming, wait_for, TestEnv, BOT_USER_ID};

fn quiet_config() -> Config {
    let mut config = Config::default();
    config.mode = SchedulingMode::Events;
    config.agent.bot_user_id = BOT_USER_ID.to_string();
    // Timers off: only inbound messages drive the pipeline.
    config.scheduler.check_interval_secs = 0;
    config.scheduler.summary_interval_secs = 0;
    config.scheduler.channel_sync_interval_secs = 0;
    config.event_loop.dequeue_timeout_ms = 50;
    config
}

#[tokio::test]
async fn test_inbound_message_is_judged_and_answered_in_thread() {
    common::setup_test_logging();
    let env = TestEnv::new(
        MockLlmClient::new()
            .with_judgment(Judgment::new(true, "direct question", 0.92))
            .with_reply("The deploy finished at 14:05."),
    )
    .await;
    env.add_channel("C1").await;

    let worker = Arc::new(
        Worker::new(quiet_config(), env.pool.clone(), env.messaging.clone(), env.llm.clone())
            .await
            .with_shutdown_grace(Duration::from_secs(5)),
    );
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = {
        let worker = worker.clone();
        tokio::spawn(async move {
            worker
                .run_until(async {
                    let _ = stop_rx.await;
                })
                .await
        })
    };

    let message = incoming("C1", Some("1700000000.000100"), "U1", "did the deploy finish?");
    assert!(worker.enqueue_message(message).await.unwrap());

    let llm = env.llm.clone();
    assert!(wait_for(move || llm.generate_count() == 1, 3_000).await);

    let mut sent = Vec::new();
    for _ in 0..100 {
        sent = env.messaging.sent().await;
        if !sent.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].channel_id, "C1");
    assert_eq!(sent[0].thread_ts.as_deref(), Some("1700000000.000100"));
    assert_eq!(sent[0].text, "The deploy finished at 14:05.");

    let scope = Scope::new("C1", Some("1700000000.000100".to_string()));
    let cached = env.repos.judgments.find(&scope).await.unwrap().unwrap();
    assert!(cached.should_respond);

    // The reply is recorded as the bot's own message in the scope.
    let latest = env.repos.messages.latest_in_scope(&scope).await.unwrap().unwrap();
    assert_eq!(latest.user_id, BOT_USER_ID);

    stop_tx.send(()).unwrap();
    assert!(running.await.unwrap());
}

#[tokio::test]
async fn test_malformed_message_event_does_not_stop_the_loop() {
    let env = TestEnv::new(MockLlmClient::new()).await;
    env.add_channel("C1").await;

    let queue = Arc::new(EventQueue::new());
    let dispatcher = Arc::new(EventDispatcher::new());
    let responder = Arc::new(AutonomousResponseService::new(
        env.repos.clone(),
        env.messaging.clone(),
        env.llm.clone(),
        AutonomousResponseConfig::from_config(&quiet_config()),
    ));
    dispatcher
        .register(EventType::AutonomousCheck, Arc::new(AutonomousCheckHandler::new(responder)))
        .await;

    struct Rejecting(Arc<AtomicU32>);

    #[async_trait]
    impl EventHandler for Rejecting {
        fn name(&self) -> &str {
            "rejecting"
        }

        async fn handle(&self, event: &Event) -> DomainResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            event.parse_payload::<autoreply::domain::models::IncomingMessage>().map(|_| ())
        }
    }
    let rejected = Arc::new(AtomicU32::new(0));
    dispatcher
        .register(EventType::Message, Arc::new(Rejecting(rejected.clone())))
        .await;

    let event_loop = Arc::new(EventLoop::new(
        queue.clone(),
        dispatcher,
        EventLoopConfig {
            dequeue_timeout: Duration::from_millis(50),
        },
    ));
    let handle = event_loop.spawn();

    queue.enqueue(Event::new(EventType::Message, serde_json::Map::new())).await;
    queue.enqueue(Event::workspace(EventType::AutonomousCheck, "workspace")).await;

    let observed = event_loop.clone();
    assert!(wait_for(move || observed.processed_count() == 2, 3_000).await);
    assert_eq!(rejected.load(Ordering::SeqCst), 1);
    assert!(event_loop.is_running());

    event_loop.stop().await;
    handle.await.unwrap();
    assert!(!event_loop.is_running());
}

#[tokio::test]
async fn test_timer_events_drive_channel_sync_and_checks() {
    let env = TestEnv::new(MockLlmClient::new()).await;
    env.messaging
        .set_channels(vec![autoreply::domain::models::ChannelInfo {
            id: "C9".to_string(),
            name: "ops".to_string(),
            is_member: true,
        }])
        .await;

    let mut config = quiet_config();
    config.scheduler.channel_sync_interval_secs = 3_600;
    config.scheduler.check_interval_secs = 3_600;
    let worker = Arc::new(
        Worker::new(config, env.pool.clone(), env.messaging.clone(), env.llm.clone())
            .await
            .with_shutdown_grace(Duration::from_secs(5)),
    );
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = {
        let worker = worker.clone();
        tokio::spawn(async move {
            worker
                .run_until(async {
                    let _ = stop_rx.await;
                })
                .await
        })
    };

    let mut synced = false;
    for _ in 0..300 {
        if env.repos.channels.find("C9").await.unwrap().is_some() {
            synced = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(synced);

    stop_tx.send(()).unwrap();
    assert!(running.await.unwrap());
}
