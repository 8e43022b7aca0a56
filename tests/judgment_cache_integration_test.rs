//! Judgment cache behaviour across autonomous check passes.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};

use autoreply::adapters::mock::MockLlmClient;
use autoreply::domain::models::{Config, Judgment, JudgmentCache, Message, Scope};
use autoreply::services::{AutonomousResponseConfig, AutonomousResponseService, ScopeOutcome};

use common::{ts_from_now, TestEnv, BOT_USER_ID};

fn service(env: &TestEnv) -> AutonomousResponseService {
    let mut config = Config::default();
    config.agent.bot_user_id = BOT_USER_ID.to_string();
    AutonomousResponseService::new(
        env.repos.clone(),
        env.messaging.clone(),
        env.llm.clone(),
        AutonomousResponseConfig::from_config(&config),
    )
}

async fn post(env: &TestEnv, channel: &str, thread_ts: Option<&str>, user: &str, ts: String) {
    env.repos
        .messages
        .upsert(&Message {
            channel_id: channel.to_string(),
            ts,
            thread_ts: thread_ts.map(str::to_string),
            user_id: user.to_string(),
            text: "status?".to_string(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_second_pass_reuses_cached_judgment() {
    let env = TestEnv::new(MockLlmClient::new()).await;
    env.add_channel("C1").await;
    post(&env, "C1", None, "U1", ts_from_now(-30)).await;
    let service = service(&env);

    let first = service.run_once().await.unwrap();
    assert_eq!(first.judgments, 1);
    assert_eq!(first.cache_hits, 0);

    let second = service.run_once().await.unwrap();
    assert_eq!(second.judgments, 0);
    assert_eq!(second.cache_hits, 1);
    assert_eq!(env.llm.judge_count(), 1);
}

#[tokio::test]
async fn test_new_message_invalidates_cache() {
    let env = TestEnv::new(MockLlmClient::new()).await;
    env.add_channel("C1").await;
    post(&env, "C1", None, "U1", ts_from_now(-30)).await;
    let service = service(&env);
    let scope = Scope::top_level("C1");

    assert!(matches!(
        service.check_scope(&scope).await.unwrap(),
        ScopeOutcome::Judged { should_respond: false, .. }
    ));
    assert_eq!(service.check_scope(&scope).await.unwrap(), ScopeOutcome::CacheHit);

    post(&env, "C1", None, "U2", ts_from_now(-1)).await;
    assert!(matches!(service.check_scope(&scope).await.unwrap(), ScopeOutcome::Judged { .. }));
    assert_eq!(env.llm.judge_count(), 2);
}

#[tokio::test]
async fn test_threads_are_cached_independently() {
    let env = TestEnv::new(MockLlmClient::new()).await;
    env.add_channel("C1").await;
    let parent = ts_from_now(-60);
    post(&env, "C1", None, "U1", parent.clone()).await;
    post(&env, "C1", Some(&parent), "U2", ts_from_now(-10)).await;

    service(&env).run_once().await.unwrap();

    assert!(env.repos.judgments.find(&Scope::top_level("C1")).await.unwrap().is_some());
    assert!(env
        .repos
        .judgments
        .find(&Scope::new("C1", Some(parent)))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_expired_rows_are_swept_and_rejudged() {
    let env = TestEnv::new(MockLlmClient::new().with_judgment(Judgment::new(false, "idle chatter", 0.3))).await;
    env.add_channel("C1").await;
    let latest = ts_from_now(-30);
    post(&env, "C1", None, "U1", latest.clone()).await;

    let long_ago = Utc::now() - Duration::hours(2);
    env.repos
        .judgments
        .upsert(&JudgmentCache::record(
            &Scope::top_level("C1"),
            &Judgment::new(false, "stale", 0.3),
            latest,
            long_ago + Duration::minutes(10),
            long_ago,
        ))
        .await
        .unwrap();

    let report = service(&env).run_once().await.unwrap();
    assert_eq!(report.expired_swept, 1);
    assert_eq!(report.judgments, 1);

    let row = env.repos.judgments.find(&Scope::top_level("C1")).await.unwrap().unwrap();
    assert_eq!(row.reason, "idle chatter");
    // Low confidence falls back to the default 600 second window.
    let window = row.next_check_at - row.created_at;
    assert_eq!(window.num_seconds(), 600);
}

#[tokio::test]
async fn test_scopes_outside_lookback_are_ignored() {
    let env = TestEnv::new(MockLlmClient::new()).await;
    env.add_channel("C1").await;
    post(&env, "C1", None, "U1", ts_from_now(-3 * 86_400)).await;

    let report = service(&env).run_once().await.unwrap();
    assert_eq!(report.scopes_checked, 0);
    assert_eq!(env.llm.judge_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checks_of_one_scope_judge_once() {
    let env = TestEnv::new(MockLlmClient::new().with_judgment(Judgment::new(true, "question asked", 0.9))).await;
    env.llm.set_reply("Deploy is green.").await;
    env.add_channel("C1").await;
    post(&env, "C1", None, "U1", ts_from_now(-5)).await;
    let service = Arc::new(service(&env));
    let scope = Scope::top_level("C1");

    // The periodic pass and an event-driven check race on the same scope.
    let periodic = tokio::spawn({
        let service = service.clone();
        async move { service.run_once().await }
    });
    let event_driven = tokio::spawn({
        let service = service.clone();
        let scope = scope.clone();
        async move { service.check_scope(&scope).await }
    });
    periodic.await.unwrap().unwrap();
    let outcome = event_driven.await.unwrap().unwrap();

    assert!(matches!(
        outcome,
        ScopeOutcome::CacheHit | ScopeOutcome::OwnMessage | ScopeOutcome::Judged { .. }
    ));
    assert_eq!(env.llm.judge_count(), 1);
    assert_eq!(env.messaging.sent().await.len(), 1);
}
