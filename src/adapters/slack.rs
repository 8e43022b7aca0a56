//! Slack Web API messaging client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::DefaultDirectRateLimiter;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::adapters::retry::{rate_limiter, RetryPolicy, Retryable};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ChannelInfo, Message, SlackConfig};
use crate::domain::ports::MessagingClient;

/// Largest page Slack serves for list and replies calls.
const PAGE_LIMIT: u32 = 200;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur when talking to the Slack Web API
#[derive(Error, Debug)]
pub enum SlackApiError {
    /// No bot token was configured.
    #[error("Slack bot token is not configured")]
    MissingToken,

    /// HTTP 429 or an `ok: false` response with `ratelimited`
    #[error("Rate limited by Slack")]
    RateLimited { retry_after: Option<Duration> },

    /// Slack reported an internal or temporary error.
    #[error("Slack server error: {0}")]
    Server(String),

    /// An `ok: false` response carrying a Slack error code
    #[error("Slack API error: {0}")]
    Api(String),

    /// Unexpected HTTP status.
    #[error("Unexpected HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    /// Transport failure.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("Malformed Slack response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SlackApiError {
    fn from_status(status: StatusCode, body: String, retry_after: Option<Duration>) -> Self {
        match status.as_u16() {
            429 => Self::RateLimited { retry_after },
            500..=599 => Self::Server(format!("HTTP {status}: {body}")),
            _ => Self::Http { status, body },
        }
    }

    fn from_code(code: &str) -> Self {
        match code {
            "ratelimited" => Self::RateLimited { retry_after: None },
            "internal_error" | "fatal_error" | "service_unavailable" | "request_timeout" => {
                Self::Server(code.to_string())
            }
            _ => Self::Api(code.to_string()),
        }
    }
}

impl Retryable for SlackApiError {
    fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Server(_) => true,
            Self::Network(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<SlackApiError> for DomainError {
    fn from(err: SlackApiError) -> Self {
        DomainError::Messaging(err.to_string())
    }
}

enum SlackRequest {
    Get(Vec<(&'static str, String)>),
    Post(Value),
}

#[derive(Debug, Deserialize)]
struct SlackMessage {
    ts: String,
    #[serde(default)]
    thread_ts: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    text: String,
}

impl SlackMessage {
    fn into_message(self, channel_id: &str) -> Message {
        // A thread parent carries thread_ts == ts; it belongs to the top level.
        let thread_ts = self.thread_ts.filter(|thread| *thread != self.ts);
        Message {
            channel_id: channel_id.to_string(),
            created_at: ts_to_datetime(&self.ts),
            thread_ts,
            user_id: self.user.or(self.bot_id).unwrap_or_default(),
            text: self.text,
            ts: self.ts,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SlackChannel {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_member: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct MessagesPage {
    #[serde(default)]
    messages: Vec<SlackMessage>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct ChannelsPage {
    #[serde(default)]
    channels: Vec<SlackChannel>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ts: String,
}

fn ts_to_datetime(ts: &str) -> DateTime<Utc> {
    ts.split('.')
        .next()
        .and_then(|secs| secs.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

fn next_cursor(metadata: ResponseMetadata) -> Option<String> {
    Some(metadata.next_cursor).filter(|cursor| !cursor.is_empty())
}

/// [`MessagingClient`] backed by the Slack Web API.
///
/// Every call waits on a shared rate limiter and retries transient failures
/// (HTTP 429/5xx, `ratelimited`, connect and timeout errors) with
/// exponential backoff.
pub struct SlackClient {
    http: Client,
    token: String,
    base_url: String,
    limiter: DefaultDirectRateLimiter,
    retry: RetryPolicy,
}

impl SlackClient {
    /// Build a client from config; the token may come from `SLACK_BOT_TOKEN`.
    pub fn new(config: &SlackConfig) -> Result<Self, SlackApiError> {
        let token = config.get_bot_token().ok_or(SlackApiError::MissingToken)?;
        Self::with_token(config, token)
    }

    /// Client using `token` instead of the configured one.
    pub fn with_token(config: &SlackConfig, token: impl Into<String>) -> Result<Self, SlackApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            token: token.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter: rate_limiter(config.requests_per_second),
            retry: RetryPolicy::new(config.max_retries, config.initial_backoff_ms, config.max_backoff_ms),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, request: SlackRequest) -> Result<T, SlackApiError> {
        let body = self.retry.execute(method, || self.send_once(method, &request)).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn send_once(&self, method: &str, request: &SlackRequest) -> Result<Value, SlackApiError> {
        self.limiter.until_ready().await;

        let url = format!("{}/{}", self.base_url, method);
        let builder = match request {
            SlackRequest::Get(query) => self.http.get(&url).query(query),
            SlackRequest::Post(body) => self.http.post(&url).json(body),
        };
        let response = builder.bearer_auth(&self.token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            return Err(SlackApiError::from_status(status, body, retry_after));
        }

        let body: Value = response.json().await?;
        if body.get("ok").and_then(Value::as_bool) == Some(true) {
            Ok(body)
        } else {
            let code = body.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
            Err(SlackApiError::from_code(code))
        }
    }
}

#[async_trait]
impl MessagingClient for SlackClient {
    #[instrument(skip(self, text), err)]
    async fn send_message(&self, channel_id: &str, text: &str, thread_ts: Option<&str>) -> DomainResult<String> {
        let mut body = json!({ "channel": channel_id, "text": text });
        if let Some(thread_ts) = thread_ts {
            body["thread_ts"] = json!(thread_ts);
        }
        let posted: PostMessageResponse = self.call("chat.postMessage", SlackRequest::Post(body)).await?;
        debug!(channel_id, ts = %posted.ts, "message posted");
        Ok(posted.ts)
    }

    async fn fetch_channel_history(&self, channel_id: &str, limit: u32) -> DomainResult<Vec<Message>> {
        let query = vec![("channel", channel_id.to_string()), ("limit", limit.to_string())];
        let page: MessagesPage = self.call("conversations.history", SlackRequest::Get(query)).await?;

        // Slack returns newest first.
        let mut messages: Vec<Message> = page
            .messages
            .into_iter()
            .map(|message| message.into_message(channel_id))
            .collect();
        messages.reverse();
        Ok(messages)
    }

    async fn fetch_thread_history(&self, channel_id: &str, thread_ts: &str, limit: u32) -> DomainResult<Vec<Message>> {
        // Replies come oldest first and page forward, so walk to the end and
        // keep the tail.
        let mut collected: Vec<SlackMessage> = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![
                ("channel", channel_id.to_string()),
                ("ts", thread_ts.to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if let Some(cursor) = cursor.take() {
                query.push(("cursor", cursor));
            }
            let page: MessagesPage = self.call("conversations.replies", SlackRequest::Get(query)).await?;
            collected.extend(page.messages);
            match next_cursor(page.response_metadata) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let skip = collected.len().saturating_sub(limit as usize);
        Ok(collected
            .into_iter()
            .skip(skip)
            .map(|message| {
                let mut message = message.into_message(channel_id);
                // Replies of a thread keep the thread key; the parent stays top level.
                if message.ts != thread_ts {
                    message.thread_ts = Some(thread_ts.to_string());
                }
                message
            })
            .collect())
    }

    async fn list_channels(&self) -> DomainResult<Vec<ChannelInfo>> {
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![
                ("types", "public_channel,private_channel".to_string()),
                ("exclude_archived", "true".to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if let Some(cursor) = cursor.take() {
                query.push(("cursor", cursor));
            }
            let page: ChannelsPage = self.call("conversations.list", SlackRequest::Get(query)).await?;
            channels.extend(page.channels.into_iter().map(|channel| ChannelInfo {
                id: channel.id,
                name: channel.name,
                is_member: channel.is_member,
            }));
            match next_cursor(page.response_metadata) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        debug!(count = channels.len(), "channels listed");
        Ok(channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config(base_url: &str) -> SlackConfig {
        SlackConfig {
            bot_token: Some("xoxb-test".to_string()),
            base_url: base_url.to_string(),
            requests_per_second: 100,
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
        }
    }

    #[test]
    fn test_error_classification() {
        assert!(SlackApiError::from_code("ratelimited").is_transient());
        assert!(SlackApiError::from_code("internal_error").is_transient());
        assert!(!SlackApiError::from_code("channel_not_found").is_transient());
        assert!(!SlackApiError::MissingToken.is_transient());
        assert_eq!(
            SlackApiError::from_status(StatusCode::TOO_MANY_REQUESTS, String::new(), Some(Duration::from_secs(2)))
                .retry_after(),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let config = SlackConfig {
            bot_token: None,
            ..SlackConfig::default()
        };
        temp_env::with_var_unset("SLACK_BOT_TOKEN", || {
            assert!(matches!(SlackClient::new(&config), Err(SlackApiError::MissingToken)));
        });
    }

    #[tokio::test]
    async fn test_send_message_into_thread() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat.postMessage")
            .match_header("authorization", "Bearer xoxb-test")
            .match_body(Matcher::PartialJson(json!({
                "channel": "C1",
                "text": "hello",
                "thread_ts": "100.000001"
            })))
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"channel":"C1","ts":"200.000002"}"#)
            .create_async()
            .await;

        let client = SlackClient::new(&config(&server.url())).unwrap();
        let ts = client.send_message("C1", "hello", Some("100.000001")).await.unwrap();

        assert_eq!(ts, "200.000002");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_channel_history_is_oldest_first() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/conversations.history")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("channel".into(), "C1".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_body(
                r#"{"ok":true,"messages":[
                    {"type":"message","user":"U2","text":"second","ts":"1700000002.000000","thread_ts":"1700000002.000000"},
                    {"type":"message","bot_id":"B1","text":"first","ts":"1700000001.000000"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = SlackClient::new(&config(&server.url())).unwrap();
        let history = client.fetch_channel_history("C1", 2).await.unwrap();

        let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(history[0].user_id, "B1");
        assert_eq!(history[1].thread_ts, None);
        assert_eq!(history[1].created_at.timestamp(), 1_700_000_002);
    }

    #[tokio::test]
    async fn test_thread_history_keeps_latest_replies() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/conversations.replies")
            .match_query(Matcher::UrlEncoded("ts".into(), "10.000000".into()))
            .with_body(
                r#"{"ok":true,"messages":[
                    {"user":"U1","text":"parent","ts":"10.000000","thread_ts":"10.000000"},
                    {"user":"U2","text":"r1","ts":"11.000000","thread_ts":"10.000000"},
                    {"user":"U3","text":"r2","ts":"12.000000","thread_ts":"10.000000"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = SlackClient::new(&config(&server.url())).unwrap();
        let history = client.fetch_thread_history("C1", "10.000000", 2).await.unwrap();

        let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["r1", "r2"]);
        assert!(history.iter().all(|m| m.thread_ts.as_deref() == Some("10.000000")));
    }

    #[tokio::test]
    async fn test_list_channels_follows_cursor() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/conversations.list")
            .match_query(Matcher::Regex("cursor=next".to_string()))
            .with_body(r#"{"ok":true,"channels":[{"id":"C2","name":"random","is_member":false}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/conversations.list")
            .match_query(Matcher::Regex("limit=200$".to_string()))
            .with_body(
                r#"{"ok":true,"channels":[{"id":"C1","name":"general","is_member":true}],
                    "response_metadata":{"next_cursor":"next"}}"#,
            )
            .create_async()
            .await;

        let client = SlackClient::new(&config(&server.url())).unwrap();
        let channels = client.list_channels().await.unwrap();

        let ids: Vec<&str> = channels.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C1", "C2"]);
        assert!(channels[0].is_member);
    }

    #[tokio::test]
    async fn test_api_error_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat.postMessage")
            .with_body(r#"{"ok":false,"error":"channel_not_found"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = SlackClient::new(&config(&server.url())).unwrap();
        let err = client.send_message("CX", "hi", None).await.unwrap_err();

        assert!(matches!(err, DomainError::Messaging(ref msg) if msg.contains("channel_not_found")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_retries_exhausted_on_server_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/conversations.list")
            .match_query(Matcher::Any)
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let client = SlackClient::new(&config(&server.url())).unwrap();
        let err = client.list_channels().await.unwrap_err();

        assert!(matches!(err, DomainError::Messaging(_)));
        mock.assert_async().await;
    }
}
