//! Anthropic Messages API client for judge and generate calls.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::adapters::retry::{RetryPolicy, Retryable};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Judgment, LlmConfig, Message};
use crate::domain::ports::{Generation, LlmClient, Usage};

const API_VERSION: &str = "2023-06-01";
const JUDGE_MAX_TOKENS: u32 = 300;

const JUDGE_INSTRUCTIONS: &str = "Decide whether you should post a message in this conversation now. \
Respond only when you can add something useful or someone is waiting on you. \
Answer with a single JSON object and nothing else: \
{\"should_respond\": true|false, \"reason\": \"<one sentence>\", \"confidence\": <0.0-1.0>}";

/// Errors returned by the Messages API
#[derive(Error, Debug)]
pub enum LlmApiError {
    /// No API key was configured.
    #[error("Anthropic API key is not configured")]
    MissingApiKey,

    /// HTTP 400.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// HTTP 401 or 403.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// HTTP 429.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// HTTP 5xx other than 529.
    #[error("API server error: {0}")]
    ServerError(String),

    /// HTTP 529.
    #[error("API server overloaded")]
    Overloaded,

    /// Transport failure.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The judge reply was not the expected JSON verdict.
    #[error("Unparseable verdict: {0}")]
    InvalidVerdict(String),

    /// Any other status.
    #[error("HTTP {status}: {body}")]
    Unknown { status: StatusCode, body: String },
}

impl LlmApiError {
    /// Classify a non-success HTTP response.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            400 => Self::InvalidRequest(body),
            401 | 403 => Self::AuthenticationFailed(body),
            429 => Self::RateLimitExceeded,
            529 => Self::Overloaded,
            500..=599 => Self::ServerError(body),
            _ => Self::Unknown { status, body },
        }
    }
}

impl Retryable for LlmApiError {
    fn is_transient(&self) -> bool {
        match self {
            Self::RateLimitExceeded | Self::ServerError(_) | Self::Overloaded => true,
            Self::Network(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }
}

impl From<LlmApiError> for DomainError {
    fn from(err: LlmApiError) -> Self {
        DomainError::Llm(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl MessagesResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Deserialize)]
struct Verdict {
    should_respond: bool,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    confidence: f64,
}

/// Pull the JSON verdict out of the model's answer, tolerating prose or
/// code fences around the object.
fn parse_verdict(text: &str) -> Result<Judgment, LlmApiError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let object = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Err(LlmApiError::InvalidVerdict(text.to_string())),
    };
    let verdict: Verdict =
        serde_json::from_str(object).map_err(|err| LlmApiError::InvalidVerdict(format!("{err}: {object}")))?;
    Ok(Judgment::new(verdict.should_respond, verdict.reason, verdict.confidence))
}

/// [`LlmClient`] backed by the Anthropic Messages API.
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl AnthropicClient {
    /// Build a client from config; the key may come from `ANTHROPIC_API_KEY`.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmApiError> {
        let api_key = config.get_api_key().ok_or(LlmApiError::MissingApiKey)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            retry: RetryPolicy::new(config.max_retries, config.initial_backoff_ms, config.max_backoff_ms),
        })
    }

    async fn complete(&self, system: Option<&str>, prompt: &str, max_tokens: u32) -> Result<MessagesResponse, LlmApiError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            system,
            messages: vec![RequestMessage {
                role: "user",
                content: prompt,
            }],
        };
        self.retry.execute("messages", || self.send_once(&request)).await
    }

    async fn send_once(&self, request: &MessagesRequest<'_>) -> Result<MessagesResponse, LlmApiError> {
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmApiError::from_status(status, body));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    #[instrument(skip(self, context, message), fields(channel_id = %message.channel_id, ts = %message.ts), err)]
    async fn judge(&self, context: &str, message: &Message) -> DomainResult<Judgment> {
        let prompt = format!(
            "{context}\n## Latest message\n<{}> {}\n",
            message.user_id,
            message.text.trim()
        );
        let response = self
            .complete(Some(JUDGE_INSTRUCTIONS), &prompt, JUDGE_MAX_TOKENS.min(self.max_tokens))
            .await?;
        let judgment = parse_verdict(&response.text())?;
        debug!(
            should_respond = judgment.should_respond,
            confidence = judgment.confidence,
            "judgment received"
        );
        Ok(judgment)
    }

    #[instrument(skip(self, context), err)]
    async fn generate(&self, context: &str) -> DomainResult<Generation> {
        let response = self.complete(None, context, self.max_tokens).await?;
        let text = response.text().trim().to_string();
        if text.is_empty() {
            return Err(DomainError::Llm("empty generation".to_string()));
        }
        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "generation received"
        );
        Ok(Generation {
            text,
            usage: response.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mockito::Matcher;
    use serde_json::json;

    fn config(base_url: &str) -> LlmConfig {
        LlmConfig {
            api_key: Some("sk-test".to_string()),
            base_url: base_url.to_string(),
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            ..LlmConfig::default()
        }
    }

    fn message() -> Message {
        Message {
            channel_id: "C1".to_string(),
            ts: "100.000001".to_string(),
            thread_ts: None,
            user_id: "U1".to_string(),
            text: "can someone review my PR?".to_string(),
            created_at: Utc::now(),
        }
    }

    fn text_response(text: &str) -> String {
        json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [{ "type": "text", "text": text }],
            "usage": { "input_tokens": 42, "output_tokens": 7 }
        })
        .to_string()
    }

    #[test]
    fn test_parse_verdict_with_surrounding_text() {
        let judgment = parse_verdict(
            "Sure.\n```json\n{\"should_respond\": true, \"reason\": \"direct question\", \"confidence\": 1.7}\n```",
        )
        .unwrap();
        assert!(judgment.should_respond);
        assert_eq!(judgment.reason, "direct question");
        assert_eq!(judgment.confidence, 1.0);
    }

    #[test]
    fn test_parse_verdict_rejects_prose() {
        assert!(matches!(parse_verdict("I would not reply."), Err(LlmApiError::InvalidVerdict(_))));
        assert!(matches!(parse_verdict("{\"reason\": \"x\"}"), Err(LlmApiError::InvalidVerdict(_))));
    }

    #[test]
    fn test_status_classification() {
        assert!(LlmApiError::from_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(LlmApiError::from_status(StatusCode::from_u16(529).unwrap(), String::new()).is_transient());
        assert!(LlmApiError::from_status(StatusCode::BAD_GATEWAY, String::new()).is_transient());
        assert!(!LlmApiError::from_status(StatusCode::UNAUTHORIZED, String::new()).is_transient());
        assert!(!LlmApiError::from_status(StatusCode::BAD_REQUEST, String::new()).is_transient());
    }

    #[tokio::test]
    async fn test_judge_sends_headers_and_parses_verdict() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-test")
            .match_header("anthropic-version", API_VERSION)
            .match_body(Matcher::Regex("can someone review my PR".to_string()))
            .with_header("content-type", "application/json")
            .with_body(text_response(
                r#"{"should_respond": true, "reason": "asked for help", "confidence": 0.85}"#,
            ))
            .create_async()
            .await;

        let client = AnthropicClient::new(&config(&server.url())).unwrap();
        let judgment = client.judge("## Recent messages\n", &message()).await.unwrap();

        assert!(judgment.should_respond);
        assert_eq!(judgment.confidence, 0.85);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_returns_text_and_usage() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_body(text_response("  Looking now.  "))
            .create_async()
            .await;

        let client = AnthropicClient::new(&config(&server.url())).unwrap();
        let generation = client.generate("reply please").await.unwrap();

        assert_eq!(generation.text, "Looking now.");
        assert_eq!(
            generation.usage,
            Usage {
                input_tokens: 42,
                output_tokens: 7
            }
        );
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .with_status(401)
            .with_body("invalid x-api-key")
            .expect(1)
            .create_async()
            .await;

        let client = AnthropicClient::new(&config(&server.url())).unwrap();
        let err = client.generate("hi").await.unwrap_err();

        assert!(matches!(err, DomainError::Llm(ref msg) if msg.contains("Authentication failed")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_overload_is_retried_then_reported() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .expect(3)
            .create_async()
            .await;

        let client = AnthropicClient::new(&config(&server.url())).unwrap();
        let err = client.judge("ctx", &message()).await.unwrap_err();

        assert!(matches!(err, DomainError::Llm(_)));
        mock.assert_async().await;
    }
}
