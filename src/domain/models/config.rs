//! Configuration model. Every field has a default so partial files load.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::models::event::WORKSPACE_SCOPE;
use crate::domain::models::judgment::JudgmentSkipConfig;

/// Main configuration structure for autoreply
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Workspace this instance serves (single tenant)
    #[serde(default = "default_workspace_id")]
    pub workspace_id: String,

    /// Which scheduling entry points the worker starts
    #[serde(default)]
    pub mode: SchedulingMode,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Event scheduler timers
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// Event loop tuning
    #[serde(default)]
    pub event_loop: EventLoopSettings,

    /// Standalone periodic loops
    #[serde(default)]
    pub periodic: PeriodicSettings,

    /// Judgment cache skip windows
    #[serde(default)]
    pub judgment: JudgmentSkipConfig,

    /// Agent behaviour
    #[serde(default)]
    pub agent: AgentConfig,

    /// Slack messaging client
    #[serde(default)]
    pub slack: SlackConfig,

    /// Language model client
    #[serde(default)]
    pub llm: LlmConfig,
}

fn default_workspace_id() -> String {
    WORKSPACE_SCOPE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_id: default_workspace_id(),
            mode: SchedulingMode::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            scheduler: SchedulerSettings::default(),
            event_loop: EventLoopSettings::default(),
            periodic: PeriodicSettings::default(),
            judgment: JudgmentSkipConfig::default(),
            agent: AgentConfig::default(),
            slack: SlackConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

/// Scheduling entry points.
///
/// `Events` drives the use cases through the event queue; `Periodic` runs the
/// standalone checker and memory generator loops; `Both` runs everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    /// Timers and inbound messages go through the event queue.
    #[default]
    Events,
    /// Only the standalone periodic loops run.
    Periodic,
    /// Both entry points run side by side.
    Both,
}

impl SchedulingMode {
    /// Whether the event loop and scheduler run.
    pub fn uses_events(self) -> bool {
        matches!(self, Self::Events | Self::Both)
    }

    /// Whether the periodic checker and memory generator run.
    pub fn uses_periodic(self) -> bool {
        matches!(self, Self::Periodic | Self::Both)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".autoreply/autoreply.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// SQLx connection URL.
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rotated log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
            retention_days: default_retention_days(),
        }
    }
}

/// Event scheduler timers and poll bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerSettings {
    /// Seconds between AUTONOMOUS_CHECK events (0 disables)
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Seconds between SUMMARY events (0 disables)
    #[serde(default = "default_summary_interval_secs")]
    pub summary_interval_secs: u64,

    /// Seconds between CHANNEL_SYNC events (0 disables)
    #[serde(default = "default_channel_sync_interval_secs")]
    pub channel_sync_interval_secs: u64,

    /// Finest allowed poll tick in milliseconds
    #[serde(default = "default_min_poll_interval_ms")]
    pub min_poll_interval_ms: u64,

    /// Coarsest allowed poll tick in milliseconds
    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u64,
}

const fn default_check_interval_secs() -> u64 {
    300
}

const fn default_summary_interval_secs() -> u64 {
    3_600
}

const fn default_channel_sync_interval_secs() -> u64 {
    1_800
}

const fn default_min_poll_interval_ms() -> u64 {
    10
}

const fn default_max_poll_interval_ms() -> u64 {
    1_000
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            summary_interval_secs: default_summary_interval_secs(),
            channel_sync_interval_secs: default_channel_sync_interval_secs(),
            min_poll_interval_ms: default_min_poll_interval_ms(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
        }
    }
}

/// Event loop tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EventLoopSettings {
    /// How long one dequeue wait may block before re-checking the stop signal
    #[serde(default = "default_dequeue_timeout_ms")]
    pub dequeue_timeout_ms: u64,
}

const fn default_dequeue_timeout_ms() -> u64 {
    1_000
}

impl Default for EventLoopSettings {
    fn default() -> Self {
        Self {
            dequeue_timeout_ms: default_dequeue_timeout_ms(),
        }
    }
}

/// Standalone periodic loops
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PeriodicSettings {
    /// Seconds between autonomous response checks
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Seconds between memory summarization runs
    #[serde(default = "default_summary_interval_secs")]
    pub memory_interval_secs: u64,
}

impl Default for PeriodicSettings {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            memory_interval_secs: default_summary_interval_secs(),
        }
    }
}

impl PeriodicSettings {
    /// `check_interval_secs` as a duration.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// `memory_interval_secs` as a duration.
    pub fn memory_interval(&self) -> Duration {
        Duration::from_secs(self.memory_interval_secs)
    }
}

/// Agent behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// The bot's own chat user id; scopes whose latest message is ours are skipped
    #[serde(default)]
    pub bot_user_id: String,

    /// Messages of history fetched per judgment
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    /// Only scopes with a message newer than this many seconds are checked
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: u64,

    /// New messages needed before a channel summary is refreshed
    #[serde(default = "default_summary_min_messages")]
    pub summary_min_messages: u32,

    /// Persona text prepended to every prompt
    #[serde(default = "default_persona")]
    pub persona: String,
}

const fn default_history_limit() -> u32 {
    30
}

const fn default_lookback_secs() -> u64 {
    86_400
}

const fn default_summary_min_messages() -> u32 {
    10
}

fn default_persona() -> String {
    "You are a helpful teammate in a workplace chat. Speak up only when you add value.".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bot_user_id: String::new(),
            history_limit: default_history_limit(),
            lookback_secs: default_lookback_secs(),
            summary_min_messages: default_summary_min_messages(),
            persona: default_persona(),
        }
    }
}

/// Slack messaging client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SlackConfig {
    /// Bot token; falls back to SLACK_BOT_TOKEN
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Web API base URL
    #[serde(default = "default_slack_base_url")]
    pub base_url: String,

    /// Requests per second allowed
    #[serde(default = "default_slack_rps")]
    pub requests_per_second: u32,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Retry delay cap
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_slack_base_url() -> String {
    "https://slack.com/api".to_string()
}

const fn default_slack_rps() -> u32 {
    1
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            base_url: default_slack_base_url(),
            requests_per_second: default_slack_rps(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl SlackConfig {
    /// Token from config or environment.
    pub fn get_bot_token(&self) -> Option<String> {
        self.bot_token
            .clone()
            .or_else(|| std::env::var("SLACK_BOT_TOKEN").ok())
    }
}

/// Language model client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    /// API key; falls back to ANTHROPIC_API_KEY
    #[serde(default)]
    pub api_key: Option<String>,

    /// Messages API base URL
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model id sent with every request
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Output token cap per call
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Retry delay cap
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_llm_model() -> String {
    "claude-sonnet-4-5".to_string()
}

const fn default_llm_max_tokens() -> u32 {
    1_024
}

const fn default_llm_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl LlmConfig {
    /// API key from config or environment.
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }
}
