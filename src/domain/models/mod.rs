//! Domain models.

pub mod config;
pub mod conversation;
pub mod event;
pub mod judgment;
pub mod memory;

pub use config::{
    AgentConfig, Config, DatabaseConfig, EventLoopSettings, LlmConfig, LoggingConfig,
    PeriodicSettings, SchedulerSettings, SchedulingMode, SlackConfig,
};
pub use conversation::{
    message_ts_at, Channel, ChannelInfo, IncomingMessage, Message, Scope, User, TOP_LEVEL_SCOPE,
};
pub use event::{EntryState, Event, EventPayload, EventType, QueueEntry, WORKSPACE_SCOPE};
pub use judgment::{Judgment, JudgmentCache, JudgmentSkipConfig, SkipThreshold};
pub use memory::{Memo, Memory};
