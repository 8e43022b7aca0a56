//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - MessagingClient: chat platform operations
//! - LlmClient: decision and generation calls
//! - *Repository: durable storage for messages, users, channels,
//!   judgment cache rows, memories and memos
//!
//! These traits keep the scheduling core independent of any concrete
//! platform, model provider, or database.

pub mod channel_repository;
pub mod judgment_cache_repository;
pub mod llm_client;
pub mod memo_repository;
pub mod memory_repository;
pub mod message_repository;
pub mod messaging;
pub mod user_repository;

pub use channel_repository::ChannelRepository;
pub use judgment_cache_repository::JudgmentCacheRepository;
pub use llm_client::{Generation, LlmClient, Usage};
pub use memo_repository::MemoRepository;
pub use memory_repository::MemoryRepository;
pub use message_repository::MessageRepository;
pub use messaging::MessagingClient;
pub use user_repository::UserRepository;

use std::sync::Arc;

/// Every repository the worker needs, bundled for wiring.
#[derive(Clone)]
pub struct Repositories {
    /// Stored chat messages.
    pub messages: Arc<dyn MessageRepository>,
    /// Known users.
    pub users: Arc<dyn UserRepository>,
    /// Known channels.
    pub channels: Arc<dyn ChannelRepository>,
    /// Cached judgments.
    pub judgments: Arc<dyn JudgmentCacheRepository>,
    /// Channel memory summaries.
    pub memories: Arc<dyn MemoryRepository>,
    /// Memos.
    pub memos: Arc<dyn MemoRepository>,
}
