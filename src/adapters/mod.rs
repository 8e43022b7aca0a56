//! Infrastructure adapters for external systems.

pub mod anthropic;
pub mod mock;
pub mod retry;
pub mod slack;
pub mod sqlite;

pub use anthropic::{AnthropicClient, LlmApiError};
pub use mock::{MockLlmClient, MockMessagingClient, SentMessage};
pub use slack::{SlackApiError, SlackClient};
