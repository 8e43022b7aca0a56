//! Language model port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::{Judgment, Message};

/// Token accounting for one generation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens billed.
    pub input_tokens: u64,
    /// Completion tokens billed.
    pub output_tokens: u64,
}

/// Text produced by the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// Generated text, untrimmed.
    pub text: String,
    /// Token usage of the call.
    pub usage: Usage,
}

/// Decision and generation calls backed by a language model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Decide whether the agent should respond to `message` given `context`.
    async fn judge(&self, context: &str, message: &Message) -> DomainResult<Judgment>;

    /// Produce text for the given prompt context.
    async fn generate(&self, context: &str) -> DomainResult<Generation>;
}
