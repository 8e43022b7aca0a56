//! Domain errors for the autoreply worker.

use thiserror::Error;

/// Domain-level errors that can occur in the autoreply system.
///
/// Collaborator failures (chat API, model API, storage) surface here as typed
/// variants so that use cases can report them; the loop layer logs and
/// contains them rather than treating them as fatal.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Chat platform call failed.
    #[error("Messaging error: {0}")]
    Messaging(String),

    /// Language model call failed or returned garbage.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Storage failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A stored or received value could not be decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Input rejected before any side effect.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// An event payload lacks the fields its type requires.
    #[error("Invalid {event_type} event payload: {reason}")]
    InvalidEventPayload { event_type: String, reason: String },

    /// The channel is unknown to storage or the platform.
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// A handler or periodic task panicked.
    #[error("Handler '{0}' panicked")]
    HandlerPanicked(String),
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_payload_message() {
        let err = DomainError::InvalidEventPayload {
            event_type: "message".to_string(),
            reason: "missing channel_id".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid message event payload: missing channel_id");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: DomainError = json_err.into();
        assert!(matches!(err, DomainError::SerializationError(_)));
    }
}
