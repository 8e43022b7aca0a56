//! Pipeline events and their queue lifecycle.
//!
//! An [`Event`] is an immutable record of something that needs processing:
//! an inbound chat message or one of the workspace-wide timer triggers.
//! Its [`Event::identity_key`] is what the queue coalesces on.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::conversation::IncomingMessage;

/// Scope id used for global triggers. The worker serves a single tenant.
pub const WORKSPACE_SCOPE: &str = "workspace";

/// Payload key carrying the workspace id on timer events.
pub const WORKSPACE_ID_KEY: &str = "workspace_id";

/// Kind of work an event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A chat message arrived in some channel or thread.
    Message,
    /// Time to refresh channel memory summaries.
    Summary,
    /// Time to check whether the agent should speak up anywhere.
    AutonomousCheck,
    /// Time to re-sync the channel list from the chat platform.
    ChannelSync,
}

impl EventType {
    /// The three timer-driven event types, in the order the scheduler fires them.
    pub const TIMER_TYPES: [EventType; 3] = [
        EventType::AutonomousCheck,
        EventType::Summary,
        EventType::ChannelSync,
    ];

    /// Wire name, also the prefix of identity keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Summary => "summary",
            Self::AutonomousCheck => "autonomous_check",
            Self::ChannelSync => "channel_sync",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form event payload.
pub type EventPayload = Map<String, Value>;

/// An immutable unit of work flowing through the event queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique id, used for log correlation only.
    pub id: Uuid,
    /// Kind of work.
    pub event_type: EventType,
    /// Type-specific fields.
    pub payload: EventPayload,
    /// When the event was created.
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Event stamped with a fresh id and the current time.
    pub fn new(event_type: EventType, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            payload,
            created_at: Utc::now(),
        }
    }

    /// Build a MESSAGE event from an inbound chat message.
    pub fn message(message: &IncomingMessage) -> DomainResult<Self> {
        match serde_json::to_value(message)? {
            Value::Object(payload) => Ok(Self::new(EventType::Message, payload)),
            other => Err(DomainError::InvalidEventPayload {
                event_type: EventType::Message.to_string(),
                reason: format!("expected object, got {other}"),
            }),
        }
    }

    /// Build a workspace-scoped timer event (summary, check, channel sync).
    pub fn workspace(event_type: EventType, workspace_id: &str) -> Self {
        let mut payload = Map::new();
        payload.insert(WORKSPACE_ID_KEY.to_string(), Value::String(workspace_id.to_string()));
        Self::new(event_type, payload)
    }

    /// Read a string field from the payload. Non-string values read as absent.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Deserialize the payload into a typed struct.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> DomainResult<T> {
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(|e| {
            DomainError::InvalidEventPayload {
                event_type: self.event_type.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Deterministic coalescing key.
    ///
    /// MESSAGE events coalesce per conversation scope
    /// (`message:<channel_id>:<thread_ts-or-empty>`); every other type is a
    /// workspace-wide trigger keyed as `<type>:<workspace>`.
    pub fn identity_key(&self) -> String {
        match self.event_type {
            EventType::Message => format!(
                "message:{}:{}",
                self.payload_str("channel_id").unwrap_or_default(),
                self.payload_str("thread_ts").unwrap_or_default(),
            ),
            other => format!(
                "{}:{}",
                other,
                self.payload_str(WORKSPACE_ID_KEY).unwrap_or(WORKSPACE_SCOPE),
            ),
        }
    }
}

/// Lifecycle state of an event held by the queue or its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Waiting in the queue.
    Queued,
    /// Handed to the consumer and being dispatched.
    Processing,
    /// Finished; the key may be admitted again.
    Done,
}

impl EntryState {
    /// Whether an entry in this state blocks admission of another event with
    /// the same identity key.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }
}

/// An event together with its lifecycle state.
///
/// Owned by the queue while `Queued`; handed to the consumer on dequeue, which
/// moves it through `Processing` to `Done` via the queue's mark operations.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// The wrapped event.
    pub event: Event,
    /// Identity key computed once at admission.
    pub key: String,
    /// Lifecycle state.
    pub state: EntryState,
}

impl QueueEntry {
    /// Entry in state `Queued`, with its key computed.
    pub fn new(event: Event) -> Self {
        let key = event.identity_key();
        Self {
            event,
            key,
            state: EntryState::Queued,
        }
    }
}
