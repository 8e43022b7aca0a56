//! Chat-side domain models: channels, users, messages and conversation scopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope key used for top-level (non-threaded) conversation in a channel.
pub const TOP_LEVEL_SCOPE: &str = "top";

/// A unit of conversation: a channel's top level, or one thread in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Channel the scope lives in.
    pub channel_id: String,
    /// Thread root, or `None` for top level.
    pub thread_ts: Option<String>,
}

impl Scope {
    /// Scope for a channel and optional thread root.
    pub fn new(channel_id: impl Into<String>, thread_ts: Option<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            thread_ts,
        }
    }

    /// Scope of a channel's top level.
    pub fn top_level(channel_id: impl Into<String>) -> Self {
        Self::new(channel_id, None)
    }

    /// `thread_ts`, or `"top"` for the channel's top level.
    pub fn key(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(TOP_LEVEL_SCOPE)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel_id, self.key())
    }
}

/// A message as received from an inbound chat adapter.
///
/// This is the payload of a MESSAGE event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Channel the message was posted in.
    pub channel_id: String,
    /// Platform timestamp, unique within the channel.
    pub ts: String,
    /// Thread root when posted as a reply.
    #[serde(default)]
    pub thread_ts: Option<String>,
    /// Author id.
    pub user_id: String,
    /// Display name, when the platform sent one.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Message body.
    pub text: String,
}

impl IncomingMessage {
    /// Scope the message belongs to.
    pub fn scope(&self) -> Scope {
        Scope::new(self.channel_id.clone(), self.thread_ts.clone())
    }
}

/// A stored chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Channel the message was posted in.
    pub channel_id: String,
    /// Platform timestamp, unique within the channel.
    pub ts: String,
    /// Thread root when posted as a reply.
    pub thread_ts: Option<String>,
    /// Author id.
    pub user_id: String,
    /// Message body.
    pub text: String,
    /// When the message was stored.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Scope the message belongs to.
    pub fn scope(&self) -> Scope {
        Scope::new(self.channel_id.clone(), self.thread_ts.clone())
    }
}

impl From<&IncomingMessage> for Message {
    fn from(incoming: &IncomingMessage) -> Self {
        Self {
            channel_id: incoming.channel_id.clone(),
            ts: incoming.ts.clone(),
            thread_ts: incoming.thread_ts.clone(),
            user_id: incoming.user_id.clone(),
            text: incoming.text.clone(),
            created_at: Utc::now(),
        }
    }
}

/// A channel as reported by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Platform channel id.
    pub id: String,
    /// Channel name without the leading `#`.
    pub name: String,
    /// Whether the bot has joined the channel.
    pub is_member: bool,
}

/// A stored channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Platform channel id.
    pub id: String,
    /// Channel name.
    pub name: String,
    /// Whether the bot has joined.
    pub is_member: bool,
    /// False once the platform stops listing the channel.
    pub active: bool,
    /// First time the channel was seen.
    pub created_at: DateTime<Utc>,
    /// Last sync that touched the row.
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    /// New active channel from a platform listing.
    pub fn from_info(info: &ChannelInfo) -> Self {
        let now = Utc::now();
        Self {
            id: info.id.clone(),
            name: info.name.clone(),
            is_member: info.is_member,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A stored chat user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Platform user id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// True for bot accounts, including this agent.
    pub is_bot: bool,
    /// First time the user was seen.
    pub created_at: DateTime<Utc>,
    /// Last time the user was recorded.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// User record stamped with the current time.
    pub fn new(id: impl Into<String>, name: impl Into<String>, is_bot: bool) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            is_bot,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Platform timestamp string (`<secs>.<micros>`) for a point in time.
///
/// Message timestamps compare numerically, so this is used to express
/// "messages newer than" cutoffs.
pub fn message_ts_at(at: DateTime<Utc>) -> String {
    format!("{}.{:06}", at.timestamp(), at.timestamp_subsec_micros())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_message_ts_at() {
        let at = Utc.timestamp_opt(1_700_000_000, 1_500_000).unwrap();
        assert_eq!(message_ts_at(at), "1700000000.001500");
    }

    #[test]
    fn test_scope_key() {
        assert_eq!(Scope::top_level("C1").key(), "top");
        assert_eq!(Scope::new("C1", Some("123.4".to_string())).key(), "123.4");
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(Scope::top_level("C1").to_string(), "C1/top");
    }

    #[test]
    fn test_incoming_without_thread_deserializes() {
        let json = r#"{"channel_id":"C1","ts":"1.0","user_id":"U1","text":"hi"}"#;
        let msg: IncomingMessage = serde_json::from_str(json).unwrap();
        assert!(msg.thread_ts.is_none());
        assert_eq!(msg.scope(), Scope::top_level("C1"));
    }
}
