//! Channel memory summaries and operator memos.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rolling summary of a channel's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Channel the summary describes.
    pub channel_id: String,
    /// Summary text.
    pub content: String,
    /// Number of messages folded into the summary so far.
    pub message_count: u64,
    /// Newest message included in the summary.
    pub last_message_ts: Option<String>,
    /// When the first summary was written.
    pub created_at: DateTime<Utc>,
    /// When the summary was last rewritten.
    pub updated_at: DateTime<Utc>,
}

impl Memory {
    /// Empty memory stamped with the current time.
    pub fn new(channel_id: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            channel_id: channel_id.into(),
            content: content.into(),
            message_count: 0,
            last_message_ts: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An operator-authored note, optionally scoped to one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    /// Memo id.
    pub id: Uuid,
    /// `None` for a workspace-wide memo.
    pub channel_id: Option<String>,
    /// Memo text.
    pub content: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last edit time.
    pub updated_at: DateTime<Utc>,
}

impl Memo {
    /// Memo with a fresh id.
    pub fn new(channel_id: Option<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            channel_id,
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
