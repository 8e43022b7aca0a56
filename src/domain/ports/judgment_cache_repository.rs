//! Judgment cache repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainResult;
use crate::domain::models::{JudgmentCache, Scope};

/// Repository trait for cached judgments
///
/// One row per scope, keyed by `(channel_id, thread_ts-or-"top")`. Rows are
/// written only after a real decision call.
#[async_trait]
pub trait JudgmentCacheRepository: Send + Sync {
    /// Cached judgment for a scope, if any
    async fn find(&self, scope: &Scope) -> DomainResult<Option<JudgmentCache>>;

    /// Insert or replace the scope's row, preserving the original `created_at`
    async fn upsert(&self, cache: &JudgmentCache) -> DomainResult<()>;

    /// Delete rows whose `next_check_at` is before `before`.
    ///
    /// Returns the number of rows removed.
    async fn delete_expired(&self, before: DateTime<Utc>) -> DomainResult<u64>;

    /// Rows ordered by soonest `next_check_at` first
    async fn list(&self, limit: u32) -> DomainResult<Vec<JudgmentCache>>;
}
