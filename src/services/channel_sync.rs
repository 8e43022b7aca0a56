//! Channel membership sync use case.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::errors::DomainResult;
use crate::domain::models::Channel;
use crate::domain::ports::{MessagingClient, Repositories};

/// Summary of one channel sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Channels the platform returned.
    pub channels_seen: usize,
    /// Stored channels marked inactive.
    pub deactivated: u64,
}

/// Mirrors the platform channel list into storage.
pub struct ChannelSyncService {
    repos: Repositories,
    messaging: Arc<dyn MessagingClient>,
}

impl ChannelSyncService {
    /// Sync service writing through `repos`.
    pub fn new(repos: Repositories, messaging: Arc<dyn MessagingClient>) -> Self {
        Self { repos, messaging }
    }

    /// Mirror the platform's channel list into storage. Channels that
    /// disappeared are marked inactive rather than deleted.
    pub async fn run_once(&self) -> DomainResult<SyncReport> {
        let channels = self.messaging.list_channels().await?;
        let mut ids = Vec::with_capacity(channels.len());
        for info in &channels {
            self.repos.channels.upsert(&Channel::from_info(info)).await?;
            ids.push(info.id.clone());
        }
        let deactivated = self.repos.channels.deactivate_missing(&ids).await?;

        let report = SyncReport {
            channels_seen: channels.len(),
            deactivated,
        };
        tracing::info!(
            channels_seen = report.channels_seen,
            deactivated = report.deactivated,
            "channel sync finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;
    use crate::domain::models::ChannelInfo;
    use crate::services::test_support::Fixture;

    fn info(id: &str, is_member: bool) -> ChannelInfo {
        ChannelInfo {
            id: id.to_string(),
            name: id.to_lowercase(),
            is_member,
        }
    }

    #[tokio::test]
    async fn test_sync_upserts_and_deactivates() {
        let fixture = Fixture::new().await;
        let service = ChannelSyncService::new(fixture.repos.clone(), fixture.messaging.clone());
        fixture.add_channel("COLD").await;
        fixture
            .messaging
            .set_channels(vec![info("C1", true), info("C2", false)])
            .await;

        let report = service.run_once().await.unwrap();
        assert_eq!(report, SyncReport { channels_seen: 2, deactivated: 1 });

        let active: Vec<String> = fixture
            .repos
            .channels
            .list_active()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(active, vec!["C1"]);
        assert!(!fixture.repos.channels.find("COLD").await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn test_platform_failure_propagates() {
        let fixture = Fixture::new().await;
        let service = ChannelSyncService::new(fixture.repos.clone(), fixture.messaging.clone());
        fixture.add_channel("C1").await;
        fixture.messaging.fail_with(Some("invalid_auth")).await;

        let err = service.run_once().await.unwrap_err();
        assert!(matches!(err, DomainError::Messaging(_)));
        // Nothing was deactivated on a failed listing.
        assert!(fixture.repos.channels.find("C1").await.unwrap().unwrap().active);
    }
}
