//! User repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::User;

/// Repository trait for chat users
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert or update a user
    async fn upsert(&self, user: &User) -> DomainResult<()>;

    /// User by id
    async fn find(&self, id: &str) -> DomainResult<Option<User>>;
}
