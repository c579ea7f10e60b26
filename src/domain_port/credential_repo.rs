use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub user_id: UserId,
    pub identifier: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait CredentialRepo: Send + Sync {
    /// Fetch credentials by login identifier.
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<CredentialRecord>, AuthError>;

    /// Whether any account exists at all.
    async fn any_exists(&self) -> Result<bool, AuthError>;

    /// Insert a new record. Fails with `UserExists` if the identifier is taken.
    async fn create(&self, record: &CredentialRecord) -> Result<(), AuthError>;
}
