use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub enum RotateOutcome {
    /// The fingerprint was swapped; carries the updated session.
    Rotated(Session),
    /// The session is active but holds a different fingerprint.
    Conflict,
    /// The session is revoked, expired or unknown.
    Inactive,
}

/// Server-side record of outstanding refresh tokens.
///
/// `rotate` is a compare-and-swap: among concurrent callers presenting the
/// same old fingerprint exactly one observes `Rotated`. A failed or dropped
/// call leaves the session untouched.
#[async_trait::async_trait]
pub trait SessionRegistry: Send + Sync {
    async fn create(
        &self,
        user_id: UserId,
        fingerprint: &Fingerprint,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, AuthError>;

    async fn get(&self, session_id: SessionId) -> Result<Option<Session>, AuthError>;

    async fn rotate(
        &self,
        session_id: SessionId,
        old: &Fingerprint,
        new: &Fingerprint,
    ) -> Result<RotateOutcome, AuthError>;

    /// Idempotent. Unknown sessions are ignored.
    async fn revoke(&self, session_id: SessionId) -> Result<(), AuthError>;

    async fn is_active(&self, session_id: SessionId) -> Result<bool, AuthError>;

    /// Sessions whose lifetime ended at or before `now`, for an external sweep.
    async fn list_expired(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SessionId>, AuthError>;

    async fn purge(&self, session_ids: &[SessionId]) -> Result<u64, AuthError>;
}
