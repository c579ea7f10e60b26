use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::UserId;

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    pub fn generate() -> Self {
        SessionId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(SessionId)
    }
}

/// Hex SHA-256 of a refresh token id. The registry stores only this, never
/// the token itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(token_id: &str) -> Self {
        let digest = Sha256::digest(token_id.as_bytes());
        Fingerprint(hex::encode(digest))
    }

    /// Wraps a value read back from storage.
    pub fn from_stored(hex: impl Into<String>) -> Self {
        Fingerprint(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub fingerprint: Fingerprint,
    pub created_at: DateTime<Utc>,
    pub last_rotated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl Session {
    pub fn new(
        user_id: UserId,
        fingerprint: Fingerprint,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Session {
            id: SessionId::generate(),
            user_id,
            fingerprint,
            created_at: now,
            last_rotated_at: now,
            expires_at,
            revoked: false,
        }
    }

    /// Revoked sessions and sessions past their lifetime are inactive.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fingerprint_is_stable_hex_sha256() {
        let a = Fingerprint::of("token-id");
        let b = Fingerprint::of("token-id");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, Fingerprint::of("other-token-id"));
    }

    #[test]
    fn session_activity_follows_revocation_and_expiry() {
        let now = Utc::now();
        let mut session = Session::new(
            UserId::generate(),
            Fingerprint::of("jti"),
            now,
            now + Duration::hours(1),
        );
        assert!(session.is_active_at(now));
        assert!(!session.is_active_at(now + Duration::hours(1)));
        assert!(session.is_expired_at(now + Duration::hours(1)));

        session.revoked = true;
        assert!(!session.is_active_at(now));
        assert!(!session.is_expired_at(now));
    }
}
