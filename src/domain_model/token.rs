use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{SessionId, UserId};

pub const ACCESS_TOKEN_TYPE: &str = "access";
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Decoded, verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAccess {
    pub user_id: UserId,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Decoded, verified refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRefresh {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}
