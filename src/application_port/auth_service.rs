use crate::domain_model::*;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("malformed token")]
    Malformed,
    #[error("token signature invalid")]
    SignatureInvalid,
    #[error("token expired")]
    Expired,
    #[error("refresh token replay detected")]
    ReplayDetected,
    #[error("session revoked")]
    SessionRevoked,
    #[error("session registry conflict")]
    Conflict,
    #[error("user already exists")]
    UserExists,
    #[error("registration closed")]
    RegistrationClosed,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Errors that must surface to clients as a plain "unauthenticated".
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::Malformed
                | AuthError::SignatureInvalid
                | AuthError::Expired
                | AuthError::ReplayDetected
                | AuthError::SessionRevoked
                | AuthError::Conflict
        )
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub identifier: String,
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub identifier: String,
    pub secret: String,
}

/// What a client needs to know before offering first-run setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapStatus {
    pub account_exists: bool,
    pub registration_open: bool,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub tokens: AuthTokens,
}

pub trait TokenCodec: Send + Sync {
    fn issue_access_token(&self, user: UserId) -> Result<(AccessToken, DateTime<Utc>), AuthError>;

    /// The token expires at `session.expires_at` or one refresh lifetime from
    /// now, whichever comes first.
    fn issue_refresh_token(
        &self,
        user: UserId,
        session: &Session,
        token_id: &str,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError>;

    fn validate_access_token(&self, token: &AccessToken) -> Result<VerifiedAccess, AuthError>;

    fn validate_refresh_token(&self, token: &RefreshToken) -> Result<VerifiedRefresh, AuthError>;

    fn refresh_ttl(&self) -> Duration;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Unknown identifiers and wrong secrets fail identically.
    async fn verify(&self, identifier: &str, secret: &str) -> Result<UserId, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError>;
    async fn bootstrap_status(&self) -> Result<BootstrapStatus, AuthError>;
    async fn login(&self, request: LoginInput) -> Result<IssuedSession, AuthError>;
    async fn verify_access_token(&self, token: &str) -> Result<VerifiedAccess, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<IssuedSession, AuthError>;
    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError>;
}
