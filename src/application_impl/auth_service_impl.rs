use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

const IDENTIFIER_LEN: std::ops::RangeInclusive<usize> = 3..=31;
const SECRET_LEN: std::ops::RangeInclusive<usize> = 6..=255;

pub struct RealAuthService {
    credential_repo: Arc<dyn CredentialRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    credential_verifier: Arc<dyn CredentialVerifier>,
    token_codec: Arc<dyn TokenCodec>,
    session_registry: Arc<dyn SessionRegistry>,
    clock: Arc<dyn Clock>,
    // when false only the first account may register
    open_registration: bool,
    registration_gate: Mutex<()>,
}

impl RealAuthService {
    pub fn new(
        credential_repo: Arc<dyn CredentialRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        credential_verifier: Arc<dyn CredentialVerifier>,
        token_codec: Arc<dyn TokenCodec>,
        session_registry: Arc<dyn SessionRegistry>,
        clock: Arc<dyn Clock>,
        open_registration: bool,
    ) -> Self {
        Self {
            credential_repo,
            credential_hasher,
            credential_verifier,
            token_codec,
            session_registry,
            clock,
            open_registration,
            registration_gate: Mutex::new(()),
        }
    }

    fn validate_registration(identifier: &str, secret: &str) -> Result<(), AuthError> {
        if !IDENTIFIER_LEN.contains(&identifier.chars().count()) {
            return Err(AuthError::InvalidInput(format!(
                "identifier must be {} to {} characters",
                IDENTIFIER_LEN.start(),
                IDENTIFIER_LEN.end()
            )));
        }
        if !SECRET_LEN.contains(&secret.chars().count()) {
            return Err(AuthError::InvalidInput(format!(
                "secret must be {} to {} characters",
                SECRET_LEN.start(),
                SECRET_LEN.end()
            )));
        }
        Ok(())
    }

    #[inline]
    fn new_jti() -> String {
        Uuid::new_v4().to_string()
    }

    fn issue_tokens(
        &self,
        user_id: UserId,
        session: &Session,
        jti: &str,
    ) -> Result<AuthTokens, AuthError> {
        let (access_token, access_exp) = self.token_codec.issue_access_token(user_id)?;
        let (refresh_token, refresh_exp) =
            self.token_codec.issue_refresh_token(user_id, session, jti)?;
        Ok(AuthTokens {
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError> {
        let RegisterInput { identifier, secret } = request;

        // held until the first account is stored, so two bootstrap
        // registrations cannot both pass the check
        let _gate = if self.open_registration {
            None
        } else {
            let gate = self.registration_gate.lock().await;
            if self.credential_repo.any_exists().await? {
                warn!(identifier, "registration refused, an account already exists");
                return Err(AuthError::RegistrationClosed);
            }
            Some(gate)
        };

        Self::validate_registration(&identifier, &secret)?;

        if self
            .credential_repo
            .find_by_identifier(&identifier)
            .await?
            .is_some()
        {
            return Err(AuthError::UserExists);
        }

        let password_hash = self.credential_hasher.hash_password(&secret).await?;
        let record = CredentialRecord {
            user_id: UserId::generate(),
            identifier,
            password_hash,
            is_active: true,
            created_at: self.clock.now(),
        };
        self.credential_repo.create(&record).await?;

        info!(user_id = %record.user_id, "user registered");
        Ok(record.user_id)
    }

    async fn bootstrap_status(&self) -> Result<BootstrapStatus, AuthError> {
        let account_exists = self.credential_repo.any_exists().await?;
        Ok(BootstrapStatus {
            account_exists,
            registration_open: self.open_registration || !account_exists,
        })
    }

    async fn login(&self, request: LoginInput) -> Result<IssuedSession, AuthError> {
        let LoginInput { identifier, secret } = request;

        let user_id = self.credential_verifier.verify(&identifier, &secret).await?;

        let jti = Self::new_jti();
        let expires_at = self.clock.now() + self.token_codec.refresh_ttl();
        let session = self
            .session_registry
            .create(user_id, &Fingerprint::of(&jti), expires_at)
            .await?;

        let tokens = self.issue_tokens(user_id, &session, &jti)?;

        info!(user_id = %user_id, session_id = %session.id, "session opened");
        Ok(IssuedSession {
            user_id,
            session_id: session.id,
            tokens,
        })
    }

    async fn verify_access_token(&self, token: &str) -> Result<VerifiedAccess, AuthError> {
        self.token_codec
            .validate_access_token(&AccessToken(token.to_string()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<IssuedSession, AuthError> {
        let claims = self
            .token_codec
            .validate_refresh_token(&RefreshToken(refresh_token.to_string()))?;
        let session_id = claims.session_id;

        if !self.session_registry.is_active(session_id).await? {
            return Err(AuthError::SessionRevoked);
        }

        // Rotation: compare-and-swap the fingerprint
        let new_jti = Self::new_jti();
        let outcome = self
            .session_registry
            .rotate(
                session_id,
                &Fingerprint::of(&claims.token_id),
                &Fingerprint::of(&new_jti),
            )
            .await?;

        match outcome {
            RotateOutcome::Rotated(session) => {
                if session.user_id != claims.user_id {
                    self.session_registry.revoke(session_id).await?;
                    warn!(session_id = %session_id, "refresh token subject does not own session, revoked");
                    return Err(AuthError::Malformed);
                }
                let tokens = self.issue_tokens(session.user_id, &session, &new_jti)?;
                info!(user_id = %session.user_id, session_id = %session_id, "session rotated");
                Ok(IssuedSession {
                    user_id: session.user_id,
                    session_id,
                    tokens,
                })
            }
            RotateOutcome::Conflict => {
                self.session_registry.revoke(session_id).await?;
                warn!(
                    user_id = %claims.user_id,
                    session_id = %session_id,
                    "stale refresh token presented, session revoked"
                );
                Err(AuthError::ReplayDetected)
            }
            RotateOutcome::Inactive => Err(AuthError::SessionRevoked),
        }
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        match self
            .token_codec
            .validate_refresh_token(&RefreshToken(refresh_token.to_string()))
        {
            Ok(claims) => {
                self.session_registry.revoke(claims.session_id).await?;
                info!(session_id = %claims.session_id, "session closed");
                Ok(())
            }
            // refresh tokens never outlive their session
            Err(AuthError::Expired) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
