use crate::application_port::{AuthError, CredentialHasher, CredentialVerifier};
use crate::domain_model::UserId;
use crate::domain_port::CredentialRepo;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use std::sync::Arc;
use tracing::warn;

/// Argon2id with the crate defaults: 19 MiB memory, 2 passes, 1 lane,
/// 32-byte output.
pub struct Argon2PasswordHasher;

fn hash_blocking(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::InternalError(e.to_string()))?
        .to_string();
    Ok(hash)
}

fn verify_blocking(password: &str, password_hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| AuthError::InternalError(format!("invalid PHC hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::InternalError(format!("verify error: {}", e))),
    }
}

#[async_trait::async_trait]
impl CredentialHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hash_blocking(&password))
            .await
            .map_err(|e| AuthError::InternalError(e.to_string()))?
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();
        tokio::task::spawn_blocking(move || verify_blocking(&password, &password_hash))
            .await
            .map_err(|e| AuthError::InternalError(e.to_string()))?
    }
}

pub struct RealCredentialVerifier {
    credential_repo: Arc<dyn CredentialRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    // verified against when the identifier is unknown, so both failure
    // paths pay for one Argon2 run
    decoy_hash: String,
}

impl RealCredentialVerifier {
    pub async fn try_new(
        credential_repo: Arc<dyn CredentialRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
    ) -> Result<Self, AuthError> {
        let decoy_hash = credential_hasher
            .hash_password(&uuid::Uuid::new_v4().to_string())
            .await?;
        Ok(Self {
            credential_repo,
            credential_hasher,
            decoy_hash,
        })
    }
}

#[async_trait::async_trait]
impl CredentialVerifier for RealCredentialVerifier {
    async fn verify(&self, identifier: &str, secret: &str) -> Result<UserId, AuthError> {
        if identifier.is_empty() || secret.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let record = self.credential_repo.find_by_identifier(identifier).await?;
        let password_hash = record
            .as_ref()
            .map(|r| r.password_hash.as_str())
            .unwrap_or(self.decoy_hash.as_str());

        let matches = self
            .credential_hasher
            .verify_password(secret, password_hash)
            .await?;

        match record {
            Some(rec) if matches && rec.is_active => Ok(rec.user_id),
            _ => {
                warn!(identifier, "credential verification failed");
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_port::CredentialRecord;
    use crate::infra_memory::MemoryCredentialRepo;
    use chrono::Utc;

    async fn verifier_with(records: Vec<(&str, &str, bool)>) -> (RealCredentialVerifier, Vec<UserId>) {
        let repo = Arc::new(MemoryCredentialRepo::new());
        let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
        let mut ids = Vec::new();
        for (identifier, secret, is_active) in records {
            let user_id = UserId::generate();
            ids.push(user_id);
            repo.create(&CredentialRecord {
                user_id,
                identifier: identifier.to_string(),
                password_hash: hasher.hash_password(secret).await.unwrap(),
                is_active,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }
        let verifier = RealCredentialVerifier::try_new(repo, hasher).await.unwrap();
        (verifier, ids)
    }

    #[tokio::test]
    async fn hash_then_verify() {
        let hasher = Argon2PasswordHasher;
        let hash = hasher.hash_password("correct horse").await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify_password("correct horse", &hash).await.unwrap());
        assert!(!hasher.verify_password("wrong horse", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_hash_is_an_internal_error() {
        let hasher = Argon2PasswordHasher;
        assert!(matches!(
            hasher.verify_password("secret", "not-a-phc-string").await,
            Err(AuthError::InternalError(_))
        ));
    }

    #[tokio::test]
    async fn correct_secret_yields_identity() {
        let (verifier, ids) = verifier_with(vec![("alice", "correct", true)]).await;
        assert_eq!(verifier.verify("alice", "correct").await.unwrap(), ids[0]);
    }

    #[tokio::test]
    async fn wrong_secret_and_unknown_identifier_fail_alike() {
        let (verifier, _) = verifier_with(vec![("alice", "correct", true)]).await;

        let wrong = verifier.verify("alice", "incorrect").await.unwrap_err();
        let unknown = verifier.verify("mallory", "correct").await.unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn empty_input_and_inactive_accounts_are_rejected() {
        let (verifier, _) = verifier_with(vec![("bob", "hunter22", false)]).await;
        assert!(matches!(
            verifier.verify("bob", "hunter22").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            verifier.verify("", "hunter22").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            verifier.verify("bob", "").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
