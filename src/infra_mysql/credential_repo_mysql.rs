use super::util::{is_dup_key, store_err, uuid_from_bytes};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlCredentialRepo {
    pool: MySqlPool,
}

impl MySqlCredentialRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlCredentialRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<CredentialRecord, AuthError> {
        let user_id_bytes: Vec<u8> = row.try_get("user_id").map_err(store_err)?;
        let user_id = UserId(uuid_from_bytes(&user_id_bytes)?);

        let identifier: String = row.try_get("identifier").map_err(store_err)?;
        let password_hash: String = row.try_get("password_hash").map_err(store_err)?;
        let is_active: bool = row.try_get("is_active").map_err(store_err)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(store_err)?;

        Ok(CredentialRecord {
            user_id,
            identifier,
            password_hash,
            is_active,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl CredentialRepo for MySqlCredentialRepo {
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<CredentialRecord>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT user_id, identifier, password_hash, is_active, created_at
FROM auth_credential
WHERE identifier = ?
"#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn any_exists(&self) -> Result<bool, AuthError> {
        let any: Option<i64> = sqlx::query_scalar("SELECT 1 FROM auth_credential LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(any.is_some())
    }

    async fn create(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        sqlx::query(
            r#"
INSERT INTO auth_credential (user_id, identifier, password_hash, is_active, created_at)
VALUES (?, ?, ?, ?, ?)
"#,
        )
        .bind(record.user_id.0.as_bytes().as_slice())
        .bind(&record.identifier)
        .bind(&record.password_hash)
        .bind(record.is_active)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                AuthError::UserExists
            } else {
                store_err(e)
            }
        })?;

        Ok(())
    }
}
