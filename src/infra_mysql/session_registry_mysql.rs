use super::util::{is_dup_key, store_err, uuid_from_bytes};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlConnection, MySqlPool, Row};
use std::sync::Arc;

const SELECT_SESSION: &str = r#"
SELECT session_id, user_id, fingerprint, created_at, last_rotated_at, expires_at, revoked
FROM auth_session
WHERE session_id = ?
"#;

/// Rotation is a single conditional `UPDATE` inside a transaction; the row
/// lock makes concurrent swaps of the same fingerprint mutually exclusive.
pub struct MySqlSessionRegistry {
    pool: MySqlPool,
    clock: Arc<dyn Clock>,
}

impl MySqlSessionRegistry {
    pub fn new(pool: MySqlPool, clock: Arc<dyn Clock>) -> Self {
        MySqlSessionRegistry { pool, clock }
    }

    fn row_to_session(row: MySqlRow) -> Result<Session, AuthError> {
        let session_id: Vec<u8> = row.try_get("session_id").map_err(store_err)?;
        let user_id: Vec<u8> = row.try_get("user_id").map_err(store_err)?;
        let fingerprint: String = row.try_get("fingerprint").map_err(store_err)?;

        Ok(Session {
            id: SessionId(uuid_from_bytes(&session_id)?),
            user_id: UserId(uuid_from_bytes(&user_id)?),
            fingerprint: Fingerprint::from_stored(fingerprint),
            created_at: row.try_get("created_at").map_err(store_err)?,
            last_rotated_at: row.try_get("last_rotated_at").map_err(store_err)?,
            expires_at: row.try_get("expires_at").map_err(store_err)?,
            revoked: row.try_get("revoked").map_err(store_err)?,
        })
    }

    async fn fetch(
        conn: &mut MySqlConnection,
        session_id: SessionId,
    ) -> Result<Option<Session>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(SELECT_SESSION)
            .bind(session_id.0.as_bytes().as_slice())
            .fetch_optional(conn)
            .await
            .map_err(store_err)?;
        row_opt.map(Self::row_to_session).transpose()
    }
}

#[async_trait::async_trait]
impl SessionRegistry for MySqlSessionRegistry {
    async fn create(
        &self,
        user_id: UserId,
        fingerprint: &Fingerprint,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, AuthError> {
        let session = Session::new(user_id, fingerprint.clone(), self.clock.now(), expires_at);

        sqlx::query(
            r#"
INSERT INTO auth_session
    (session_id, user_id, fingerprint, created_at, last_rotated_at, expires_at, revoked)
VALUES (?, ?, ?, ?, ?, ?, FALSE)
"#,
        )
        .bind(session.id.0.as_bytes().as_slice())
        .bind(session.user_id.0.as_bytes().as_slice())
        .bind(session.fingerprint.as_str())
        .bind(session.created_at)
        .bind(session.last_rotated_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                AuthError::Conflict
            } else {
                store_err(e)
            }
        })?;

        Ok(session)
    }

    async fn get(&self, session_id: SessionId) -> Result<Option<Session>, AuthError> {
        let mut conn = self.pool.acquire().await.map_err(store_err)?;
        Self::fetch(&mut *conn, session_id).await
    }

    async fn rotate(
        &self,
        session_id: SessionId,
        old: &Fingerprint,
        new: &Fingerprint,
    ) -> Result<RotateOutcome, AuthError> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let result = sqlx::query(
            r#"
UPDATE auth_session
SET fingerprint = ?, last_rotated_at = ?
WHERE session_id = ? AND fingerprint = ? AND revoked = FALSE AND expires_at > ?
"#,
        )
        .bind(new.as_str())
        .bind(now)
        .bind(session_id.0.as_bytes().as_slice())
        .bind(old.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;
        let swapped = result.rows_affected() == 1;

        let session = Self::fetch(&mut *tx, session_id).await?;
        tx.commit().await.map_err(store_err)?;

        Ok(match session {
            Some(session) if swapped => RotateOutcome::Rotated(session),
            Some(session) if session.is_active_at(now) => RotateOutcome::Conflict,
            _ => RotateOutcome::Inactive,
        })
    }

    async fn revoke(&self, session_id: SessionId) -> Result<(), AuthError> {
        sqlx::query("UPDATE auth_session SET revoked = TRUE WHERE session_id = ?")
            .bind(session_id.0.as_bytes().as_slice())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn is_active(&self, session_id: SessionId) -> Result<bool, AuthError> {
        let active: Option<i64> = sqlx::query_scalar(
            r#"
SELECT 1 FROM auth_session
WHERE session_id = ? AND revoked = FALSE AND expires_at > ?
"#,
        )
        .bind(session_id.0.as_bytes().as_slice())
        .bind(self.clock.now())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(active.is_some())
    }

    async fn list_expired(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SessionId>, AuthError> {
        let rows: Vec<Vec<u8>> = sqlx::query_scalar(
            r#"
SELECT session_id FROM auth_session
WHERE expires_at <= ?
ORDER BY expires_at
LIMIT ?
"#,
        )
        .bind(now)
        .bind(limit as u64)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.iter()
            .map(|bytes| uuid_from_bytes(bytes).map(SessionId))
            .collect()
    }

    async fn purge(&self, session_ids: &[SessionId]) -> Result<u64, AuthError> {
        let mut removed = 0;
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        for id in session_ids {
            removed += sqlx::query("DELETE FROM auth_session WHERE session_id = ?")
                .bind(id.0.as_bytes().as_slice())
                .execute(&mut *tx)
                .await
                .map_err(store_err)?
                .rows_affected();
        }
        tx.commit().await.map_err(store_err)?;
        Ok(removed)
    }
}
