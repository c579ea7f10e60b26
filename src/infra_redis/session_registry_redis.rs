use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::collections::HashMap;
use std::sync::Arc;

const SESSION_CREATE: &str = include_str!("session_create.lua");
const SESSION_ROTATE: &str = include_str!("session_rotate.lua");
const SESSION_REVOKE: &str = include_str!("session_revoke.lua");

// keys outlive the session by this much so a missed sweep does not leak
const KEY_GRACE: Duration = Duration::days(1);

/// Sessions as hashes under `{prefix}:session:{id}`, indexed by expiry in the
/// sorted set `{prefix}:expiry`. Creation, rotation and revocation each run
/// as one Lua script.
pub struct RedisSessionRegistry {
    conn: ConnectionManager,
    prefix: String,
    create_script: Script,
    rotate_script: Script,
    revoke_script: Script,
    clock: Arc<dyn Clock>,
}

impl RedisSessionRegistry {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        RedisSessionRegistry {
            conn,
            prefix: prefix.into(),
            create_script: Script::new(SESSION_CREATE),
            rotate_script: Script::new(SESSION_ROTATE),
            revoke_script: Script::new(SESSION_REVOKE),
            clock,
        }
    }

    fn key(&self, id: SessionId) -> String {
        format!("{}:session:{}", self.prefix, id)
    }

    fn expiry_key(&self) -> String {
        format!("{}:expiry", self.prefix)
    }
}

fn store_err(e: redis::RedisError) -> AuthError {
    AuthError::Store(e.to_string())
}

fn millis(fields: &HashMap<String, String>, name: &str) -> Result<DateTime<Utc>, AuthError> {
    fields
        .get(name)
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| AuthError::Store(format!("session field {} missing or invalid", name)))
}

fn session_from_fields(
    id: SessionId,
    fields: &HashMap<String, String>,
) -> Result<Option<Session>, AuthError> {
    if fields.is_empty() {
        return Ok(None);
    }
    let user_id = fields
        .get("user")
        .and_then(|v| v.parse::<UserId>().ok())
        .ok_or_else(|| AuthError::Store("session field user missing or invalid".into()))?;
    let fingerprint = fields
        .get("fp")
        .map(|v| Fingerprint::from_stored(v.as_str()))
        .ok_or_else(|| AuthError::Store("session field fp missing".into()))?;

    Ok(Some(Session {
        id,
        user_id,
        fingerprint,
        created_at: millis(fields, "created")?,
        last_rotated_at: millis(fields, "rotated")?,
        expires_at: millis(fields, "expires")?,
        revoked: fields.get("revoked").is_some_and(|v| v == "1"),
    }))
}

fn zrange_count(limit: usize) -> isize {
    isize::try_from(limit).unwrap_or(isize::MAX)
}

fn pairs_to_map(flat: Vec<String>) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(flat.len() / 2);
    let mut it = flat.into_iter();
    while let (Some(k), Some(v)) = (it.next(), it.next()) {
        map.insert(k, v);
    }
    map
}

#[async_trait::async_trait]
impl SessionRegistry for RedisSessionRegistry {
    async fn create(
        &self,
        user_id: UserId,
        fingerprint: &Fingerprint,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, AuthError> {
        let session = Session::new(user_id, fingerprint.clone(), self.clock.now(), expires_at);
        let mut conn = self.conn.clone();

        // one script, so a session is either fully written or absent
        let created: i64 = self
            .create_script
            .key(self.key(session.id))
            .key(self.expiry_key())
            .arg(session.user_id.to_string())
            .arg(session.fingerprint.as_str())
            .arg(session.created_at.timestamp_millis())
            .arg(session.last_rotated_at.timestamp_millis())
            .arg(session.expires_at.timestamp_millis())
            .arg(session.id.to_string())
            .arg((session.expires_at + KEY_GRACE).timestamp())
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;
        if created != 1 {
            return Err(AuthError::Conflict);
        }

        Ok(session)
    }

    async fn get(&self, session_id: SessionId) -> Result<Option<Session>, AuthError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(self.key(session_id))
            .await
            .map_err(store_err)?;
        session_from_fields(session_id, &fields)
    }

    async fn rotate(
        &self,
        session_id: SessionId,
        old: &Fingerprint,
        new: &Fingerprint,
    ) -> Result<RotateOutcome, AuthError> {
        let mut conn = self.conn.clone();
        let (status, flat): (i64, Vec<String>) = self
            .rotate_script
            .key(self.key(session_id))
            .arg(old.as_str())
            .arg(new.as_str())
            .arg(self.clock.now().timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;

        match status {
            1 => {
                let session = session_from_fields(session_id, &pairs_to_map(flat))?
                    .ok_or_else(|| AuthError::Store("rotated session vanished".into()))?;
                Ok(RotateOutcome::Rotated(session))
            }
            0 => Ok(RotateOutcome::Conflict),
            -1 => Ok(RotateOutcome::Inactive),
            other => Err(AuthError::Store(format!(
                "unknown rotate script status {}",
                other
            ))),
        }
    }

    async fn revoke(&self, session_id: SessionId) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        let _: i64 = self
            .revoke_script
            .key(self.key(session_id))
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn is_active(&self, session_id: SessionId) -> Result<bool, AuthError> {
        let mut conn = self.conn.clone();
        let (revoked, expires): (Option<String>, Option<i64>) = redis::cmd("HMGET")
            .arg(self.key(session_id))
            .arg("revoked")
            .arg("expires")
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;

        let Some(expires) = expires else {
            return Ok(false);
        };
        let not_revoked = revoked.as_deref() != Some("1");
        Ok(not_revoked && expires > self.clock.now().timestamp_millis())
    }

    async fn list_expired(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SessionId>, AuthError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .zrangebyscore_limit(
                self.expiry_key(),
                "-inf",
                now.timestamp_millis(),
                0,
                zrange_count(limit),
            )
            .await
            .map_err(store_err)?;

        ids.iter()
            .map(|s| {
                s.parse::<SessionId>()
                    .map_err(|e| AuthError::Store(format!("bad session id {}: {}", s, e)))
            })
            .collect()
    }

    async fn purge(&self, session_ids: &[SessionId]) -> Result<u64, AuthError> {
        if session_ids.is_empty() {
            return Ok(0);
        }
        let keys: Vec<String> = session_ids.iter().map(|id| self.key(*id)).collect();
        let members: Vec<String> = session_ids.iter().map(|id| id.to_string()).collect();

        let mut conn = self.conn.clone();
        let (removed, _): (u64, i64) = redis::pipe()
            .atomic()
            .del(&keys)
            .zrem(self.expiry_key(), &members)
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(removed)
    }
}


// Run with `AUTHGATE_TEST_REDIS_DSN=redis://127.0.0.1:6379 cargo test -- --ignored`.
#[cfg(test)]
mod redis_tests {
    use super::*;
    use crate::application_impl::ManualClock;

    async fn registry() -> Option<(Arc<RedisSessionRegistry>, ConnectionManager)> {
        let Ok(dsn) = std::env::var("AUTHGATE_TEST_REDIS_DSN") else {
            eprintln!("AUTHGATE_TEST_REDIS_DSN unset, skipping");
            return None;
        };
        let conn = redis::Client::open(dsn)
            .unwrap()
            .get_connection_manager()
            .await
            .unwrap();
        let prefix = format!("authgate-test:{}", uuid::Uuid::new_v4());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let registry = RedisSessionRegistry::new(conn.clone(), prefix, clock);
        Some((Arc::new(registry), conn))
    }

    #[tokio::test]
    #[ignore]
    async fn create_writes_hash_index_and_ttl_together() {
        let Some((registry, mut conn)) = registry().await else {
            return;
        };
        let session = registry
            .create(UserId::generate(), &Fingerprint::of("a"), Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let ttl: i64 = conn.ttl(registry.key(session.id)).await.unwrap();
        assert!(ttl > 0);
        let score: Option<i64> = conn
            .zscore(registry.expiry_key(), session.id.to_string())
            .await
            .unwrap();
        assert_eq!(score, Some(session.expires_at.timestamp_millis()));
        let stored = registry.get(session.id).await.unwrap().unwrap();
        assert_eq!(stored.user_id, session.user_id);
        assert_eq!(stored.fingerprint, session.fingerprint);
        assert_eq!(
            stored.expires_at.timestamp_millis(),
            session.expires_at.timestamp_millis()
        );
        assert!(!stored.revoked);
    }

    #[tokio::test]
    #[ignore]
    async fn rotate_maps_every_status() {
        let Some((registry, _)) = registry().await else {
            return;
        };
        let (fp1, fp2) = (Fingerprint::of("one"), Fingerprint::of("two"));
        let session = registry
            .create(UserId::generate(), &fp1, Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        assert!(matches!(
            registry.rotate(session.id, &fp1, &fp2).await.unwrap(),
            RotateOutcome::Rotated(s) if s.fingerprint == fp2
        ));
        assert!(matches!(
            registry.rotate(session.id, &fp1, &fp2).await.unwrap(),
            RotateOutcome::Conflict
        ));

        registry.revoke(session.id).await.unwrap();
        assert!(matches!(
            registry.rotate(session.id, &fp2, &fp1).await.unwrap(),
            RotateOutcome::Inactive
        ));
        assert!(matches!(
            registry.rotate(SessionId::generate(), &fp1, &fp2).await.unwrap(),
            RotateOutcome::Inactive
        ));
    }

    #[tokio::test]
    #[ignore]
    async fn partial_hash_is_inactive_not_an_error() {
        let Some((registry, mut conn)) = registry().await else {
            return;
        };
        let id = SessionId::generate();
        let _: () = conn
            .hset(registry.key(id), "user", UserId::generate().to_string())
            .await
            .unwrap();

        assert!(matches!(
            registry
                .rotate(id, &Fingerprint::of("a"), &Fingerprint::of("b"))
                .await
                .unwrap(),
            RotateOutcome::Inactive
        ));
        let _: () = conn.del(registry.key(id)).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore]
    async fn concurrent_rotations_have_one_winner() {
        let Some((registry, _)) = registry().await else {
            return;
        };
        let old = Fingerprint::of("shared");
        let session = registry
            .create(UserId::generate(), &old, Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let session_id = session.id;
        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = registry.clone();
            let old = old.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .rotate(session_id, &old, &Fingerprint::of(&format!("next-{}", i)))
                    .await
                    .unwrap()
            }));
        }
        let mut rotated = 0;
        for handle in handles {
            if let RotateOutcome::Rotated(_) = handle.await.unwrap() {
                rotated += 1;
            }
        }
        assert_eq!(rotated, 1);
    }

    #[tokio::test]
    #[ignore]
    async fn expired_sessions_are_listed_and_purged() {
        let Some((registry, _)) = registry().await else {
            return;
        };
        let now = Utc::now();
        let past = registry
            .create(UserId::generate(), &Fingerprint::of("p"), now - Duration::minutes(1))
            .await
            .unwrap();
        let live = registry
            .create(UserId::generate(), &Fingerprint::of("l"), now + Duration::hours(1))
            .await
            .unwrap();

        let expired = registry.list_expired(now, 10).await.unwrap();
        assert_eq!(expired, vec![past.id]);
        assert_eq!(registry.purge(&expired).await.unwrap(), 1);
        assert!(registry.get(past.id).await.unwrap().is_none());
        assert!(registry.get(live.id).await.unwrap().is_some());
        registry.purge(&[live.id]).await.unwrap();
    }
}
