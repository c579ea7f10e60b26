use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// Process-local registry. Each rotation runs under the shard write lock of
/// its session entry, which makes the fingerprint swap a compare-and-swap.
pub struct MemorySessionRegistry {
    sessions: DashMap<SessionId, Session>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            clock,
        }
    }
}

#[async_trait::async_trait]
impl SessionRegistry for MemorySessionRegistry {
    async fn create(
        &self,
        user_id: UserId,
        fingerprint: &Fingerprint,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, AuthError> {
        let session = Session::new(user_id, fingerprint.clone(), self.clock.now(), expires_at);
        match self.sessions.entry(session.id) {
            Entry::Occupied(_) => Err(AuthError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(session)
            }
        }
    }

    async fn get(&self, session_id: SessionId) -> Result<Option<Session>, AuthError> {
        Ok(self.sessions.get(&session_id).map(|s| s.value().clone()))
    }

    async fn rotate(
        &self,
        session_id: SessionId,
        old: &Fingerprint,
        new: &Fingerprint,
    ) -> Result<RotateOutcome, AuthError> {
        let now = self.clock.now();
        let Some(mut session) = self.sessions.get_mut(&session_id) else {
            return Ok(RotateOutcome::Inactive);
        };
        if !session.is_active_at(now) {
            return Ok(RotateOutcome::Inactive);
        }
        if session.fingerprint != *old {
            return Ok(RotateOutcome::Conflict);
        }
        session.fingerprint = new.clone();
        session.last_rotated_at = now;
        Ok(RotateOutcome::Rotated(session.clone()))
    }

    async fn revoke(&self, session_id: SessionId) -> Result<(), AuthError> {
        if let Some(mut session) = self.sessions.get_mut(&session_id) {
            session.revoked = true;
        }
        Ok(())
    }

    async fn is_active(&self, session_id: SessionId) -> Result<bool, AuthError> {
        let now = self.clock.now();
        Ok(self
            .sessions
            .get(&session_id)
            .is_some_and(|s| s.is_active_at(now)))
    }

    async fn list_expired(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SessionId>, AuthError> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.is_expired_at(now))
            .map(|s| *s.key())
            .take(limit)
            .collect())
    }

    async fn purge(&self, session_ids: &[SessionId]) -> Result<u64, AuthError> {
        let removed = session_ids
            .iter()
            .filter(|id| self.sessions.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::ManualClock;
    use chrono::Duration;

    fn registry() -> (Arc<MemorySessionRegistry>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (Arc::new(MemorySessionRegistry::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn create_then_rotate() {
        let (registry, clock) = registry();
        let fp1 = Fingerprint::of("one");
        let fp2 = Fingerprint::of("two");
        let session = registry
            .create(UserId::generate(), &fp1, clock.now() + Duration::days(1))
            .await
            .unwrap();
        assert!(registry.is_active(session.id).await.unwrap());

        clock.advance(Duration::minutes(5));
        match registry.rotate(session.id, &fp1, &fp2).await.unwrap() {
            RotateOutcome::Rotated(s) => {
                assert_eq!(s.fingerprint, fp2);
                assert_eq!(s.last_rotated_at, clock.now());
                assert_eq!(s.created_at, session.created_at);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        // the old fingerprint is gone
        assert!(matches!(
            registry.rotate(session.id, &fp1, &Fingerprint::of("three")).await.unwrap(),
            RotateOutcome::Conflict
        ));
        let stored = registry.get(session.id).await.unwrap().unwrap();
        assert_eq!(stored.fingerprint, fp2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_rotations_have_one_winner() {
        let (registry, clock) = registry();
        let old = Fingerprint::of("shared");
        let session = registry
            .create(UserId::generate(), &old, clock.now() + Duration::days(1))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..32 {
            let registry = registry.clone();
            let old = old.clone();
            handles.push(tokio::spawn(async move {
                let new = Fingerprint::of(&format!("next-{}", i));
                registry.rotate(session.id, &old, &new).await.unwrap()
            }));
        }

        let mut rotated = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                RotateOutcome::Rotated(_) => rotated += 1,
                RotateOutcome::Conflict => conflicts += 1,
                RotateOutcome::Inactive => panic!("session should stay active"),
            }
        }
        assert_eq!(rotated, 1);
        assert_eq!(conflicts, 31);
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_blocks_rotation() {
        let (registry, clock) = registry();
        let fp = Fingerprint::of("one");
        let session = registry
            .create(UserId::generate(), &fp, clock.now() + Duration::days(1))
            .await
            .unwrap();

        registry.revoke(session.id).await.unwrap();
        registry.revoke(session.id).await.unwrap();
        registry.revoke(SessionId::generate()).await.unwrap();

        assert!(!registry.is_active(session.id).await.unwrap());
        assert!(matches!(
            registry.rotate(session.id, &fp, &Fingerprint::of("two")).await.unwrap(),
            RotateOutcome::Inactive
        ));
    }

    #[tokio::test]
    async fn expired_sessions_are_inactive_and_listed() {
        let (registry, clock) = registry();
        let fp = Fingerprint::of("one");
        let short = registry
            .create(UserId::generate(), &fp, clock.now() + Duration::hours(1))
            .await
            .unwrap();
        let long = registry
            .create(UserId::generate(), &fp, clock.now() + Duration::days(1))
            .await
            .unwrap();

        assert!(registry.list_expired(clock.now(), 10).await.unwrap().is_empty());

        clock.advance(Duration::hours(1));
        assert!(!registry.is_active(short.id).await.unwrap());
        assert!(registry.is_active(long.id).await.unwrap());
        assert!(matches!(
            registry.rotate(short.id, &fp, &Fingerprint::of("two")).await.unwrap(),
            RotateOutcome::Inactive
        ));

        let expired = registry.list_expired(clock.now(), 10).await.unwrap();
        assert_eq!(expired, vec![short.id]);

        assert_eq!(registry.purge(&expired).await.unwrap(), 1);
        assert_eq!(registry.purge(&expired).await.unwrap(), 0);
        assert!(registry.get(short.id).await.unwrap().is_none());
        assert!(registry.get(long.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_session_is_inactive() {
        let (registry, _clock) = registry();
        let id = SessionId::generate();
        assert!(!registry.is_active(id).await.unwrap());
        assert!(matches!(
            registry
                .rotate(id, &Fingerprint::of("a"), &Fingerprint::of("b"))
                .await
                .unwrap(),
            RotateOutcome::Inactive
        ));
    }
}
