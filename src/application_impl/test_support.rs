use crate::application_impl::*;
use crate::application_port::*;
use crate::infra_memory::*;
use chrono::{TimeZone, Utc};
use jsonwebtoken::Algorithm;
use std::sync::Arc;

pub(crate) struct Fixture {
    pub service: Arc<RealAuthService>,
    pub registry: Arc<MemorySessionRegistry>,
    pub clock: Arc<ManualClock>,
}

/// In-memory wiring with a manual clock, open registration and a registered
/// `alice`/`correct`.
pub(crate) async fn fixture() -> Fixture {
    let f = build(true).await;
    f.service
        .register(RegisterInput {
            identifier: "alice".into(),
            secret: "correct".into(),
        })
        .await
        .unwrap();
    f
}

/// No accounts yet, and only the first one may register.
pub(crate) async fn closed_fixture() -> Fixture {
    build(false).await
}

async fn build(open_registration: bool) -> Fixture {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    let repo = Arc::new(MemoryCredentialRepo::new());
    let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
    let verifier = Arc::new(
        RealCredentialVerifier::try_new(repo.clone(), hasher.clone())
            .await
            .unwrap(),
    );
    let codec = Arc::new(
        JwtTokenCodec::new(
            JwtConfig {
                issuer: "authgate".into(),
                audience: "authgate-clients".into(),
                algorithm: Algorithm::HS256,
                access_ttl: std::time::Duration::from_secs(15 * 60),
                refresh_ttl: std::time::Duration::from_secs(7 * 24 * 60 * 60),
                signing_key: b"access-key".to_vec(),
                refresh_signing_key: b"refresh-key".to_vec(),
            },
            clock.clone(),
        )
        .unwrap(),
    );
    let registry = Arc::new(MemorySessionRegistry::new(clock.clone()));
    let service = Arc::new(RealAuthService::new(
        repo,
        hasher,
        verifier,
        codec,
        registry.clone(),
        clock.clone(),
        open_registration,
    ));
    Fixture {
        service,
        registry,
        clock,
    }
}
