use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::UserId;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::SessionSweeper;
use crate::settings::{Credentials, Settings};
use anyhow::{Context, anyhow};
use argon2::PasswordHash;
use jsonwebtoken::Algorithm;
use sqlx::{MySql, Pool};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pools: Vec<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let mut pools = Vec::new();

        let algorithm = Algorithm::from_str(&settings.token.algorithm)
            .map_err(|e| anyhow!("token.algorithm {}: {}", settings.token.algorithm, e))?;
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtTokenCodec::new(
            JwtConfig {
                issuer: settings.token.issuer.clone(),
                audience: settings.token.audience.clone(),
                algorithm,
                access_ttl: Duration::from_secs(settings.token.access_ttl_secs),
                refresh_ttl: Duration::from_secs(settings.token.refresh_ttl_secs),
                signing_key: settings.token.signing_key.clone().into_bytes(),
                refresh_signing_key: settings.token.refresh_signing_key.clone().into_bytes(),
            },
            clock.clone(),
        )?);

        let session_registry: Arc<dyn SessionRegistry> = match settings.session.backend.as_str()
        {
            "memory" => Arc::new(MemorySessionRegistry::new(clock.clone())),
            "redis" => {
                let dsn = settings
                    .session
                    .redis_dsn
                    .as_deref()
                    .context("session.redis_dsn is required for the redis backend")?;
                let redis_manager = redis::Client::open(dsn)?
                    .get_connection_manager()
                    .await?;
                Arc::new(RedisSessionRegistry::new(
                    redis_manager,
                    settings.session.key_prefix.clone(),
                    clock.clone(),
                ))
            }
            "mysql" => {
                let dsn = settings
                    .session
                    .mysql_dsn
                    .as_deref()
                    .context("session.mysql_dsn is required for the mysql backend")?;
                let pool = Pool::<MySql>::connect(dsn).await?;
                pools.push(pool.clone());
                Arc::new(MySqlSessionRegistry::new(pool, clock.clone()))
            }
            other => return Err(anyhow!("Unknown session backend: {}", other)),
        };

        let credential_repo: Arc<dyn CredentialRepo> =
            match settings.credentials.backend.as_str() {
                "memory" => {
                    let repo = Arc::new(MemoryCredentialRepo::new());
                    seed_credentials(repo.as_ref(), &settings.credentials, clock.as_ref()).await?;
                    repo
                }
                "mysql" => {
                    let dsn = settings
                        .credentials
                        .mysql_dsn
                        .as_deref()
                        .context("credentials.mysql_dsn is required for the mysql backend")?;
                    let pool = Pool::<MySql>::connect(dsn).await?;
                    pools.push(pool.clone());
                    Arc::new(MySqlCredentialRepo::new(pool))
                }
                other => return Err(anyhow!("Unknown credentials backend: {}", other)),
            };

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
        let credential_verifier: Arc<dyn CredentialVerifier> = Arc::new(
            RealCredentialVerifier::try_new(credential_repo.clone(), credential_hasher.clone())
                .await?,
        );

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            credential_repo,
            credential_hasher,
            credential_verifier,
            token_codec,
            session_registry.clone(),
            clock.clone(),
            settings.credentials.open_registration,
        ));

        // region runtime infra
        let cancel = CancellationToken::new();

        let sweeper_handle = if settings.session.sweep_interval_secs > 0 {
            let sweeper = SessionSweeper::new(
                session_registry,
                clock,
                Duration::from_secs(settings.session.sweep_interval_secs),
                settings.session.sweep_batch,
                cancel.clone(),
            );
            Some(tokio::spawn(async move { sweeper.run().await }))
        } else {
            None
        };

        // endregion

        info!(
            session_backend = %settings.session.backend,
            credentials_backend = %settings.credentials.backend,
            "server started"
        );

        Ok(Self {
            auth_service,
            sweeper_handle: Mutex::new(sweeper_handle),
            cancel,
            pools,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = self.sweeper_handle.lock().ok().and_then(|mut lock| lock.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }

        for pool in &self.pools {
            pool.close().await;
        }
    }
}

async fn seed_credentials(
    repo: &dyn CredentialRepo,
    credentials: &Credentials,
    clock: &dyn Clock,
) -> anyhow::Result<()> {
    for seed in &credentials.seed {
        PasswordHash::new(&seed.password_hash)
            .map_err(|e| anyhow!("seed {}: invalid PHC hash: {}", seed.identifier, e))?;
        let record = CredentialRecord {
            user_id: UserId::generate(),
            identifier: seed.identifier.clone(),
            password_hash: seed.password_hash.clone(),
            is_active: true,
            created_at: clock.now(),
        };
        repo.create(&record).await?;
        debug!(identifier = %seed.identifier, user_id = %record.user_id, "seeded credential");
    }
    Ok(())
}
