use crate::application_port::AuthError;
use crate::domain_port::{Clock, SessionRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Periodically purges sessions past their absolute lifetime. Expired
/// sessions are already refused by every registry read, so this only
/// reclaims storage.
pub struct SessionSweeper {
    session_registry: Arc<dyn SessionRegistry>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    batch: usize,
    cancellation_token: CancellationToken,
}

impl SessionSweeper {
    pub fn new(
        session_registry: Arc<dyn SessionRegistry>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        batch: usize,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            session_registry,
            clock,
            interval,
            batch,
            cancellation_token,
        }
    }

    async fn tick_once(&self) -> Result<u64, AuthError> {
        let expired = self
            .session_registry
            .list_expired(self.clock.now(), self.batch)
            .await?;
        if expired.is_empty() {
            return Ok(0);
        }
        self.session_registry.purge(&expired).await
    }

    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    info!("session sweeper shutting down...");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick_once().await {
                        Ok(0) => {}
                        Ok(purged) => debug!(purged, "expired sessions purged"),
                        Err(e) => error!("session sweep failed: {}", e),
                    }
                }
            }
        }
    }
}
