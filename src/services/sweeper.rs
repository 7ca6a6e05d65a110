use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::services::sessions::SessionManager;

/// Background task deleting expired sessions on a fixed period.
///
/// Owns its task: call [`shutdown`](Self::shutdown) to stop it and wait for an
/// in-flight pass to finish.
pub struct ExpirationSweeper {
    handle: JoinHandle<()>,
    token: CancellationToken,
}

impl ExpirationSweeper {
    /// Starts sweeping every `period`. The first pass runs one period from now.
    pub fn spawn(manager: Arc<SessionManager>, period: Duration) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        tracing::info!("🧹 Running scheduled sweep of expired sessions...");
                        match manager.sweep_expired().await {
                            Ok(removed) => {
                                tracing::info!("✅ Sweep completed: {} sessions removed", removed);
                            }
                            Err(e) => {
                                tracing::error!("❌ Sweep failed: {}", e);
                            }
                        }
                    }
                }
            }

            tracing::info!("🛑 Expiration sweeper stopped");
        });

        Self { handle, token }
    }

    /// A token that stops the sweeper when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stops the sweeper and waits for it to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!("❌ Sweeper task ended abnormally: {}", e);
        }
    }
}
