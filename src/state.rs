use std::sync::Arc;

use crate::config::Config;
use crate::crypto::aes::SecureKey;
use crate::crypto::engine::KeySource;
use crate::error::Result;
use crate::services::sessions::SessionManager;
use crate::store::open_store;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The session manager shared by every request.
    pub sessions: Arc<SessionManager>,
    /// The application's configuration.
    pub config: Config,
}

impl AppState {
    /// Opens the configured store and builds the session manager.
    pub async fn new(config: &Config) -> Result<Self> {
        let store = open_store(config).await?;

        let source = match &config.master_key {
            Some(key) => KeySource::Provided(SecureKey::from_slice(key)?),
            None => KeySource::Store,
        };

        let sessions = SessionManager::open(store, source, config.sessions.clone()).await?;
        tracing::info!(
            "✅ Session manager initialized (max {} sessions per user)",
            config.sessions.max_sessions_per_user
        );

        Ok(Self::from_manager(Arc::new(sessions), config.clone()))
    }

    /// Wraps an already built manager.
    pub fn from_manager(sessions: Arc<SessionManager>, config: Config) -> Self {
        Self { sessions, config }
    }
}
