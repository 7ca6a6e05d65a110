use chrono::{DateTime, Utc};

use crate::{
    crypto::token,
    error::Result,
    models::session::Session,
    repositories::session::SessionRepository,
};

/// Caps the number of live sessions a user may hold.
#[derive(Clone)]
pub struct SessionLimiter {
    repo: SessionRepository,
    max_sessions: usize,
}

impl SessionLimiter {
    /// Creates a limiter allowing `max_sessions` (at least one) per user.
    pub fn new(repo: SessionRepository, max_sessions: usize) -> Self {
        Self {
            repo,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Makes room for one more session of `user_id`.
    ///
    /// Evicts the least recently active sessions until fewer than the cap remain and
    /// returns the evicted ids. The caller must hold the user's lock until the new
    /// session is written.
    pub async fn enforce(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut live: Vec<Session> = self
            .repo
            .find_by_user(user_id)
            .await?
            .into_iter()
            .filter(|s| s.is_active && !s.is_expired_at(now))
            .collect();

        if live.len() < self.max_sessions {
            return Ok(Vec::new());
        }

        live.sort_by(|a, b| {
            a.last_activity
                .cmp(&b.last_activity)
                .then(a.created_at.cmp(&b.created_at))
        });

        let excess = live.len() - self.max_sessions + 1;
        let mut evicted = Vec::with_capacity(excess);
        for session in live.into_iter().take(excess) {
            let session_id = session.session_id.clone();
            let last_activity = session.last_activity;
            self.repo.retire(session).await?;
            tracing::info!(
                "🚪 Evicted session {} of user {} (last active {})",
                token::log_prefix(&session_id),
                user_id,
                last_activity
            );
            evicted.push(session_id);
        }

        Ok(evicted)
    }
}
