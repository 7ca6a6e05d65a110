//! Session lifecycle: create, validate, refresh, destroy, and the current-session pointer.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    clock::{Clock, SystemClock},
    config::SessionSettings,
    crypto::{
        engine::{CryptoEngine, KeySource},
        token,
    },
    error::{AppError, Result},
    models::session::{Identity, Session, SessionMeta},
    repositories::{
        session::{Lookup, SessionRepository},
        vault::PerUserVault,
    },
    services::{current::CurrentSessionPointer, limiter::SessionLimiter, user_locks::UserLocks},
    store::KeyValueStore,
    validation::session::{sanitize_meta, validate_identity},
};

/// Why a session id did not resolve to a live session.
///
/// Callers only ever see "no session"; the variant exists for logging and tests.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRejection {
    #[error("malformed token")]
    Malformed,
    #[error("session not found")]
    NotFound,
    #[error("session expired")]
    Expired,
    #[error("session record corrupt or tampered")]
    CorruptOrTampered,
    #[error("session inactive")]
    Inactive,
}

/// The session manager. Construct once at startup and share behind an `Arc`.
pub struct SessionManager {
    repo: SessionRepository,
    vault: PerUserVault,
    limiter: SessionLimiter,
    store: Arc<dyn KeyValueStore>,
    current: CurrentSessionPointer,
    clock: Arc<dyn Clock>,
    locks: UserLocks,
    settings: SessionSettings,
}

impl SessionManager {
    /// Builds a manager over `store` using an already resolved crypto engine.
    pub fn new(store: Arc<dyn KeyValueStore>, crypto: CryptoEngine, settings: SessionSettings) -> Self {
        let repo = SessionRepository::new(store.clone(), crypto.clone());
        Self {
            limiter: SessionLimiter::new(repo.clone(), settings.max_sessions_per_user),
            vault: PerUserVault::new(store.clone(), crypto),
            current: CurrentSessionPointer::default_context(store.clone()),
            repo,
            store,
            clock: Arc::new(SystemClock),
            locks: UserLocks::new(),
            settings,
        }
    }

    /// Resolves the data key from `source`, then builds the manager.
    pub async fn open(
        store: Arc<dyn KeyValueStore>,
        source: KeySource,
        settings: SessionSettings,
    ) -> Result<Self> {
        let crypto = CryptoEngine::from_source(store.as_ref(), source).await?;
        Ok(Self::new(store, crypto, settings))
    }

    /// Replaces the clock used for every expiry decision.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Direct access to the record repository.
    pub fn repository(&self) -> &SessionRepository {
        &self.repo
    }

    /// Direct access to the per-user vault.
    pub fn vault(&self) -> &PerUserVault {
        &self.vault
    }

    /// A vault handle scoped to the owner of `session`.
    ///
    /// Writes through the handle are refused once `session` is no longer live.
    pub fn vault_for(&self, session: &Session) -> SessionVault<'_> {
        SessionVault {
            manager: self,
            session_id: session.session_id.clone(),
            user_id: session.user_id.clone(),
        }
    }

    /// Creates a session for a verified identity and returns its token.
    ///
    /// The user's oldest sessions are evicted first if the new one would exceed the
    /// per-user cap.
    pub async fn create_session(&self, identity: &Identity, meta: SessionMeta) -> Result<String> {
        validate_identity(identity)?;

        let now = self.clock.now();
        let timeout = if meta.remember_me {
            self.settings.extended_timeout
        } else {
            self.settings.default_timeout
        };
        let (ip_address, user_agent) = sanitize_meta(&meta);

        let session = Session {
            session_id: token::generate_session_id(now),
            user_id: identity.id.clone(),
            email: identity.email.clone(),
            display_name: identity.name.clone(),
            created_at: now,
            last_activity: now,
            expires_at: now + timeout,
            ip_address,
            user_agent,
            is_active: true,
        };

        let _guard = self.locks.lock(&session.user_id).await;
        let evicted = self.limiter.enforce(&session.user_id, now).await?;
        self.repo.save(&session).await?;

        tracing::info!(
            "✅ Session {} created for user {} (remember_me={}, evicted={})",
            token::log_prefix(&session.session_id),
            session.user_id,
            meta.remember_me,
            evicted.len()
        );

        Ok(session.session_id)
    }

    /// Validates `session_id`, refreshing its activity timestamp.
    ///
    /// Every authorization failure is `Ok(None)`; only storage failures are errors.
    pub async fn validate_session(&self, session_id: &str) -> Result<Option<Session>> {
        match self.check_session(session_id).await? {
            Ok(session) => Ok(Some(session)),
            Err(rejection) => {
                tracing::debug!(
                    "Session {} rejected: {}",
                    token::log_prefix(session_id),
                    rejection
                );
                Ok(None)
            }
        }
    }

    /// Like [`validate_session`](Self::validate_session) but reports why a session was
    /// rejected. Expired, inactive and unreadable records are deleted on the way.
    pub async fn check_session(
        &self,
        session_id: &str,
    ) -> Result<std::result::Result<Session, SessionRejection>> {
        self.touch(session_id, true).await
    }

    /// Refreshes the activity timestamp of a live session. Returns whether it was live.
    ///
    /// Unlike validation this never deletes anything; dead records are left for
    /// validation or the sweeper.
    pub async fn update_activity(&self, session_id: &str) -> Result<bool> {
        Ok(self.touch(session_id, false).await?.is_ok())
    }

    async fn touch(
        &self,
        session_id: &str,
        purge: bool,
    ) -> Result<std::result::Result<Session, SessionRejection>> {
        if !token::is_well_formed(session_id) {
            return Ok(Err(SessionRejection::Malformed));
        }

        let user_id = match self.repo.find(session_id).await? {
            Lookup::Found(session) => session.user_id,
            Lookup::Missing => return Ok(Err(SessionRejection::NotFound)),
            Lookup::Unreadable(reason) => {
                tracing::warn!(
                    "⚠️  Session {} unreadable ({}), {}",
                    token::log_prefix(session_id),
                    reason,
                    if purge { "purging" } else { "ignoring" }
                );
                if purge {
                    self.repo.delete(session_id).await?;
                }
                return Ok(Err(SessionRejection::CorruptOrTampered));
            }
        };

        // Re-read under the lock: a concurrent destroy must not be undone by our write.
        let _guard = self.locks.lock(&user_id).await;
        let mut session = match self.repo.find(session_id).await? {
            Lookup::Found(session) => session,
            Lookup::Missing => return Ok(Err(SessionRejection::NotFound)),
            Lookup::Unreadable(_) => {
                if purge {
                    self.repo.delete(session_id).await?;
                }
                return Ok(Err(SessionRejection::CorruptOrTampered));
            }
        };

        let now = self.clock.now();
        let rejection = if !session.is_active {
            Some(SessionRejection::Inactive)
        } else if session.is_expired_at(now) {
            Some(SessionRejection::Expired)
        } else {
            None
        };

        if let Some(rejection) = rejection {
            if purge {
                self.repo.delete(session_id).await?;
                tracing::info!(
                    "🧹 Session {} of user {} removed: {}",
                    token::log_prefix(session_id),
                    session.user_id,
                    rejection
                );
            }
            return Ok(Err(rejection));
        }

        if now > session.last_activity {
            session.last_activity = now;
        }
        self.repo.save(&session).await?;
        Ok(Ok(session))
    }

    /// Deletes one session. The owner's vault is untouched. Idempotent.
    pub async fn destroy_session(&self, session_id: &str) -> Result<bool> {
        if !token::is_well_formed(session_id) {
            return Ok(false);
        }

        let user_id = match self.repo.find(session_id).await? {
            Lookup::Found(session) => session.user_id,
            Lookup::Missing => return Ok(false),
            Lookup::Unreadable(_) => return self.repo.delete(session_id).await,
        };

        let _guard = self.locks.lock(&user_id).await;
        let removed = match self.repo.find(session_id).await? {
            Lookup::Found(session) => self.repo.retire(session).await?,
            Lookup::Missing => false,
            Lookup::Unreadable(_) => self.repo.delete(session_id).await?,
        };

        if removed {
            tracing::info!("👋 Session {} destroyed", token::log_prefix(session_id));
        }
        Ok(removed)
    }

    /// Deletes every session of `user_id` and wipes the user's vault.
    ///
    /// Returns the number of sessions removed.
    pub async fn destroy_user_sessions(&self, user_id: &str) -> Result<usize> {
        let _guard = self.locks.lock(user_id).await;

        let mut removed = 0;
        for session in self.repo.find_by_user(user_id).await? {
            if self.repo.retire(session).await? {
                removed += 1;
            }
        }
        let entries = self.vault.wipe(user_id).await?;

        tracing::info!(
            "👋 All sessions of user {} destroyed: {} sessions, {} vault entries",
            user_id,
            removed,
            entries
        );
        Ok(removed)
    }

    /// Live sessions of `user_id`, most recently active first. Read-only.
    pub async fn list_user_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        let now = self.clock.now();
        let mut sessions: Vec<Session> = self
            .repo
            .find_by_user(user_id)
            .await?
            .into_iter()
            .filter(|s| s.is_active && !s.is_expired_at(now))
            .collect();
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(sessions)
    }

    /// Runs one expiration pass. Returns how many records were deleted.
    ///
    /// Unreadable records are deleted too.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let scan = self.repo.scan().await?;
        let mut removed = 0;

        for session_id in &scan.unreadable {
            if self.repo.delete(session_id).await? {
                removed += 1;
            }
        }

        for session in scan.sessions {
            if !session.is_expired_at(self.clock.now()) {
                continue;
            }

            let _guard = self.locks.lock(&session.user_id).await;
            // Checked again: the record may have been deleted since the scan.
            if let Lookup::Found(current) = self.repo.find(&session.session_id).await? {
                if current.is_expired_at(self.clock.now())
                    && self.repo.delete(&current.session_id).await?
                {
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }

    /// The current-session pointer of a named context.
    pub fn context(&self, name: &str) -> SessionContext<'_> {
        SessionContext {
            manager: self,
            pointer: CurrentSessionPointer::named(self.store.clone(), name),
        }
    }

    fn default_context(&self) -> SessionContext<'_> {
        SessionContext {
            manager: self,
            pointer: self.current.clone(),
        }
    }

    /// The validated session the default context points to.
    pub async fn get_current_session(&self) -> Result<Option<Session>> {
        self.default_context().get_current_session().await
    }

    /// Points the default context at `session_id`.
    pub async fn set_current_session(&self, session_id: &str) -> Result<()> {
        self.default_context().set_current_session(session_id).await
    }

    /// Clears the default context and destroys the session it pointed to.
    pub async fn clear_current_session(&self) -> Result<()> {
        self.default_context().clear_current_session().await
    }

    /// The raw id held by the default context, without validation.
    pub async fn current_session_id(&self) -> Result<Option<String>> {
        self.current.get().await
    }
}

/// The current-session pointer of one execution context, bound to its manager.
pub struct SessionContext<'a> {
    manager: &'a SessionManager,
    pointer: CurrentSessionPointer,
}

impl SessionContext<'_> {
    /// Validates the pointed-to session. A stale pointer is cleared and yields `None`.
    pub async fn get_current_session(&self) -> Result<Option<Session>> {
        let Some(session_id) = self.pointer.get().await? else {
            return Ok(None);
        };

        match self.manager.validate_session(&session_id).await? {
            Some(session) => Ok(Some(session)),
            None => {
                self.pointer.clear().await?;
                Ok(None)
            }
        }
    }

    /// Points this context at `session_id`. Does not create or validate a session.
    pub async fn set_current_session(&self, session_id: &str) -> Result<()> {
        if !token::is_well_formed(session_id) {
            return Err(AppError::Validation("Malformed session id".to_string()));
        }
        self.pointer.set(session_id).await
    }

    /// Clears the pointer and destroys the session it held, if any.
    pub async fn clear_current_session(&self) -> Result<()> {
        if let Some(session_id) = self.pointer.clear().await? {
            self.manager.destroy_session(&session_id).await?;
        }
        Ok(())
    }

    pub async fn current_session_id(&self) -> Result<Option<String>> {
        self.pointer.get().await
    }
}

/// A vault handle bound to one session and its owner.
pub struct SessionVault<'a> {
    manager: &'a SessionManager,
    session_id: String,
    user_id: String,
}

impl SessionVault<'_> {
    /// The user this handle is bound to.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Stores `value` under `data_type` for the session's owner.
    ///
    /// Runs under the user's lock and re-reads the session first, so nothing written here
    /// can outlive a concurrent [`destroy_user_sessions`](SessionManager::destroy_user_sessions).
    /// Fails with [`AppError::Unauthorized`] once the session is gone, expired or inactive.
    pub async fn set<T: Serialize + ?Sized>(&self, data_type: &str, value: &T) -> Result<()> {
        let _guard = self.manager.locks.lock(&self.user_id).await;

        let live = match self.manager.repo.find(&self.session_id).await? {
            Lookup::Found(session) => {
                session.user_id == self.user_id
                    && session.is_active
                    && !session.is_expired_at(self.manager.clock.now())
            }
            Lookup::Missing | Lookup::Unreadable(_) => false,
        };

        if !live {
            tracing::warn!(
                "⚠️  Vault write refused: session {} of user {} is no longer live",
                token::log_prefix(&self.session_id),
                self.user_id
            );
            return Err(AppError::Unauthorized);
        }

        self.manager.vault.set(&self.user_id, data_type, value).await
    }

    pub async fn get<T: DeserializeOwned>(&self, data_type: &str) -> Result<Option<T>> {
        self.manager.vault.get(&self.user_id, data_type).await
    }

    pub async fn remove(&self, data_type: &str) -> Result<bool> {
        self.manager.vault.remove(&self.user_id, data_type).await
    }

    pub async fn data_types(&self) -> Result<Vec<String>> {
        self.manager.vault.data_types(&self.user_id).await
    }
}
