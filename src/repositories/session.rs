use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::{
    crypto::{aes::Unreadable, engine::CryptoEngine, token},
    error::Result,
    models::session::Session,
    store::KeyValueStore,
};

/// Key prefix shared by all session records.
pub const SESSION_PREFIX: &str = "session:";

/// Builds the store key for a session id.
pub fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, session_id)
}

/// The outcome of reading one session record.
#[derive(Debug)]
pub enum Lookup {
    Found(Session),
    Missing,
    /// The record exists but cannot be trusted.
    Unreadable(Unreadable),
}

/// Every session record in the store, split by readability.
#[derive(Debug, Default)]
pub struct SessionScan {
    pub sessions: Vec<Session>,
    /// Ids whose records failed to decrypt or decode.
    pub unreadable: Vec<String>,
}

/// Encrypted CRUD over session records.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn KeyValueStore>,
    crypto: CryptoEngine,
}

impl SessionRepository {
    /// Creates a repository over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, crypto: CryptoEngine) -> Self {
        Self { store, crypto }
    }

    /// Writes `session`, replacing any record with the same id.
    pub async fn save(&self, session: &Session) -> Result<()> {
        let key = session_key(&session.session_id);
        let sealed = self.crypto.encrypt(&key, session)?;
        self.store.set(&key, sealed).await
    }

    /// Reads the record for `session_id`.
    pub async fn find(&self, session_id: &str) -> Result<Lookup> {
        let key = session_key(session_id);
        let Some(sealed) = self.store.get(&key).await? else {
            return Ok(Lookup::Missing);
        };

        match self.crypto.decrypt::<Session>(&key, &sealed) {
            Ok(session) => {
                let same_id: bool = session
                    .session_id
                    .as_bytes()
                    .ct_eq(session_id.as_bytes())
                    .into();
                if same_id {
                    Ok(Lookup::Found(session))
                } else {
                    Ok(Lookup::Unreadable(Unreadable::Tampered))
                }
            }
            Err(reason) => Ok(Lookup::Unreadable(reason)),
        }
    }

    /// Removes the record for `session_id`. Idempotent.
    pub async fn delete(&self, session_id: &str) -> Result<bool> {
        self.store.delete(&session_key(session_id)).await
    }

    /// Marks `session` inactive, then removes it.
    ///
    /// If the delete fails the record stays behind inactive and is rejected on the next
    /// validation.
    pub async fn retire(&self, mut session: Session) -> Result<bool> {
        session.is_active = false;
        self.save(&session).await?;
        self.delete(&session.session_id).await
    }

    /// Reads every session record.
    pub async fn scan(&self) -> Result<SessionScan> {
        let mut scan = SessionScan::default();

        for key in self.store.keys_with_prefix(SESSION_PREFIX).await? {
            let session_id = &key[SESSION_PREFIX.len()..];
            match self.find(session_id).await? {
                Lookup::Found(session) => scan.sessions.push(session),
                Lookup::Missing => {}
                Lookup::Unreadable(reason) => {
                    tracing::warn!(
                        "⚠️  Unreadable session record {}: {}",
                        token::log_prefix(session_id),
                        reason
                    );
                    scan.unreadable.push(session_id.to_string());
                }
            }
        }

        Ok(scan)
    }

    /// All readable sessions owned by `user_id`, expired or not.
    pub async fn find_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let scan = self.scan().await?;
        Ok(scan
            .sessions
            .into_iter()
            .filter(|s| s.user_id == user_id)
            .collect())
    }
}
