#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use sessionvault::{
    AppError, CryptoEngine, Identity, KeyValueStore, ManualClock, MemoryStore, Result,
    SessionManager, SessionMeta, SessionSettings,
};

/// Wraps a [`MemoryStore`], counting reads and optionally failing calls.
#[derive(Default)]
pub struct ProbeStore {
    inner: MemoryStore,
    pub gets: AtomicUsize,
    pub failing: AtomicBool,
    pub failing_deletes: AtomicBool,
}

impl ProbeStore {
    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Io(std::io::Error::other("store offline")));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for ProbeStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.check()?;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check()?;
        if self.failing_deletes.load(Ordering::SeqCst) {
            return Err(AppError::Io(std::io::Error::other("delete refused")));
        }
        self.inner.delete(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.check()?;
        self.inner.keys_with_prefix(prefix).await
    }
}

// Shared test context
pub struct TestContext {
    pub store: Arc<ProbeStore>,
    pub clock: Arc<ManualClock>,
    pub manager: Arc<SessionManager>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_settings(SessionSettings::default()).await
    }

    pub async fn with_settings(settings: SessionSettings) -> Self {
        let store = Arc::new(ProbeStore::default());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap(),
        ));
        let crypto = CryptoEngine::load_or_create(store.as_ref()).await.unwrap();
        let manager = SessionManager::new(store.clone(), crypto, settings).with_clock(clock.clone());

        Self {
            store,
            clock,
            manager: Arc::new(manager),
        }
    }

    pub async fn login(&self, user: &str) -> String {
        self.login_with(user, SessionMeta::default()).await
    }

    pub async fn login_with(&self, user: &str, meta: SessionMeta) -> String {
        self.manager
            .create_session(&identity(user), meta)
            .await
            .unwrap()
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

pub fn identity(user: &str) -> Identity {
    Identity::new(user, format!("{}@example.edu", user), format!("Student {}", user))
}
