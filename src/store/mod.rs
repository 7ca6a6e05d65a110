//! Pluggable key → bytes storage.
//!
//! Every value the session manager writes goes through [`KeyValueStore`]. The manager
//! never assumes anything about the backend beyond single-key atomicity.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::error::Result;

pub mod file;
pub mod memory;
pub mod redis_store;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Durable key → bytes storage.
///
/// Each call is atomic with respect to its key: readers see either the previous or the
/// new value, never a partial write.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored at `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes `value` at `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Removes `key`. Returns whether a value was present.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Lists every key starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Opens the backend selected in `config`.
pub async fn open_store(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match &config.store {
        StoreBackend::Memory => {
            tracing::warn!("⚠️  Using in-memory session store; sessions do not survive restarts");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::File(path) => {
            let store = FileStore::open(path).await?;
            tracing::info!("✅ File session store opened at {}", path.display());
            Arc::new(store)
        }
        StoreBackend::Redis(url) => {
            let store = RedisStore::connect(url).await?;
            tracing::info!("✅ Redis session store connected");
            Arc::new(store)
        }
    };
    Ok(store)
}
