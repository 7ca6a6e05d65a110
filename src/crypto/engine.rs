use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::crypto::aes::{self, SecureKey, Unreadable};
use crate::error::{AppError, Result};
use crate::store::KeyValueStore;

/// Store key holding the generated data key when no external key is configured.
pub const KEY_SLOT: &str = "encryptionKey";

/// Where the data key comes from.
pub enum KeySource {
    /// Generate once and keep it in the same store as the ciphertexts.
    ///
    /// Anyone who can read the store can read the key. Kept for single-user embedded
    /// deployments; production should use [`KeySource::Provided`].
    Store,
    /// A key held outside the store, e.g. loaded from a secret manager.
    Provided(SecureKey),
}

/// Seals and opens serializable values with one AES-256-GCM key.
///
/// Every ciphertext is bound to the store key it is written under, so moving a
/// ciphertext to another slot makes it unreadable.
#[derive(Clone)]
pub struct CryptoEngine {
    key: Arc<SecureKey>,
}

impl CryptoEngine {
    /// Builds an engine around an existing key.
    pub fn with_key(key: SecureKey) -> Self {
        Self { key: Arc::new(key) }
    }

    /// Resolves `source` into an engine, touching the store only for [`KeySource::Store`].
    pub async fn from_source(store: &dyn KeyValueStore, source: KeySource) -> Result<Self> {
        match source {
            KeySource::Provided(key) => {
                tracing::info!("🔑 Using externally provided data key");
                Ok(Self::with_key(key))
            }
            KeySource::Store => Self::load_or_create(store).await,
        }
    }

    /// Loads the key from [`KEY_SLOT`], generating and persisting it on first use.
    pub async fn load_or_create(store: &dyn KeyValueStore) -> Result<Self> {
        if let Some(raw) = store.get(KEY_SLOT).await? {
            let encoded = Zeroizing::new(raw);
            let bytes = Zeroizing::new(hex::decode(&*encoded).map_err(|e| {
                AppError::Encryption(format!("Stored data key is not valid hex: {}", e))
            })?);
            let key = SecureKey::from_slice(&bytes)?;
            tracing::debug!("🔑 Data key loaded from store");
            return Ok(Self::with_key(key));
        }

        let key = aes::generate_key();
        let encoded = Zeroizing::new(hex::encode(key.as_bytes()));
        store.set(KEY_SLOT, encoded.as_bytes().to_vec()).await?;

        tracing::warn!(
            "⚠️  Data key generated and stored next to the data it protects; \
             set SESSION_MASTER_KEY for production deployments"
        );
        Ok(Self::with_key(key))
    }

    /// Serializes `value` and seals it for `slot`.
    pub fn encrypt<T: Serialize + ?Sized>(&self, slot: &str, value: &T) -> Result<Vec<u8>> {
        let plaintext = Zeroizing::new(
            sonic_rs::to_vec(value).map_err(|e| AppError::Serialization(e.to_string()))?,
        );
        aes::seal(&self.key, slot.as_bytes(), &plaintext)
    }

    /// Opens a value sealed for `slot`.
    pub fn decrypt<T: DeserializeOwned>(
        &self,
        slot: &str,
        sealed: &[u8],
    ) -> std::result::Result<T, Unreadable> {
        let plaintext = Zeroizing::new(aes::open(&self.key, slot.as_bytes(), sealed)?);
        sonic_rs::from_slice(&plaintext).map_err(|_| Unreadable::Undecodable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        theme: String,
        credits: Vec<u32>,
    }

    fn prefs() -> Prefs {
        Prefs {
            theme: "dark".to_string(),
            credits: vec![3, 4, 4],
        }
    }

    #[tokio::test]
    async fn key_is_generated_once_and_reused() {
        let store = MemoryStore::new();
        let first = CryptoEngine::load_or_create(&store).await.unwrap();
        let stored = store.get(KEY_SLOT).await.unwrap().unwrap();

        let second = CryptoEngine::load_or_create(&store).await.unwrap();
        assert_eq!(store.get(KEY_SLOT).await.unwrap().unwrap(), stored);

        let sealed = first.encrypt("userData:u1:prefs", &prefs()).unwrap();
        let opened: Prefs = second.decrypt("userData:u1:prefs", &sealed).unwrap();
        assert_eq!(opened, prefs());
    }

    #[tokio::test]
    async fn provided_key_never_touches_store() {
        let store = MemoryStore::new();
        let engine = CryptoEngine::from_source(&store, KeySource::Provided(aes::generate_key()))
            .await
            .unwrap();
        assert!(store.is_empty().await);

        let sealed = engine.encrypt("k", "value").unwrap();
        assert_eq!(engine.decrypt::<String>("k", &sealed).unwrap(), "value");
    }

    #[tokio::test]
    async fn malformed_stored_key_is_an_error() {
        let store = MemoryStore::new();
        store.set(KEY_SLOT, b"not-hex".to_vec()).await.unwrap();
        assert!(CryptoEngine::load_or_create(&store).await.is_err());
    }

    #[test]
    fn flipped_byte_is_unreadable_not_panic() {
        let engine = CryptoEngine::with_key(aes::generate_key());
        let sealed = engine.encrypt("slot", &prefs()).unwrap();
        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] = tampered[i].wrapping_add(1);
            assert_eq!(engine.decrypt::<Prefs>("slot", &tampered), Err(Unreadable::Tampered));
        }
    }

    #[test]
    fn wrong_type_is_undecodable() {
        let engine = CryptoEngine::with_key(aes::generate_key());
        let sealed = engine.encrypt("slot", "just a string").unwrap();
        assert_eq!(engine.decrypt::<Prefs>("slot", &sealed), Err(Unreadable::Undecodable));
    }
}
