use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::{
    crypto::engine::CryptoEngine,
    error::Result,
    store::KeyValueStore,
    validation::session::validate_data_type,
};

/// Key prefix shared by all vault entries.
pub const VAULT_PREFIX: &str = "userData:";

/// Escapes a user id so it can never contain the `:` namespace separator.
///
/// Without this, user `a:b` would live under user `a`'s prefix and be wiped with it.
pub fn escape_user_id(user_id: &str) -> String {
    user_id.replace('%', "%25").replace(':', "%3A")
}

/// The key prefix owning every entry of `user_id`.
pub fn user_prefix(user_id: &str) -> String {
    format!("{}{}:", VAULT_PREFIX, escape_user_id(user_id))
}

/// The store key for one entry.
pub fn vault_key(user_id: &str, data_type: &str) -> String {
    format!("{}{}", user_prefix(user_id), data_type)
}

/// Encrypted per-user key-value storage, independent of any session.
#[derive(Clone)]
pub struct PerUserVault {
    store: Arc<dyn KeyValueStore>,
    crypto: CryptoEngine,
}

impl PerUserVault {
    /// Creates a vault over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, crypto: CryptoEngine) -> Self {
        Self { store, crypto }
    }

    /// Encrypts and stores `value` for `(user_id, data_type)`.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        user_id: &str,
        data_type: &str,
        value: &T,
    ) -> Result<()> {
        validate_data_type(data_type)?;
        let key = vault_key(user_id, data_type);
        let sealed = self.crypto.encrypt(&key, value)?;
        self.store.set(&key, sealed).await?;
        tracing::debug!("Vault entry written: {} for user {}", data_type, user_id);
        Ok(())
    }

    /// Reads `(user_id, data_type)`.
    ///
    /// A missing, tampered or undecodable entry is `None`; only store failures are errors.
    pub async fn get<T: DeserializeOwned>(&self, user_id: &str, data_type: &str) -> Result<Option<T>> {
        let key = vault_key(user_id, data_type);
        let Some(sealed) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match self.crypto.decrypt(&key, &sealed) {
            Ok(value) => Ok(Some(value)),
            Err(reason) => {
                tracing::warn!("⚠️  Unreadable vault entry {} for user {}: {}", data_type, user_id, reason);
                Ok(None)
            }
        }
    }

    /// Removes one entry. Returns whether it existed.
    pub async fn remove(&self, user_id: &str, data_type: &str) -> Result<bool> {
        self.store.delete(&vault_key(user_id, data_type)).await
    }

    /// Names of the entries stored for `user_id`.
    pub async fn data_types(&self, user_id: &str) -> Result<Vec<String>> {
        let prefix = user_prefix(user_id);
        Ok(self
            .store
            .keys_with_prefix(&prefix)
            .await?
            .into_iter()
            .map(|key| key[prefix.len()..].to_string())
            .collect())
    }

    /// Deletes every entry of `user_id`. Returns how many were removed.
    pub async fn wipe(&self, user_id: &str) -> Result<usize> {
        let mut removed = 0;
        for key in self.store.keys_with_prefix(&user_prefix(user_id)).await? {
            if self.store.delete(&key).await? {
                removed += 1;
            }
        }
        tracing::info!("🧹 Vault wiped for user {}: {} entries", user_id, removed);
        Ok(removed)
    }
}
