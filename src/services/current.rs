use std::sync::Arc;

use crate::{error::Result, store::KeyValueStore};

/// Store key of the default context's pointer.
pub const CURRENT_SESSION_KEY: &str = "currentSessionId";

/// Names which session is "the" session of one execution context.
///
/// The pointer is a plain id, not a session. Changing it never creates or destroys one.
#[derive(Clone)]
pub struct CurrentSessionPointer {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl CurrentSessionPointer {
    /// The pointer of the default context.
    pub fn default_context(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            key: CURRENT_SESSION_KEY.to_string(),
        }
    }

    /// The pointer of a named context, e.g. one client installation.
    pub fn named(store: Arc<dyn KeyValueStore>, context: &str) -> Self {
        Self {
            store,
            key: format!("{}:{}", CURRENT_SESSION_KEY, context),
        }
    }

    pub async fn get(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get(&self.key)
            .await?
            .and_then(|raw| String::from_utf8(raw).ok()))
    }

    pub async fn set(&self, session_id: &str) -> Result<()> {
        self.store.set(&self.key, session_id.as_bytes().to_vec()).await
    }

    /// Empties the pointer and returns what it held.
    pub async fn clear(&self) -> Result<Option<String>> {
        let previous = self.get().await?;
        self.store.delete(&self.key).await?;
        Ok(previous)
    }
}
