use async_trait::async_trait;
use bincode::{Decode, Encode};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::memory::prefix_range;
use super::KeyValueStore;
use crate::error::{AppError, Result};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Encode, Decode)]
struct Snapshot {
    version: u32,
    entries: BTreeMap<String, Vec<u8>>,
}

/// A single-file store for embedded deployments.
///
/// The whole map is held in memory and rewritten to disk on every mutation via a
/// temporary file and a rename, so a crash leaves either the old or the new snapshot.
///
/// Every write costs a full snapshot, and validating a session is a write (its activity
/// timestamp is refreshed). That is O(store size) I/O per authenticated request, fine for
/// a single client installation; use [`RedisStore`](super::RedisStore) for shared servers.
pub struct FileStore {
    path: PathBuf,
    tmp_path: PathBuf,
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

/// `sessions.bin` stages through `sessions.bin.tmp`, so snapshots differing only by
/// extension never share a temporary file.
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

impl FileStore {
    /// Opens the snapshot at `path`, starting empty if it does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let (snapshot, _): (Snapshot, usize) =
                    bincode::decode_from_slice(&bytes, bincode::config::standard())?;
                if snapshot.version != SNAPSHOT_VERSION {
                    return Err(AppError::Snapshot(format!(
                        "Unsupported snapshot version {}",
                        snapshot.version
                    )));
                }
                tracing::debug!("Loaded {} entries from {}", snapshot.entries.len(), path.display());
                snapshot.entries
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            tmp_path: tmp_path_for(&path),
            path,
            entries: Mutex::new(entries),
        })
    }

    async fn persist(&self, entries: BTreeMap<String, Vec<u8>>) -> Result<BTreeMap<String, Vec<u8>>> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            entries,
        };
        let bytes = bincode::encode_to_vec(&snapshot, bincode::config::standard())?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(&self.tmp_path, &bytes).await?;
        tokio::fs::rename(&self.tmp_path, &self.path).await?;

        Ok(snapshot.entries)
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        *entries = self.persist(next).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(key) {
            return Ok(false);
        }
        let mut next = entries.clone();
        next.remove(key);
        *entries = self.persist(next).await?;
        Ok(true)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(prefix_range(&*self.entries.lock().await, prefix))
    }
}
