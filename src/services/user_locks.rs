use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::{Mutex, MutexGuard};

/// Number of lock stripes.
const STRIPES: usize = 64;

/// Striped per-user locks.
///
/// Every read-modify-write on a user's session records runs under the user's stripe.
/// Memory stays bounded regardless of how many users exist; two users sharing a stripe
/// only costs throughput. Never hold two guards at once.
pub struct UserLocks {
    stripes: Vec<Mutex<()>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self {
            stripes: (0..STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn stripe(&self, user_id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        user_id.hash(&mut hasher);
        (hasher.finish() as usize) % self.stripes.len()
    }

    /// Waits for and returns the guard covering `user_id`.
    pub async fn lock(&self, user_id: &str) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe(user_id)].lock().await
    }
}

impl Default for UserLocks {
    fn default() -> Self {
        Self::new()
    }
}
