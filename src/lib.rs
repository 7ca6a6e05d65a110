//! Secure session and per-user data isolation.
//!
//! [`SessionManager`] issues opaque session tokens, caps concurrent sessions per user,
//! encrypts every record at rest, keeps per-user data in isolated namespaces, and
//! reclaims expired state, over any [`KeyValueStore`].

pub mod clock;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod store;

pub mod crypto {
    pub mod aes;
    pub mod engine;
    pub mod token;
}

pub mod models {
    pub mod session;
}

pub mod repositories {
    pub mod session;
    pub mod vault;
}

pub mod services {
    pub mod current;
    pub mod limiter;
    pub mod sessions;
    pub mod sweeper;
    pub mod user_locks;
}

pub mod handlers {
    pub mod sessions;
    pub mod vault;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod session;
}

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, SessionSettings, StoreBackend};
pub use crypto::aes::Unreadable;
pub use crypto::engine::{CryptoEngine, KeySource};
pub use error::{AppError, Result};
pub use models::session::{Identity, Session, SessionMeta};
pub use repositories::vault::PerUserVault;
pub use services::sessions::{SessionContext, SessionManager, SessionRejection, SessionVault};
pub use services::sweeper::ExpirationSweeper;
pub use state::AppState;
pub use store::{FileStore, KeyValueStore, MemoryStore, RedisStore};
