use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use anyhow::{Context, Result};
use zeroize::{Zeroize, Zeroizing};

/// Which [`KeyValueStore`](crate::store::KeyValueStore) backs the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    File(PathBuf),
    Redis(String),
}

/// Limits and timeouts applied by the session manager.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Maximum concurrent live sessions per user.
    pub max_sessions_per_user: usize,
    /// Lifetime of a session created without remember-me.
    pub default_timeout: chrono::Duration,
    /// Lifetime of a remember-me session.
    pub extended_timeout: chrono::Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_sessions_per_user: 3,
            default_timeout: chrono::Duration::hours(24),
            extended_timeout: chrono::Duration::days(30),
        }
    }
}

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The session store backend.
    pub store: StoreBackend,
    /// Externally supplied data key. When absent the key lives in the store.
    pub master_key: Option<Zeroizing<Vec<u8>>>,
    /// Session limits and timeouts.
    pub sessions: SessionSettings,
    /// How often the expiration sweeper runs.
    pub sweep_interval: std::time::Duration,
    /// The HTTP listen address.
    pub bind_addr: SocketAddr,
    /// Whether cookies are marked `Secure`.
    pub production: bool,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a `Config` from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let store = match var("SESSION_STORE", "memory").to_ascii_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "file" => StoreBackend::File(PathBuf::from(var("SESSION_STORE_PATH", "data/sessions.bin"))),
            "redis" => StoreBackend::Redis(var("REDIS_URL", "redis://127.0.0.1:6379")),
            other => anyhow::bail!("Unknown SESSION_STORE '{}' (expected memory, file or redis)", other),
        };

        let master_key = match lookup("SESSION_MASTER_KEY") {
            Some(mut master_key_hex) => {
                let decoded = hex::decode(master_key_hex.trim())
                    .context("SESSION_MASTER_KEY must be valid hexadecimal");
                master_key_hex.zeroize();
                let bytes = Zeroizing::new(decoded?);

                if bytes.len() != 32 {
                    anyhow::bail!("SESSION_MASTER_KEY must be exactly 32 bytes (64 hex characters)");
                }
                Some(bytes)
            }
            None => None,
        };

        let max_sessions_per_user: usize = var("MAX_SESSIONS_PER_USER", "3")
            .parse()
            .context("Invalid MAX_SESSIONS_PER_USER")?;
        if max_sessions_per_user == 0 {
            anyhow::bail!("MAX_SESSIONS_PER_USER must be at least 1");
        }

        let timeout_hours: i64 = var("SESSION_TIMEOUT_HOURS", "24")
            .parse()
            .context("Invalid SESSION_TIMEOUT_HOURS")?;
        let remember_days: i64 = var("SESSION_REMEMBER_DAYS", "30")
            .parse()
            .context("Invalid SESSION_REMEMBER_DAYS")?;
        if timeout_hours <= 0 || remember_days <= 0 {
            anyhow::bail!("Session timeouts must be positive");
        }

        let sweep_secs: u64 = var("SESSION_SWEEP_INTERVAL_SECS", "3600")
            .parse()
            .context("Invalid SESSION_SWEEP_INTERVAL_SECS")?;
        if sweep_secs == 0 {
            anyhow::bail!("SESSION_SWEEP_INTERVAL_SECS must be at least 1");
        }

        Ok(Self {
            store,
            master_key,
            sessions: SessionSettings {
                max_sessions_per_user,
                default_timeout: chrono::Duration::hours(timeout_hours),
                extended_timeout: chrono::Duration::days(remember_days),
            },
            sweep_interval: std::time::Duration::from_secs(sweep_secs),
            bind_addr: var("BIND_ADDR", "127.0.0.1:3000")
                .parse()
                .context("Invalid BIND_ADDR")?,
            production: var("APP_ENV", "development") == "production",
        })
    }
}
