use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Represents a user session.
///
/// Only `last_activity` changes after creation. The record is stored encrypted under
/// `session:{session_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque token handed to the client.
    pub session_id: String,
    /// The ID of the user this session belongs to.
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every successful validation or heartbeat.
    pub last_activity: DateTime<Utc>,
    /// Fixed at creation; never extended.
    pub expires_at: DateTime<Utc>,
    /// Provenance only, never used for authorization.
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Cleared only right before the record is deleted.
    pub is_active: bool,
}

impl Session {
    /// Whether the session is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// A verified identity supplied by the login collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Identity {
    #[garde(length(min = 1))]
    pub id: String,
    #[garde(skip)]
    pub email: String,
    #[garde(skip)]
    pub name: String,
}

impl Identity {
    /// Convenience constructor.
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
        }
    }
}

/// Optional request metadata captured at login.
#[derive(Debug, Clone, Default)]
pub struct SessionMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Selects the extended expiry window.
    pub remember_me: bool,
}

impl SessionMeta {
    /// Metadata with only the remember-me flag set.
    pub fn remember_me() -> Self {
        Self {
            remember_me: true,
            ..Self::default()
        }
    }
}
