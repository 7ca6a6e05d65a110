use garde::Validate;

use crate::error::{AppError, Result};
use crate::models::session::{Identity, SessionMeta};

/// Maximum stored length of an IP address (IPv6 with zone id fits).
pub const MAX_IP_LEN: usize = 64;
/// Maximum stored length of a user agent.
pub const MAX_USER_AGENT_LEN: usize = 256;
/// Maximum length of a vault data type.
pub const MAX_DATA_TYPE_LEN: usize = 128;

/// Validates the identity handed over by the login collaborator.
///
/// The id is opaque: any non-empty string is accepted as is.
pub fn validate_identity(identity: &Identity) -> Result<()> {
    identity
        .validate()
        .map_err(|report| AppError::Validation(format!("Invalid identity: {}", report)))
}

/// Cuts `value` to at most `max` bytes without splitting a character.
pub fn truncate(value: &str, max: usize) -> String {
    if value.len() <= max {
        return value.to_string();
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

/// Returns the provenance fields trimmed and truncated for storage.
pub fn sanitize_meta(meta: &SessionMeta) -> (Option<String>, Option<String>) {
    let clean = |value: &Option<String>, max: usize| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| truncate(v, max))
    };
    (
        clean(&meta.ip_address, MAX_IP_LEN),
        clean(&meta.user_agent, MAX_USER_AGENT_LEN),
    )
}

/// Validates a vault data type name.
pub fn validate_data_type(data_type: &str) -> Result<()> {
    if data_type.is_empty() {
        return Err(AppError::Validation(
            "Data type cannot be empty".to_string(),
        ));
    }

    if data_type.len() > MAX_DATA_TYPE_LEN {
        return Err(AppError::Validation(format!(
            "Data type must be at most {} characters",
            MAX_DATA_TYPE_LEN
        )));
    }

    if data_type.chars().any(char::is_control) {
        return Err(AppError::Validation(
            "Data type cannot contain control characters".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_only_requires_non_empty_id() {
        assert!(validate_identity(&Identity::new("u1", "", "")).is_ok());
        assert!(validate_identity(&Identity::new("", "a@b.c", "A")).is_err());
        assert!(validate_identity(&Identity::new("   ", "a@b.c", "A")).is_ok());
        assert!(validate_identity(&Identity::new("x".repeat(300), "", "")).is_ok());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
        // 'é' is two bytes; cutting at 2 would split it.
        assert_eq!(truncate("aé", 2), "a");
    }

    #[test]
    fn meta_is_trimmed_and_truncated() {
        let meta = SessionMeta {
            ip_address: Some("  10.0.0.1 ".to_string()),
            user_agent: Some("M".repeat(1000)),
            remember_me: false,
        };
        let (ip, ua) = sanitize_meta(&meta);
        assert_eq!(ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(ua.map(|u| u.len()), Some(MAX_USER_AGENT_LEN));

        let blank = SessionMeta {
            ip_address: Some("   ".to_string()),
            ..SessionMeta::default()
        };
        assert_eq!(sanitize_meta(&blank), (None, None));
    }

    #[test]
    fn data_type_rules() {
        assert!(validate_data_type("prefs").is_ok());
        assert!(validate_data_type("plans:2026:fall").is_ok());
        assert!(validate_data_type("").is_err());
        assert!(validate_data_type("a\nb").is_err());
        assert!(validate_data_type(&"d".repeat(MAX_DATA_TYPE_LEN + 1)).is_err());
    }
}
