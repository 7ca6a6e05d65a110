use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

/// Random bytes in the leading segment of a session id.
const RANDOM_SIZE: usize = 32;
/// Random bytes in the trailing segment of a session id.
const SUFFIX_SIZE: usize = 8;
/// Unpadded URL-safe base64 length of `RANDOM_SIZE` bytes.
const RANDOM_ENCODED_LEN: usize = 43;
/// Hex digits needed for any millisecond timestamp that fits in an i64.
const MAX_TIMESTAMP_HEX: usize = 16;

/// Generates a new session id.
///
/// Format: `<43 url-safe base64 chars>.<creation millis, hex>.<16 hex chars>`. The
/// leading and trailing segments come from the OS RNG; the middle makes ids unique
/// across time even if the RNG were to repeat.
pub fn generate_session_id(now: DateTime<Utc>) -> String {
    let mut random = [0u8; RANDOM_SIZE];
    OsRng.fill_bytes(&mut random);

    let mut suffix = [0u8; SUFFIX_SIZE];
    OsRng.fill_bytes(&mut suffix);

    let millis = now.timestamp_millis().max(0) as u64;

    format!(
        "{}.{:x}.{}",
        general_purpose::URL_SAFE_NO_PAD.encode(random),
        millis,
        hex::encode(suffix)
    )
}

/// Whether `candidate` has the shape produced by [`generate_session_id`].
///
/// This is a cheap structural check run before any storage lookup.
pub fn is_well_formed(candidate: &str) -> bool {
    let mut parts = candidate.split('.');
    let (Some(random), Some(stamp), Some(suffix), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    random.len() == RANDOM_ENCODED_LEN
        && random
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        && !stamp.is_empty()
        && stamp.len() <= MAX_TIMESTAMP_HEX
        && stamp.bytes().all(is_lower_hex)
        && suffix.len() == SUFFIX_SIZE * 2
        && suffix.bytes().all(is_lower_hex)
}

fn is_lower_hex(b: u8) -> bool {
    b.is_ascii_digit() || (b'a'..=b'f').contains(&b)
}

/// A short, non-secret prefix of a session id for log lines.
pub fn log_prefix(session_id: &str) -> &str {
    let end = session_id
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(session_id.len());
    &session_id[..end]
}
