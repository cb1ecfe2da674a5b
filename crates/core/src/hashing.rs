//! Content addressing for archived device files.
//!
//! Every archived original is keyed by the lowercase hex SHA-256 digest of
//! its bytes. The same digest is recomputed on read to detect corruption.

use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// Length of a hex-encoded SHA-256 digest.
pub const CONTENT_HASH_LEN: usize = 64;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Validate that `hash` looks like a content hash produced by [`sha256_hex`].
///
/// Rejects anything that is not exactly 64 lowercase hex characters, which
/// also keeps the value safe to use as a blob path component.
pub fn validate_content_hash(hash: &str) -> Result<(), CoreError> {
    if hash.len() != CONTENT_HASH_LEN {
        return Err(CoreError::Validation(format!(
            "Content hash must be {CONTENT_HASH_LEN} hex characters, got {}",
            hash.len()
        )));
    }
    if !hash
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        return Err(CoreError::Validation(
            "Content hash must contain only lowercase hex characters".to_string(),
        ));
    }
    Ok(())
}
