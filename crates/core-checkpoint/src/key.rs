//! Checkpoint key rules and source identity keys

use crate::error::{Error, Result};

/// Prefix for keys derived from a source identity
const SOURCE_KEY_PREFIX: &str = "src-";

/// Bytes of the identity hash kept in the key (hex doubles the length)
const SOURCE_KEY_BYTES: usize = 16;

/// Derive the checkpoint key for an event source.
///
/// The key depends only on the endpoint and namespace, so the same installation
/// pointed at a different source starts from a clean checkpoint instead of
/// replaying a cursor issued by another server.
pub fn source_key(endpoint: &str, namespace: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(endpoint.trim_end_matches('/').as_bytes());
    hasher.update(&[0]);
    hasher.update(namespace.as_bytes());
    let hash = hasher.finalize();

    format!(
        "{}{}",
        SOURCE_KEY_PREFIX,
        hex::encode(&hash.as_bytes()[..SOURCE_KEY_BYTES])
    )
}

/// Check that a key is usable as a plain file name inside the store directory.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::invalid_key(key, "empty"));
    }
    if key.starts_with('.') {
        return Err(Error::invalid_key(key, "starts with '.'"));
    }
    if key.len() > 200 {
        return Err(Error::invalid_key(key, "longer than 200 bytes"));
    }
    if let Some(c) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(if c == '/' || c == '\\' {
            Error::invalid_key(key, "contains a path separator")
        } else {
            Error::invalid_key(key, "contains a character outside [A-Za-z0-9._-]")
        });
    }
    Ok(())
}
