//! Cache-key derivation
//!
//! A cache key identifies one `(folder, width, height, source URL)` resize
//! request. The key is a pure function of its inputs and stable across
//! process runs. The URL component is a SHA-256 digest, so distinct URLs
//! within the same folder and dimensions cannot silently collide onto one
//! cached artifact.

use sha2::{Digest, Sha256};

const KEY_VERSION: &str = "v1";

/// Derive the cache key for a resize request. Unset dimensions are encoded
/// as `-` so `(w, None)` and `(w, Some(h))` never alias.
pub fn derive_cache_key(
    folder: &str,
    width: Option<u32>,
    height: Option<u32>,
    url: &str,
) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!(
        "{}:{}:{}x{}:{}",
        KEY_VERSION,
        folder,
        dimension_component(width),
        dimension_component(height),
        hex::encode(digest)
    )
}

/// Prefix matching every key derived for `folder`, used for folder-scoped
/// eviction.
pub fn folder_key_prefix(folder: &str) -> String {
    format!("{}:{}:", KEY_VERSION, folder)
}

fn dimension_component(dimension: Option<u32>) -> String {
    match dimension {
        Some(value) => value.to_string(),
        None => "-".to_string(),
    }
}
