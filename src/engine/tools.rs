//! Path and hashing utilities

use std::path::{Path, PathBuf};

use crate::utils::config::{IMAGE_EXTENSION, ITEM_HASH_LEN};

/// Artwork path for an item: `<dir>/<hash><IMAGE_EXTENSION>`.
pub fn asset_path(dir: &Path, hash: &str) -> PathBuf {
    dir.join(format!("{hash}{IMAGE_EXTENSION}"))
}

/// Stable item hash from identifying fields (e.g. album title + album artist).
///
/// Fields are lowercased, trimmed, and separated by a NUL so `("ab", "c")` and `("a", "bc")`
/// differ. Returns the first [`ITEM_HASH_LEN`] hex chars of the blake3 digest.
pub fn item_hash(parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(&[0]);
        }
        hasher.update(part.trim().to_lowercase().as_bytes());
    }
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..ITEM_HASH_LEN].to_string()
}
