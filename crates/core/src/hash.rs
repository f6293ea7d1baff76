//! SHA-256 helpers used for the two URL-hash-keyed identity schemes spec.md
//! defines: the full hex digest for content-root sharding, and its first 16
//! hex chars for `visited:*` record keys.

use sha2::{Digest, Sha256};

/// Full 64-char lowercase hex SHA-256 of `url`.
pub fn sha256_hex(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex_encode(&digest)
}

/// First 16 hex chars of SHA-256(url), used as the `visited:*` key suffix.
pub fn visited_key_prefix(url: &str) -> String {
    sha256_hex(url)[..16].to_string()
}

/// Selects a content root index in `[0, num_roots)` from
/// `int(sha256(url)[:8], 16) mod num_roots`, per spec.md §4.6.
pub fn content_root_index(url: &str, num_roots: usize) -> usize {
    assert!(num_roots > 0, "num_roots must be positive");
    let full = sha256_hex(url);
    let prefix8 = u32::from_str_radix(&full[..8], 16).expect("hex digest prefix is valid hex");
    (prefix8 as usize) % num_roots
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}
