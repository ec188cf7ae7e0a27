//! SHA-256 hashing over canonical byte strings.

use sha2::{Digest, Sha256};

/// SHA-256 over raw bytes, returned as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

/// SHA-256 over the UTF-8 bytes of `canonical`, as required for tx ids,
/// block hashes, and the account state root.
pub fn sha256_of_canonical(canonical: &str) -> String {
    sha256_hex(canonical.as_bytes())
}
