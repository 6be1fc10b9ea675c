//! Hashing primitives for TallyChain
//!
//! Blocks and proofs are both identified by lower-case hex SHA-256 digests.

use sha2::{Digest, Sha256};

/// Length in hex characters of a SHA-256 digest.
pub const HASH_HEX_LEN: usize = 64;

/// Hash `data` with SHA-256 and return the lower-case hex digest.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hash several byte slices as if they were concatenated.
pub fn sha256_hex_concat(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Count the leading `'0'` characters of a hex digest.
pub fn leading_zero_digits(hex_digest: &str) -> usize {
    hex_digest.bytes().take_while(|b| *b == b'0').count()
}
