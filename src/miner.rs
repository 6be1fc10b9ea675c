//! Proof-of-work search and verification.
//!
//! A proof is valid against the previous block's proof when
//! `sha256(format!("{previous_proof}{proof}"))` starts with `difficulty`
//! zero hex digits. The difficulty never changes at runtime.

use crate::crypto::{leading_zero_digits, sha256_hex_concat, HASH_HEX_LEN};

/// Leading zero hex digits required by default (16 leading zero bits).
pub const DEFAULT_DIFFICULTY: usize = 4;

/// Upper bound for a configured difficulty: a SHA-256 hex digest has 64 digits.
pub const MAX_DIFFICULTY: usize = HASH_HEX_LEN;

/// Check `proof` against `previous_proof` at the given difficulty.
pub fn valid_proof(previous_proof: u64, proof: u64, difficulty: usize) -> bool {
    let digest = sha256_hex_concat(&[
        previous_proof.to_string().as_bytes(),
        proof.to_string().as_bytes(),
    ]);
    leading_zero_digits(&digest) >= difficulty
}

/// Find the smallest non-negative proof that satisfies [`valid_proof`].
///
/// The search is CPU bound and unbounded; callers on an async runtime should
/// run it on a blocking thread.
pub fn proof_of_work(previous_proof: u64, difficulty: usize) -> u64 {
    let mut proof = 0u64;
    while !valid_proof(previous_proof, proof, difficulty) {
        proof += 1;
    }
    proof
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_of_work_finds_smallest_valid_proof() {
        let proof = proof_of_work(100, DEFAULT_DIFFICULTY);
        assert!(valid_proof(100, proof, DEFAULT_DIFFICULTY));
        assert!((0..proof).all(|p| !valid_proof(100, p, DEFAULT_DIFFICULTY)));
    }

    #[test]
    fn test_proof_of_work_is_deterministic() {
        assert_eq!(proof_of_work(7, 2), proof_of_work(7, 2));
    }

    #[test]
    fn test_zero_difficulty_accepts_anything() {
        assert!(valid_proof(1, 1, 0));
        assert_eq!(proof_of_work(1, 0), 0);
    }

    #[test]
    fn test_harder_difficulty_implies_easier() {
        let proof = proof_of_work(42, 3);
        assert!(valid_proof(42, proof, 2));
        assert!(valid_proof(42, proof, 1));
    }
}
