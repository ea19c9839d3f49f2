//! Cryptographic hashing utilities
//!
//! Cardano identifies keys and scripts by BLAKE2b-224 digests and signs
//! transaction bodies through their BLAKE2b-256 digest. SHA-256 is only
//! used for local identifiers that never reach the chain.

use blake2::digest::consts::{U28, U32};
use blake2::{Blake2b, Digest};
use sha2::Sha256;

type Blake2b224 = Blake2b<U28>;
type Blake2b256 = Blake2b<U32>;

/// Length in bytes of a key or script hash
pub const HASH28_LEN: usize = 28;

/// Computes the BLAKE2b-224 digest used for key hashes and script hashes
pub fn blake2b_224(data: &[u8]) -> [u8; HASH28_LEN] {
    let mut out = [0u8; HASH28_LEN];
    out.copy_from_slice(&Blake2b224::digest(data));
    out
}

/// Computes the BLAKE2b-256 digest used for transaction body hashes
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Blake2b256::digest(data));
    out
}

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let data = b"hello world";
        let hash = sha256(data);
        assert_eq!(hash.len(), 32);
        assert_eq!(
            hex::encode(hash),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_blake2b_256_empty() {
        assert_eq!(
            hex::encode(blake2b_256(b"")),
            "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
    }

    #[test]
    fn test_blake2b_224_is_deterministic() {
        let a = blake2b_224(b"native script");
        let b = blake2b_224(b"native script");
        assert_eq!(a, b);
        assert_ne!(a, blake2b_224(b"native scripts"));
    }
}
