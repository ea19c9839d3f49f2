//! Cryptographic utilities
//!
//! This module provides:
//! - BLAKE2b-224 / BLAKE2b-256 hashing for chain identifiers
//! - SHA-256 for local artifact ids
//! - Ed25519 key management and signature verification

pub mod hash;
pub mod keys;

pub use hash::{blake2b_224, blake2b_256, sha256, HASH28_LEN};
pub use keys::{key_hash_of, verify_signature, KeyError, KeyPair, SIGNATURE_LEN, VKEY_LEN};
