//! Ed25519 key management
//!
//! Provides key pair generation, signing, and verification for the
//! Ed25519 keys Cardano participants sign with.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

use super::hash::blake2b_224;
use crate::core::KeyHash;

/// Length of a raw Ed25519 verification key
pub const VKEY_LEN: usize = 32;

/// Length of a raw Ed25519 signature
pub const SIGNATURE_LEN: usize = 64;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature encoding")]
    InvalidSignature,
}

/// An Ed25519 key pair
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create a key pair from a hex-encoded 32-byte private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| KeyError::InvalidPrivateKey)?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Raw verification key bytes
    pub fn public_key(&self) -> [u8; VKEY_LEN] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Get the verification key as a hex string
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    /// The key hash a native script `sig` leaf refers to
    pub fn key_hash(&self) -> KeyHash {
        key_hash_of(&self.public_key())
    }

    /// Sign an arbitrary payload
    pub fn sign(&self, payload: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.signing_key.sign(payload).to_bytes()
    }
}

/// BLAKE2b-224 of a verification key
pub fn key_hash_of(vkey: &[u8]) -> KeyHash {
    KeyHash::new(blake2b_224(vkey))
}

/// Verify an Ed25519 signature over `payload`
///
/// Returns `Ok(false)` for a well-formed signature that does not verify and
/// an error when the key or signature bytes cannot be decoded at all.
pub fn verify_signature(vkey: &[u8], payload: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
    let vkey: [u8; VKEY_LEN] = vkey.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
    let verifying_key = VerifyingKey::from_bytes(&vkey).map_err(|_| KeyError::InvalidPublicKey)?;
    let signature: [u8; SIGNATURE_LEN] = signature
        .try_into()
        .map_err(|_| KeyError::InvalidSignature)?;
    let signature = Signature::from_bytes(&signature);

    Ok(verifying_key.verify(payload, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_pair_generation() {
        let kp = KeyPair::generate();
        assert_eq!(kp.private_key_hex().len(), 64);
        assert_eq!(kp.public_key_hex().len(), 64);
        assert_eq!(kp.key_hash().to_hex().len(), 56);
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let payload = b"tx body hash";

        let public = kp.public_key();
        let signature = kp.sign(payload);
        assert!(verify_signature(&public, payload, &signature).unwrap());
        assert!(!verify_signature(&public, b"other payload", &signature).unwrap());
    }

    #[test]
    fn test_key_pair_from_hex() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::from_private_key_hex(&kp1.private_key_hex()).unwrap();
        assert_eq!(kp1.public_key_hex(), kp2.public_key_hex());
        assert_eq!(kp1.key_hash(), kp2.key_hash());
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(KeyPair::from_private_key_hex("abcd").is_err());
        assert!(verify_signature(&[0u8; 31], b"x", &[0u8; 64]).is_err());
        let public = KeyPair::generate().public_key();
        assert!(verify_signature(&public, b"x", &[0u8; 10]).is_err());
    }
}
