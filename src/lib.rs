//! Cardano-multisig: native-script multisig wallets in Rust
//!
//! This crate provides:
//! - Deterministic native-script construction per participant role
//!   (payment, stake, DRep, constitutional committee)
//! - Script hash, Shelley address and DRep ID derivation (CIP-19, CIP-105, CIP-129)
//! - Participant key normalization from addresses, bech32 and hex
//! - Registration metadata (label 1854) that rebuilds identical scripts
//! - A signature-quorum coordinator with optimistic-concurrency storage
//!
//! # Example
//!
//! ```rust
//! use cardano_multisig::core::{KeyHash, Network};
//! use cardano_multisig::multisig::{MultisigPolicy, ParticipantKey, Role, ThresholdRule};
//!
//! // A 2-of-3 payment policy
//! let keys = (1u8..=3)
//!     .map(|i| ParticipantKey::new(KeyHash::new([i; 28]), Role::Payment, &format!("p{}", i)))
//!     .collect();
//! let policy = MultisigPolicy::new(
//!     "treasury",
//!     "",
//!     keys,
//!     ThresholdRule::at_least(2),
//!     Network::Testnet,
//!     None,
//! )
//! .unwrap();
//!
//! let derived = policy.derive_addresses().unwrap();
//! assert!(derived.payment_address.starts_with("addr_test1"));
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod multisig;
pub mod storage;

// Re-export commonly used types
pub use core::{Address, Credential, DRepId, KeyHash, NativeScript, Network, ScriptHash};
pub use crypto::KeyPair;
pub use multisig::{
    ArtifactLifecycle, DerivedAddressSet, MultisigError, MultisigPolicy, PendingArtifact,
    ThresholdRule, WalletConfig,
};
pub use storage::{FileArtifactStore, MemoryArtifactStore, StorageConfig};
