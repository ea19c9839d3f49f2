//! Multisig policy engine and signature-quorum coordination
//!
//! A wallet's participants and threshold rule are turned into per-role
//! native scripts, from which addresses and DRep ids are derived. Pending
//! transactions and signable payloads then collect witnesses until the
//! quorum is reached.
//!
//! # Example
//!
//! ```ignore
//! use cardano_multisig::multisig::{MultisigPolicy, WalletConfig};
//!
//! // Build a 2-of-3 policy from a stored configuration
//! let policy = MultisigPolicy::from_config(&WalletConfig::load(path)?)?;
//! let addresses = policy.derive_addresses()?;
//!
//! // Propose a transaction and collect witnesses
//! let draft = lifecycle.create("treasury", &policy, Role::Payment, payload)?;
//! lifecycle.propose(&draft.id, &me, sign_artifact(&draft, &my_key))?;
//! lifecycle.record_signature(&draft.id, &other, their_witness)?;
//! ```

pub mod builder;
pub mod config;
pub mod deriver;
pub mod error;
pub mod keys;
pub mod manager;
pub mod metadata;
pub mod quorum;
pub mod transaction;
pub mod wallet;

pub use builder::{ScriptBuilder, ThresholdRule};
pub use config::{parse_stake_credential, ParticipantEntry, WalletConfig};
pub use deriver::{
    derive_address, derive_address_for_network_id, derive_drep_id, derive_script_hash,
    derive_stake_address, DerivedAddressSet,
};
pub use error::MultisigError;
pub use keys::{normalize_key, KeyRegistry, ParticipantId, ParticipantKey, Role};
pub use manager::{ArtifactLifecycle, LifecycleOutcome, Submitter};
pub use metadata::{MetadataDocument, REGISTRATION_METADATA_LABEL};
pub use quorum::{QuorumState, QuorumStatus, QuorumTracker};
pub use transaction::{
    sign_artifact, ArtifactPayload, ArtifactState, Ed25519Verifier, EligibleSigner,
    PendingArtifact, SignatureVerifier, Transition, VkeyWitness,
};
pub use wallet::{Capabilities, MultisigPolicy};
