//! Errors raised by the policy engine and the artifact lifecycle

use thiserror::Error;

use super::keys::Role;
use super::transaction::ArtifactState;
use crate::core::KeyHash;
use crate::storage::StorageError;

/// Errors related to multisig operations
///
/// Configuration errors (`InvalidThreshold`, `DuplicateKeyForRole`,
/// `DuplicateRoleForParticipant`, `NoParticipants`, `KeyFormat`) abort policy
/// construction. `InvalidSignature` rejects one contribution and leaves the
/// artifact untouched. `StaleVersionConflict` is consumed by the lifecycle's
/// retry loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultisigError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("Duplicate {role} key {key_hash}")]
    DuplicateKeyForRole { role: Role, key_hash: KeyHash },
    #[error("Participant {participant} holds more than one {role} key")]
    DuplicateRoleForParticipant { participant: String, role: Role },
    #[error("Policy has no payment participants")]
    NoParticipants,
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),
    #[error("Invalid signature from {0}")]
    InvalidSignature(String),
    #[error("Illegal state transition: cannot {action} while {from}")]
    IllegalStateTransition {
        from: ArtifactState,
        action: &'static str,
    },
    #[error("Stale artifact version")]
    StaleVersionConflict,
    #[error("Key format error: {0}")]
    KeyFormat(String),
    #[error("Signer not authorized: {0}")]
    UnauthorizedSigner(String),
    #[error("Participant {participant} has already {previous}")]
    ConflictingResponse {
        participant: String,
        previous: &'static str,
    },
    #[error("Role {0} is not enabled for this policy")]
    RoleNotEnabled(Role),
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Metadata does not match the policy it describes: {0}")]
    MetadataMismatch(String),
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for MultisigError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::StaleVersion { .. } => MultisigError::StaleVersionConflict,
            other => MultisigError::Storage(other.to_string()),
        }
    }
}
