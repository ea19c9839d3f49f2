//! Stored wallet configuration
//!
//! The configuration keeps raw key material exactly as participants supplied
//! it. It is normalized every time a [`MultisigPolicy`](super::MultisigPolicy)
//! is built from it.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::builder::ThresholdRule;
use super::error::MultisigError;
use super::keys::Role;
use super::metadata::MetadataDocument;
use crate::core::{Address, Credential, KeyHash, Network};
use crate::storage::{load_from_file, save_to_file, StorageError};

/// One configured key, before normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantEntry {
    /// Address, bech32 key (hash) or hex
    pub key: String,
    pub role: Role,
    pub name: String,
}

impl ParticipantEntry {
    pub fn new(key: &str, role: Role, name: &str) -> Self {
        Self {
            key: key.to_string(),
            role,
            name: name.to_string(),
        }
    }
}

/// A wallet as persisted by its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub participants: Vec<ParticipantEntry>,
    pub threshold: ThresholdRule,
    pub network: Network,
    /// External delegation target: a stake or base address, or a 56-hex key hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake_credential: Option<String>,
}

impl WalletConfig {
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        load_from_file(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        save_to_file(self, path)
    }

    /// Parse the configured external stake credential, if any
    pub fn resolve_stake_credential(&self) -> Result<Option<Credential>, MultisigError> {
        self.stake_credential
            .as_deref()
            .map(parse_stake_credential)
            .transpose()
    }

    /// Recover a configuration from a published registration document
    ///
    /// Keys are carried as their hex key hashes, which normalize to
    /// themselves.
    pub fn from_metadata(document: &MetadataDocument) -> Result<Self, MultisigError> {
        let stake_credential = match document.stake_credential {
            Some(Credential::KeyHash(hash)) => Some(hash.to_hex()),
            Some(stake @ Credential::ScriptHash(_)) => Some(
                Address::Reward {
                    network: document.network,
                    stake,
                }
                .to_bech32()?,
            ),
            None => None,
        };

        Ok(Self {
            name: document.name.clone(),
            description: document.description.clone(),
            participants: document
                .participants
                .iter()
                .map(|k| ParticipantEntry::new(&k.key_hash.to_hex(), k.role, &k.display_name))
                .collect(),
            threshold: document.threshold,
            network: document.network,
            stake_credential,
        })
    }
}

/// Parse an external stake credential
///
/// Addresses contribute their stake part, which may be a script.
pub fn parse_stake_credential(input: &str) -> Result<Credential, MultisigError> {
    let input = input.trim();
    if let Some(hash) = KeyHash::from_hex(input) {
        return Ok(Credential::KeyHash(hash));
    }

    Address::parse(input)
        .map_err(|e| MultisigError::KeyFormat(format!("stake credential {:?}: {}", input, e)))?
        .stake_credential()
        .ok_or_else(|| {
            MultisigError::KeyFormat(format!("{} carries no stake credential", input))
        })
}
