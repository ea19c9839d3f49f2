//! Participant keys and their roles
//!
//! Raw key material arrives in whatever form a signer pasted: a wallet
//! address, a reward address, a bech32 key hash or a bare hex string. The
//! registry normalizes every entry to a role-tagged key hash and keeps the
//! order the wallet was configured with.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::error::MultisigError;
use crate::core::address::decode_bech32;
use crate::core::{Address, Credential, DRepId, KeyHash};
use crate::crypto::{key_hash_of, HASH28_LEN, VKEY_LEN};

/// CIP-129 headers for committee credentials backed by a key hash
const CIP129_CC_HOT_KEY_HEADER: u8 = 0x02;
const CIP129_CC_COLD_KEY_HEADER: u8 = 0x12;

/// The authority a key exercises within the wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "payment")]
    Payment,
    #[serde(rename = "stake")]
    Stake,
    #[serde(rename = "drep")]
    DRep,
    #[serde(rename = "committeeCold")]
    CommitteeCold,
    #[serde(rename = "committeeHot")]
    CommitteeHot,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Payment,
        Role::Stake,
        Role::DRep,
        Role::CommitteeCold,
        Role::CommitteeHot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Payment => "payment",
            Role::Stake => "stake",
            Role::DRep => "drep",
            Role::CommitteeCold => "committeeCold",
            Role::CommitteeHot => "committeeHot",
        }
    }

    /// CIP-5 prefix of a bech32 key hash for this role
    fn vkh_prefix(&self) -> &'static str {
        match self {
            Role::Payment => "addr_vkh",
            Role::Stake => "stake_vkh",
            Role::DRep => "drep_vkh",
            Role::CommitteeCold => "cc_cold_vkh",
            Role::CommitteeHot => "cc_hot_vkh",
        }
    }

    /// CIP-5 prefix of a bech32 verification key for this role
    fn vk_prefix(&self) -> &'static str {
        match self {
            Role::Payment => "addr_vk",
            Role::Stake => "stake_vk",
            Role::DRep => "drep_vk",
            Role::CommitteeCold => "cc_cold_vk",
            Role::CommitteeHot => "cc_hot_vk",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = MultisigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "payment" => Ok(Role::Payment),
            "stake" => Ok(Role::Stake),
            "drep" => Ok(Role::DRep),
            "committeecold" | "cc_cold" => Ok(Role::CommitteeCold),
            "committeehot" | "cc_hot" => Ok(Role::CommitteeHot),
            other => Err(MultisigError::KeyFormat(format!(
                "unknown role {:?}",
                other
            ))),
        }
    }
}

/// Identity of a signer across roles
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One role-tagged key held by a participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantKey {
    pub key_hash: KeyHash,
    pub role: Role,
    pub display_name: String,
}

impl ParticipantKey {
    pub fn new(key_hash: KeyHash, role: Role, display_name: &str) -> Self {
        Self {
            key_hash,
            role,
            display_name: display_name.to_string(),
        }
    }

    /// Keys sharing a display name belong to the same participant
    pub fn participant(&self) -> ParticipantId {
        ParticipantId::new(&self.display_name)
    }
}

/// Normalize raw key material for `role` into a key hash
pub fn normalize_key(input: &str, role: Role) -> Result<KeyHash, MultisigError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(MultisigError::KeyFormat("empty key".to_string()));
    }

    if input.chars().all(|c| c.is_ascii_hexdigit()) {
        return match input.len() {
            n if n == HASH28_LEN * 2 => KeyHash::from_hex(input)
                .ok_or_else(|| MultisigError::KeyFormat(format!("bad key hash {:?}", input))),
            n if n == VKEY_LEN * 2 => {
                let vkey = hex::decode(input)
                    .map_err(|e| MultisigError::KeyFormat(format!("bad key {:?}: {}", input, e)))?;
                Ok(key_hash_of(&vkey))
            }
            n => Err(MultisigError::KeyFormat(format!(
                "hex key must be 56 (hash) or 64 (key) characters, got {}",
                n
            ))),
        };
    }

    let (hrp, data) = decode_bech32(input)?;
    match hrp.as_str() {
        "addr" | "addr_test" | "stake" | "stake_test" => key_from_address(input, role),
        prefix if prefix == role.vkh_prefix() => KeyHash::from_slice(&data)
            .ok_or_else(|| MultisigError::KeyFormat(format!("{} must be 28 bytes", prefix))),
        prefix if prefix == role.vk_prefix() && data.len() == VKEY_LEN => Ok(key_hash_of(&data)),
        "drep" if role == Role::DRep => match DRepId::parse(input)?.credential() {
            Credential::KeyHash(hash) => Ok(hash),
            Credential::ScriptHash(_) => Err(MultisigError::KeyFormat(
                "script DRep cannot be a signer".to_string(),
            )),
        },
        "cc_cold" if role == Role::CommitteeCold => committee_key(&data, CIP129_CC_COLD_KEY_HEADER),
        "cc_hot" if role == Role::CommitteeHot => committee_key(&data, CIP129_CC_HOT_KEY_HEADER),
        other => Err(MultisigError::KeyFormat(format!(
            "prefix {} cannot supply a {} key",
            other, role
        ))),
    }
}

fn key_from_address(input: &str, role: Role) -> Result<KeyHash, MultisigError> {
    let address = Address::parse(input)?;
    let credential = match role {
        Role::Payment => address.payment_credential(),
        Role::Stake => address.stake_credential(),
        other => {
            return Err(MultisigError::KeyFormat(format!(
                "an address cannot supply a {} key",
                other
            )))
        }
    };

    match credential {
        Some(Credential::KeyHash(hash)) => Ok(hash),
        Some(Credential::ScriptHash(_)) => Err(MultisigError::KeyFormat(format!(
            "{} credential of {} is a script, not a key",
            role, input
        ))),
        None => Err(MultisigError::KeyFormat(format!(
            "{} has no {} credential",
            input, role
        ))),
    }
}

fn committee_key(data: &[u8], expected_header: u8) -> Result<KeyHash, MultisigError> {
    match data.split_first() {
        Some((header, hash)) if *header == expected_header => KeyHash::from_slice(hash)
            .ok_or_else(|| MultisigError::KeyFormat("committee hash must be 28 bytes".to_string())),
        _ => Err(MultisigError::KeyFormat(
            "committee credential is not a key hash".to_string(),
        )),
    }
}

/// Role-tagged keys in configuration order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyRegistry {
    keys: Vec<ParticipantKey>,
}

impl KeyRegistry {
    /// Build a registry, rejecting duplicate keys within a role and
    /// participants holding two keys for the same role
    pub fn new(keys: Vec<ParticipantKey>) -> Result<Self, MultisigError> {
        for (i, key) in keys.iter().enumerate() {
            for earlier in &keys[..i] {
                if earlier.role != key.role {
                    continue;
                }
                if earlier.key_hash == key.key_hash {
                    return Err(MultisigError::DuplicateKeyForRole {
                        role: key.role,
                        key_hash: key.key_hash,
                    });
                }
                if earlier.display_name == key.display_name {
                    return Err(MultisigError::DuplicateRoleForParticipant {
                        participant: key.display_name.clone(),
                        role: key.role,
                    });
                }
            }
        }
        Ok(Self { keys })
    }

    pub fn all(&self) -> &[ParticipantKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys for `role`, in insertion order
    pub fn keys_for(&self, role: Role) -> impl Iterator<Item = &ParticipantKey> + '_ {
        self.keys.iter().filter(move |k| k.role == role)
    }

    pub fn count(&self, role: Role) -> usize {
        self.keys_for(role).count()
    }

    /// Distinct participants in first-seen order
    pub fn participants(&self) -> Vec<ParticipantId> {
        let mut seen = BTreeSet::new();
        self.keys
            .iter()
            .map(ParticipantKey::participant)
            .filter(|p| seen.insert(p.clone()))
            .collect()
    }

    pub fn holders(&self, role: Role) -> BTreeSet<ParticipantId> {
        self.keys_for(role)
            .map(ParticipantKey::participant)
            .collect()
    }

    pub fn key_of(&self, participant: &ParticipantId, role: Role) -> Option<&ParticipantKey> {
        self.keys_for(role)
            .find(|k| k.display_name == participant.as_str())
    }

    /// Whether every payment-key holder also holds a key for `role`
    pub fn covers(&self, role: Role) -> bool {
        let holders = self.holders(role);
        !holders.is_empty() && self.holders(Role::Payment).is_subset(&holders)
    }
}
