//! Script hash, address and DRep derivation
//!
//! Everything here is recomputed from a script and an explicit network.
//! Persisted copies of these values are caches of a specific policy and
//! must be thrown away when the policy changes.

use serde::{Deserialize, Serialize};

use super::error::MultisigError;
use super::keys::Role;
use super::wallet::MultisigPolicy;
use crate::core::{Address, Credential, DRepId, NativeScript, Network, ScriptHash, Utxo};

/// Hash of the canonical script serialization
pub fn derive_script_hash(script: &NativeScript) -> ScriptHash {
    script.hash()
}

/// Payment address locked by `script`
///
/// With a stake credential this is a base address, otherwise an enterprise
/// address.
pub fn derive_address(
    script: &NativeScript,
    network: Network,
    stake_credential: Option<Credential>,
) -> Address {
    let payment = Credential::ScriptHash(derive_script_hash(script));
    match stake_credential {
        Some(stake) => Address::Base {
            network,
            payment,
            stake,
        },
        None => Address::Enterprise { network, payment },
    }
}

/// [`derive_address`] for a raw network id
///
/// Fails with `UnsupportedNetwork` for ids other than 0 and 1.
pub fn derive_address_for_network_id(
    script: &NativeScript,
    network_id: u8,
    stake_credential: Option<Credential>,
) -> Result<Address, MultisigError> {
    Ok(derive_address(
        script,
        Network::from_id(network_id)?,
        stake_credential,
    ))
}

/// Reward address of a stake script
pub fn derive_stake_address(script: &NativeScript, network: Network) -> Address {
    Address::Reward {
        network,
        stake: Credential::ScriptHash(derive_script_hash(script)),
    }
}

/// DRep credential of a governance script
pub fn derive_drep_id(script: &NativeScript) -> DRepId {
    DRepId::from_script_hash(derive_script_hash(script))
}

/// Addresses and identifiers of one policy on one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedAddressSet {
    pub network: Network,
    pub script_hash: ScriptHash,
    pub payment_address: String,
    pub stake_address: Option<String>,
    /// CIP-129 encoding
    pub drep_id: Option<String>,
    /// CIP-105 encoding of the same credential
    pub drep_id_legacy: Option<String>,
}

impl DerivedAddressSet {
    /// Derive everything `policy` exposes on `network`
    pub fn derive(policy: &MultisigPolicy, network: Network) -> Result<Self, MultisigError> {
        let payment_script = policy
            .script_for(Role::Payment)
            .ok_or(MultisigError::NoParticipants)?;

        let stake_credential = policy.stake_credential();
        let payment_address = derive_address(payment_script, network, stake_credential);
        let stake_address = stake_credential
            .map(|stake| Address::Reward { network, stake }.to_bech32())
            .transpose()?;

        let drep = policy.script_for(Role::DRep).map(derive_drep_id);
        let drep_id = drep.map(|id| id.to_cip129()).transpose()?;
        let drep_id_legacy = drep.map(|id| id.to_cip105()).transpose()?;

        Ok(Self {
            network,
            script_hash: derive_script_hash(payment_script),
            payment_address: payment_address.to_bech32()?,
            stake_address,
            drep_id,
            drep_id_legacy,
        })
    }

    /// UTxOs held at this wallet's payment address
    pub fn owned_utxos<'a>(&self, utxos: &'a [Utxo]) -> Vec<&'a Utxo> {
        utxos
            .iter()
            .filter(|u| u.address == self.payment_address)
            .collect()
    }

    /// Total lovelace held at this wallet's payment address
    pub fn balance(&self, utxos: &[Utxo]) -> u64 {
        self.owned_utxos(utxos)
            .iter()
            .map(|u| u.lovelace)
            .fold(0u64, u64::saturating_add)
    }
}
