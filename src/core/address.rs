//! Shelley-era addresses
//!
//! Only the address kinds a multisig wallet produces or consumes are
//! modelled: base, enterprise and reward addresses. Byron and pointer
//! addresses are rejected.

use bech32::{Bech32, Hrp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::hash::{KeyHash, ScriptHash};
use super::network::Network;
use crate::crypto::HASH28_LEN;
use crate::multisig::MultisigError;

const BASE_ADDRESS_LEN: usize = 1 + 2 * HASH28_LEN;
const SHORT_ADDRESS_LEN: usize = 1 + HASH28_LEN;

const HEADER_BASE: u8 = 0b0000;
const HEADER_POINTER: u8 = 0b0100;
const HEADER_ENTERPRISE: u8 = 0b0110;
const HEADER_REWARD: u8 = 0b1110;

/// Encode `data` as bech32 under `hrp`
pub(crate) fn encode_bech32(hrp: &str, data: &[u8]) -> Result<String, MultisigError> {
    let hrp = Hrp::parse(hrp).map_err(|e| MultisigError::KeyFormat(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, data).map_err(|e| MultisigError::KeyFormat(e.to_string()))
}

/// Decode a bech32 string into its lowercase prefix and payload
pub(crate) fn decode_bech32(s: &str) -> Result<(String, Vec<u8>), MultisigError> {
    let (hrp, data) = bech32::decode(s.trim())
        .map_err(|e| MultisigError::KeyFormat(format!("invalid bech32 {:?}: {}", s, e)))?;
    Ok((hrp.to_string().to_ascii_lowercase(), data))
}

/// Payment or stake credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "hash", rename_all = "camelCase")]
pub enum Credential {
    KeyHash(KeyHash),
    ScriptHash(ScriptHash),
}

impl Credential {
    pub fn as_bytes(&self) -> &[u8; HASH28_LEN] {
        match self {
            Credential::KeyHash(h) => h.as_bytes(),
            Credential::ScriptHash(h) => h.as_bytes(),
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, Credential::ScriptHash(_))
    }

    fn from_bytes(bytes: &[u8], script: bool) -> Result<Self, MultisigError> {
        let invalid = || MultisigError::KeyFormat("credential must be 28 bytes".to_string());
        Ok(if script {
            Credential::ScriptHash(ScriptHash::from_slice(bytes).ok_or_else(invalid)?)
        } else {
            Credential::KeyHash(KeyHash::from_slice(bytes).ok_or_else(invalid)?)
        })
    }
}

/// A Shelley address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// Payment credential plus delegation credential
    Base {
        network: Network,
        payment: Credential,
        stake: Credential,
    },
    /// Payment credential only
    Enterprise {
        network: Network,
        payment: Credential,
    },
    /// Reward account of a stake credential
    Reward {
        network: Network,
        stake: Credential,
    },
}

impl Address {
    pub fn network(&self) -> Network {
        match self {
            Address::Base { network, .. }
            | Address::Enterprise { network, .. }
            | Address::Reward { network, .. } => *network,
        }
    }

    pub fn payment_credential(&self) -> Option<Credential> {
        match self {
            Address::Base { payment, .. } | Address::Enterprise { payment, .. } => Some(*payment),
            Address::Reward { .. } => None,
        }
    }

    pub fn stake_credential(&self) -> Option<Credential> {
        match self {
            Address::Base { stake, .. } | Address::Reward { stake, .. } => Some(*stake),
            Address::Enterprise { .. } => None,
        }
    }

    /// Header byte: address kind in the high nibble, network id in the low
    pub fn header(&self) -> u8 {
        let kind = match self {
            Address::Base { payment, stake, .. } => {
                HEADER_BASE | payment.is_script() as u8 | (stake.is_script() as u8) << 1
            }
            Address::Enterprise { payment, .. } => HEADER_ENTERPRISE | payment.is_script() as u8,
            Address::Reward { stake, .. } => HEADER_REWARD | stake.is_script() as u8,
        };
        kind << 4 | self.network().id()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![self.header()];
        match self {
            Address::Base { payment, stake, .. } => {
                bytes.extend_from_slice(payment.as_bytes());
                bytes.extend_from_slice(stake.as_bytes());
            }
            Address::Enterprise { payment, .. } => bytes.extend_from_slice(payment.as_bytes()),
            Address::Reward { stake, .. } => bytes.extend_from_slice(stake.as_bytes()),
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MultisigError> {
        let header = *bytes
            .first()
            .ok_or_else(|| MultisigError::KeyFormat("empty address".to_string()))?;
        let network = Network::from_id(header & 0x0f)?;
        let kind = header >> 4;
        let expect_len = |len: usize| {
            if bytes.len() == len {
                Ok(())
            } else {
                Err(MultisigError::KeyFormat(format!(
                    "address of kind {} must be {} bytes, got {}",
                    kind,
                    len,
                    bytes.len()
                )))
            }
        };

        match kind {
            0..=3 => {
                expect_len(BASE_ADDRESS_LEN)?;
                Ok(Address::Base {
                    network,
                    payment: Credential::from_bytes(&bytes[1..SHORT_ADDRESS_LEN], kind & 1 == 1)?,
                    stake: Credential::from_bytes(&bytes[SHORT_ADDRESS_LEN..], kind & 2 == 2)?,
                })
            }
            6 | 7 => {
                expect_len(SHORT_ADDRESS_LEN)?;
                Ok(Address::Enterprise {
                    network,
                    payment: Credential::from_bytes(&bytes[1..], kind == 7)?,
                })
            }
            14 | 15 => {
                expect_len(SHORT_ADDRESS_LEN)?;
                Ok(Address::Reward {
                    network,
                    stake: Credential::from_bytes(&bytes[1..], kind == 15)?,
                })
            }
            k if k >> 1 == HEADER_POINTER >> 1 => Err(MultisigError::KeyFormat(
                "pointer addresses are not supported".to_string(),
            )),
            _ => Err(MultisigError::KeyFormat(format!(
                "unsupported address header {:#04x}",
                header
            ))),
        }
    }

    pub fn hrp(&self) -> &'static str {
        match self {
            Address::Reward { network, .. } => network.stake_hrp(),
            other => other.network().address_hrp(),
        }
    }

    pub fn to_bech32(&self) -> Result<String, MultisigError> {
        encode_bech32(self.hrp(), &self.to_bytes())
    }

    /// Parse a bech32 address, checking the prefix agrees with the header
    pub fn parse(s: &str) -> Result<Self, MultisigError> {
        let (hrp, data) = decode_bech32(s)?;
        let address = Address::from_bytes(&data)?;
        if hrp != address.hrp() {
            return Err(MultisigError::KeyFormat(format!(
                "prefix {} does not match address header (expected {})",
                hrp,
                address.hrp()
            )));
        }
        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.to_bech32().map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

impl FromStr for Address {
    type Err = MultisigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}
