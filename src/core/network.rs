//! Target network selection
//!
//! The network is always an explicit argument to derivation; nothing in the
//! crate reads an ambient "current network".

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::multisig::MultisigError;

/// Network id encoded in the low nibble of a Shelley address header
pub const MAINNET_ID: u8 = 1;
pub const TESTNET_ID: u8 = 0;

/// A Cardano network family
///
/// Preprod and preview share the testnet id and prefixes, so they collapse
/// into [`Network::Testnet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Resolve a numeric network id
    pub fn from_id(id: u8) -> Result<Self, MultisigError> {
        match id {
            MAINNET_ID => Ok(Network::Mainnet),
            TESTNET_ID => Ok(Network::Testnet),
            other => Err(MultisigError::UnsupportedNetwork(other.to_string())),
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            Network::Mainnet => MAINNET_ID,
            Network::Testnet => TESTNET_ID,
        }
    }

    /// Bech32 prefix for payment addresses
    pub fn address_hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "addr",
            Network::Testnet => "addr_test",
        }
    }

    /// Bech32 prefix for reward (stake) addresses
    pub fn stake_hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "stake",
            Network::Testnet => "stake_test",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = MultisigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "1" => Ok(Network::Mainnet),
            "testnet" | "preprod" | "preview" | "0" => Ok(Network::Testnet),
            other => Err(MultisigError::UnsupportedNetwork(other.to_string())),
        }
    }
}

impl TryFrom<u8> for Network {
    type Error = MultisigError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Network::from_id(id)
    }
}

impl Serialize for Network {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Network {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Id(u8),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Id(id) => Network::from_id(id),
            Repr::Name(name) => name.parse(),
        }
        .map_err(serde::de::Error::custom)
    }
}
