//! 28-byte chain identifiers
//!
//! Key hashes and script hashes share a representation but never mix: a
//! native script `sig` leaf only accepts a [`KeyHash`] and an address
//! credential says explicitly which of the two it carries.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::crypto::HASH28_LEN;

macro_rules! hash28 {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; HASH28_LEN]);

        impl $name {
            pub const fn new(bytes: [u8; HASH28_LEN]) -> Self {
                Self(bytes)
            }

            /// Build from a slice, failing unless it is exactly 28 bytes
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                let bytes: [u8; HASH28_LEN] = bytes.try_into().ok()?;
                Some(Self(bytes))
            }

            /// Parse 56 hex characters
            pub fn from_hex(s: &str) -> Option<Self> {
                let bytes = hex::decode(s.trim()).ok()?;
                Self::from_slice(&bytes)
            }

            pub fn as_bytes(&self) -> &[u8; HASH28_LEN] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s).ok_or_else(|| format!("expected 56 hex characters, got {:?}", s))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hash28!(
    /// BLAKE2b-224 of an Ed25519 verification key
    KeyHash
);

hash28!(
    /// BLAKE2b-224 of a tagged, serialized script
    ScriptHash
);
