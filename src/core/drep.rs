//! DRep identifiers
//!
//! Two bech32 encodings are in circulation. CIP-105 uses distinct prefixes
//! for key and script credentials over the bare 28-byte hash; CIP-129 puts a
//! one-byte header in front of the hash and always uses `drep`. Both are
//! produced and parsed here so policies registered under either remain
//! resolvable.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::address::{decode_bech32, encode_bech32, Credential};
use super::hash::{KeyHash, ScriptHash};
use crate::crypto::HASH28_LEN;
use crate::multisig::MultisigError;

const DREP_HRP: &str = "drep";
const DREP_SCRIPT_HRP: &str = "drep_script";

/// CIP-129 header: governance key type `0010`, credential type in low nibble
const CIP129_DREP_KEY_HEADER: u8 = 0x22;
const CIP129_DREP_SCRIPT_HEADER: u8 = 0x23;

/// Which bech32 encoding an identifier was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DRepEncoding {
    /// CIP-105: `drep` / `drep_script` over the bare hash
    Cip105,
    /// CIP-129: `drep` over header byte plus hash
    Cip129,
}

/// A DRep credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DRepId {
    credential: Credential,
}

impl DRepId {
    pub fn from_script_hash(hash: ScriptHash) -> Self {
        Self {
            credential: Credential::ScriptHash(hash),
        }
    }

    pub fn from_key_hash(hash: KeyHash) -> Self {
        Self {
            credential: Credential::KeyHash(hash),
        }
    }

    pub fn credential(&self) -> Credential {
        self.credential
    }

    fn cip129_header(&self) -> u8 {
        if self.credential.is_script() {
            CIP129_DREP_SCRIPT_HEADER
        } else {
            CIP129_DREP_KEY_HEADER
        }
    }

    /// Legacy CIP-105 encoding
    pub fn to_cip105(&self) -> Result<String, MultisigError> {
        let hrp = if self.credential.is_script() {
            DREP_SCRIPT_HRP
        } else {
            DREP_HRP
        };
        encode_bech32(hrp, self.credential.as_bytes())
    }

    /// Current CIP-129 encoding
    pub fn to_cip129(&self) -> Result<String, MultisigError> {
        encode_bech32(DREP_HRP, &self.cip129_bytes())
    }

    /// CIP-129 header plus hash, hex encoded
    pub fn to_cip129_hex(&self) -> String {
        hex::encode(self.cip129_bytes())
    }

    pub fn encode(&self, encoding: DRepEncoding) -> Result<String, MultisigError> {
        match encoding {
            DRepEncoding::Cip105 => self.to_cip105(),
            DRepEncoding::Cip129 => self.to_cip129(),
        }
    }

    fn cip129_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HASH28_LEN + 1);
        bytes.push(self.cip129_header());
        bytes.extend_from_slice(self.credential.as_bytes());
        bytes
    }

    fn from_cip129_bytes(bytes: &[u8]) -> Result<Self, MultisigError> {
        let (header, hash) = bytes
            .split_first()
            .ok_or_else(|| MultisigError::KeyFormat("empty DRep id".to_string()))?;
        let invalid = || MultisigError::KeyFormat("DRep hash must be 28 bytes".to_string());
        match *header {
            CIP129_DREP_KEY_HEADER => Ok(Self::from_key_hash(
                KeyHash::from_slice(hash).ok_or_else(invalid)?,
            )),
            CIP129_DREP_SCRIPT_HEADER => Ok(Self::from_script_hash(
                ScriptHash::from_slice(hash).ok_or_else(invalid)?,
            )),
            other => Err(MultisigError::KeyFormat(format!(
                "unexpected CIP-129 DRep header {:#04x}",
                other
            ))),
        }
    }

    /// Parse any supported encoding and report which one it was
    pub fn parse_with_encoding(s: &str) -> Result<(Self, DRepEncoding), MultisigError> {
        let s = s.trim();
        if let Ok(bytes) = hex::decode(s) {
            return Ok((Self::from_cip129_bytes(&bytes)?, DRepEncoding::Cip129));
        }

        let (hrp, data) = decode_bech32(s)?;
        let invalid = || MultisigError::KeyFormat(format!("malformed DRep id {:?}", s));
        match (hrp.as_str(), data.len()) {
            (DREP_HRP, HASH28_LEN) => Ok((
                Self::from_key_hash(KeyHash::from_slice(&data).ok_or_else(invalid)?),
                DRepEncoding::Cip105,
            )),
            (DREP_SCRIPT_HRP, HASH28_LEN) => Ok((
                Self::from_script_hash(ScriptHash::from_slice(&data).ok_or_else(invalid)?),
                DRepEncoding::Cip105,
            )),
            (DREP_HRP, len) if len == HASH28_LEN + 1 => {
                Ok((Self::from_cip129_bytes(&data)?, DRepEncoding::Cip129))
            }
            _ => Err(invalid()),
        }
    }

    pub fn parse(s: &str) -> Result<Self, MultisigError> {
        Self::parse_with_encoding(s).map(|(id, _)| id)
    }
}

impl fmt::Display for DRepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.to_cip129().map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

/// Re-encode a DRep id from either encoding into the requested one
pub fn convert_drep_id(id: &str, target: DRepEncoding) -> Result<String, MultisigError> {
    DRepId::parse(id)?.encode(target)
}
