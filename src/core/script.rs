//! Native script AST
//!
//! A native script is a boolean combination of required signatures and
//! validity-interval bounds. The JSON form uses the field names established
//! by the chain tooling (`type`, `keyHash`, `scripts`, `required`, `slot`);
//! the binary form is the definite-length CBOR the ledger hashes.

use serde::{Deserialize, Serialize};

use super::hash::{KeyHash, ScriptHash};
use crate::crypto::blake2b_224;
use crate::multisig::MultisigError;

// =============================================================================
// Script Constants
// =============================================================================

/// Language tag prepended to native scripts before hashing
pub const NATIVE_SCRIPT_TAG: u8 = 0x00;

const TAG_SIG: u64 = 0;
const TAG_ALL: u64 = 1;
const TAG_ANY: u64 = 2;
const TAG_AT_LEAST: u64 = 3;
const TAG_INVALID_BEFORE: u64 = 4;
const TAG_INVALID_HEREAFTER: u64 = 5;

// =============================================================================
// Native Script
// =============================================================================

/// A native script node
///
/// Children keep the order they were given in; reordering them changes the
/// serialized bytes and therefore the script hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NativeScript {
    /// Requires a signature from the key with this hash
    #[serde(rename = "sig")]
    Sig {
        #[serde(rename = "keyHash")]
        key_hash: KeyHash,
    },
    /// Every child must be satisfied
    #[serde(rename = "all")]
    AllOf { scripts: Vec<NativeScript> },
    /// At least one child must be satisfied
    #[serde(rename = "any")]
    AnyOf { scripts: Vec<NativeScript> },
    /// At least `required` children must be satisfied
    #[serde(rename = "atLeast")]
    AtLeastOf {
        required: u32,
        scripts: Vec<NativeScript>,
    },
    /// Valid only from `slot` onwards
    #[serde(rename = "after")]
    InvalidBefore { slot: u64 },
    /// Valid only before `slot`
    #[serde(rename = "before")]
    InvalidHereafter { slot: u64 },
}

impl NativeScript {
    pub fn sig(key_hash: KeyHash) -> Self {
        NativeScript::Sig { key_hash }
    }

    /// Canonical CBOR encoding
    pub fn to_cbor(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    pub fn to_cbor_hex(&self) -> String {
        hex::encode(self.to_cbor())
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            NativeScript::Sig { key_hash } => {
                cbor_array_header(out, 2);
                cbor_uint(out, TAG_SIG);
                cbor_bytes(out, key_hash.as_bytes());
            }
            NativeScript::AllOf { scripts } => {
                cbor_array_header(out, 2);
                cbor_uint(out, TAG_ALL);
                encode_children(out, scripts);
            }
            NativeScript::AnyOf { scripts } => {
                cbor_array_header(out, 2);
                cbor_uint(out, TAG_ANY);
                encode_children(out, scripts);
            }
            NativeScript::AtLeastOf { required, scripts } => {
                cbor_array_header(out, 3);
                cbor_uint(out, TAG_AT_LEAST);
                cbor_uint(out, u64::from(*required));
                encode_children(out, scripts);
            }
            NativeScript::InvalidBefore { slot } => {
                cbor_array_header(out, 2);
                cbor_uint(out, TAG_INVALID_BEFORE);
                cbor_uint(out, *slot);
            }
            NativeScript::InvalidHereafter { slot } => {
                cbor_array_header(out, 2);
                cbor_uint(out, TAG_INVALID_HEREAFTER);
                cbor_uint(out, *slot);
            }
        }
    }

    /// BLAKE2b-224 over the language tag and the canonical CBOR
    pub fn hash(&self) -> ScriptHash {
        let mut tagged = vec![NATIVE_SCRIPT_TAG];
        self.encode(&mut tagged);
        ScriptHash::new(blake2b_224(&tagged))
    }

    /// Every `sig` leaf, depth first, in child order
    pub fn key_hashes(&self) -> Vec<KeyHash> {
        let mut hashes = Vec::new();
        self.collect_key_hashes(&mut hashes);
        hashes
    }

    fn collect_key_hashes(&self, acc: &mut Vec<KeyHash>) {
        match self {
            NativeScript::Sig { key_hash } => acc.push(*key_hash),
            NativeScript::AllOf { scripts }
            | NativeScript::AnyOf { scripts }
            | NativeScript::AtLeastOf { scripts, .. } => {
                for script in scripts {
                    script.collect_key_hashes(acc);
                }
            }
            NativeScript::InvalidBefore { .. } | NativeScript::InvalidHereafter { .. } => {}
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, MultisigError> {
        NativeScript::deserialize(value)
            .map_err(|e| MultisigError::KeyFormat(format!("invalid native script JSON: {}", e)))
    }
}

fn encode_children(out: &mut Vec<u8>, scripts: &[NativeScript]) {
    cbor_array_header(out, scripts.len() as u64);
    for script in scripts {
        script.encode(out);
    }
}

// =============================================================================
// Minimal CBOR writer (major types 0, 2 and 4, shortest-form lengths)
// =============================================================================

fn cbor_head(out: &mut Vec<u8>, major: u8, value: u64) {
    let major = major << 5;
    match value {
        0..=23 => out.push(major | value as u8),
        24..=0xff => {
            out.push(major | 24);
            out.push(value as u8);
        }
        0x100..=0xffff => {
            out.push(major | 25);
            out.extend_from_slice(&(value as u16).to_be_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(major | 26);
            out.extend_from_slice(&(value as u32).to_be_bytes());
        }
        _ => {
            out.push(major | 27);
            out.extend_from_slice(&value.to_be_bytes());
        }
    }
}

fn cbor_uint(out: &mut Vec<u8>, value: u64) {
    cbor_head(out, 0, value);
}

fn cbor_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    cbor_head(out, 2, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn cbor_array_header(out: &mut Vec<u8>, len: u64) {
    cbor_head(out, 4, len);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kh(byte: u8) -> KeyHash {
        KeyHash::new([byte; 28])
    }

    #[test]
    fn test_sig_cbor_layout() {
        let cbor = NativeScript::sig(kh(0xaa)).to_cbor();
        assert_eq!(&cbor[..4], &[0x82, 0x00, 0x58, 0x1c]);
        assert_eq!(&cbor[4..], &[0xaa; 28]);
        assert_eq!(cbor.len(), 32);
    }

    #[test]
    fn test_at_least_cbor_layout() {
        let script = NativeScript::AtLeastOf {
            required: 2,
            scripts: vec![NativeScript::sig(kh(1)), NativeScript::sig(kh(2))],
        };
        let cbor = script.to_cbor();
        assert_eq!(&cbor[..4], &[0x83, 0x03, 0x02, 0x82]);
        assert_eq!(cbor.len(), 4 + 2 * 32);
    }

    #[test]
    fn test_timelock_cbor_layout() {
        let after = NativeScript::InvalidBefore { slot: 1000 };
        assert_eq!(after.to_cbor(), vec![0x82, 0x04, 0x19, 0x03, 0xe8]);
        let before = NativeScript::InvalidHereafter { slot: 70_000 };
        assert_eq!(
            before.to_cbor(),
            vec![0x82, 0x05, 0x1a, 0x00, 0x01, 0x11, 0x70]
        );
    }

    #[test]
    fn test_large_child_list_uses_long_header() {
        let scripts: Vec<NativeScript> = (0..30).map(|i| NativeScript::sig(kh(i))).collect();
        let cbor = NativeScript::AllOf { scripts }.to_cbor();
        assert_eq!(&cbor[..4], &[0x82, 0x01, 0x98, 30]);
    }

    fn hex_key(s: &str) -> KeyHash {
        KeyHash::from_hex(s).unwrap()
    }

    #[test]
    fn test_known_sig_script_hash() {
        let script = NativeScript::sig(hex_key(
            "9493315cd92eb5d8c4304e67b7e16ae36d61d34502694657811a2c8e",
        ));
        assert_eq!(
            script.to_cbor_hex(),
            "8200581c9493315cd92eb5d8c4304e67b7e16ae36d61d34502694657811a2c8e"
        );
        assert_eq!(
            script.hash().to_hex(),
            "50a522a459c26f001233aab967abd28daca949e80aad046d97b88b6f"
        );
    }

    #[test]
    fn test_known_at_least_script_hash() {
        let script = NativeScript::AtLeastOf {
            required: 2,
            scripts: vec![
                NativeScript::sig(hex_key(
                    "9493315cd92eb5d8c4304e67b7e16ae36d61d34502694657811a2c8e",
                )),
                NativeScript::sig(hex_key(
                    "337b62cfff6403a06a3acbc34f8c46003c69fe79a3628cefa9c47251",
                )),
                NativeScript::sig(hex_key(
                    "c37b1b5dc0669f1d3c61a6fddb2e8fde96be87b881c60bce8e8d542f",
                )),
            ],
        };
        assert_eq!(
            script.to_cbor_hex(),
            concat!(
                "830302838200581c9493315cd92eb5d8c4304e67b7e16ae36d61d34502694657811a2c8e",
                "8200581c337b62cfff6403a06a3acbc34f8c46003c69fe79a3628cefa9c47251",
                "8200581cc37b1b5dc0669f1d3c61a6fddb2e8fde96be87b881c60bce8e8d542f"
            )
        );
        assert_eq!(
            script.hash().to_hex(),
            "c9b9f1d975a578f36cf928460f26a085e3bd2cd3a22bbf6673fa9d75"
        );
    }

    #[test]
    fn test_hash_covers_language_tag() {
        let script = NativeScript::sig(kh(3));
        let mut tagged = vec![0x00];
        tagged.extend(script.to_cbor());
        assert_eq!(script.hash(), ScriptHash::new(blake2b_224(&tagged)));
        assert_ne!(script.hash().as_bytes(), &blake2b_224(&script.to_cbor()));
    }

    #[test]
    fn test_child_order_changes_hash() {
        let a = NativeScript::AllOf {
            scripts: vec![NativeScript::sig(kh(1)), NativeScript::sig(kh(2))],
        };
        let b = NativeScript::AllOf {
            scripts: vec![NativeScript::sig(kh(2)), NativeScript::sig(kh(1))],
        };
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_json_field_names() {
        let script = NativeScript::AtLeastOf {
            required: 1,
            scripts: vec![
                NativeScript::sig(kh(1)),
                NativeScript::InvalidHereafter { slot: 99 },
            ],
        };
        let expected = json!({
            "type": "atLeast",
            "required": 1,
            "scripts": [
                { "type": "sig", "keyHash": "01".repeat(28) },
                { "type": "before", "slot": 99 }
            ]
        });
        assert_eq!(script.to_json(), expected);
        assert_eq!(NativeScript::from_json(&expected).unwrap(), script);
    }

    #[test]
    fn test_from_json_rejects_unknown_type() {
        let value = json!({ "type": "some", "scripts": [] });
        assert!(matches!(
            NativeScript::from_json(&value),
            Err(MultisigError::KeyFormat(_))
        ));
    }

    #[test]
    fn test_key_hashes_in_order() {
        let script = NativeScript::AnyOf {
            scripts: vec![
                NativeScript::sig(kh(5)),
                NativeScript::AllOf {
                    scripts: vec![
                        NativeScript::sig(kh(6)),
                        NativeScript::InvalidBefore { slot: 1 },
                    ],
                },
                NativeScript::sig(kh(4)),
            ],
        };
        assert_eq!(script.key_hashes(), vec![kh(5), kh(6), kh(4)]);
    }
}
