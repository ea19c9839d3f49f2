//! Chain-level value types
//!
//! This module contains the fundamental building blocks shared by the
//! policy engine:
//! - Key and script hashes
//! - Network selection
//! - Shelley addresses and credentials
//! - DRep identifiers (CIP-105 and CIP-129)
//! - The native script AST with its canonical encoding
//! - Externally supplied UTxOs

pub mod address;
pub mod drep;
pub mod hash;
pub mod network;
pub mod script;
pub mod utxo;

pub use address::{Address, Credential};
pub use drep::{convert_drep_id, DRepEncoding, DRepId};
pub use hash::{KeyHash, ScriptHash};
pub use network::{Network, MAINNET_ID, TESTNET_ID};
pub use script::{NativeScript, NATIVE_SCRIPT_TAG};
pub use utxo::Utxo;
