//! Unspent outputs supplied by a chain indexer
//!
//! The engine never fetches these itself; callers pass whatever list their
//! indexer returned and the wallet filters it to its own address.

use serde::{Deserialize, Serialize};

/// An unspent transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub tx_hash: String,
    pub output_index: u32,
    /// Bech32 address holding the output
    pub address: String,
    pub lovelace: u64,
}

impl Utxo {
    pub fn new(tx_hash: &str, output_index: u32, address: &str, lovelace: u64) -> Self {
        Self {
            tx_hash: tx_hash.to_string(),
            output_index,
            address: address.to_string(),
            lovelace,
        }
    }

    /// `tx_hash#index` reference
    pub fn out_ref(&self) -> String {
        format!("{}#{}", self.tx_hash, self.output_index)
    }
}
