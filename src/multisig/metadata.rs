//! Registration metadata
//!
//! A wallet publishes its policy under transaction metadata label 1854 so
//! that any participant can rebuild the same scripts from chain data alone.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::builder::ThresholdRule;
use super::error::MultisigError;
use super::keys::{ParticipantKey, Role};
use super::wallet::MultisigPolicy;
use crate::core::{Credential, NativeScript, Network};

/// Metadata label wallets register under
pub const REGISTRATION_METADATA_LABEL: u64 = 1854;

/// Published description of a policy
///
/// `participants` keeps configuration order; scripts depend on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDocument {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub network: Network,
    pub threshold: ThresholdRule,
    pub participants: Vec<ParticipantKey>,
    pub scripts: BTreeMap<Role, NativeScript>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake_credential: Option<Credential>,
}

impl MetadataDocument {
    pub fn from_policy(policy: &MultisigPolicy) -> Self {
        let scripts = Role::ALL
            .into_iter()
            .filter_map(|role| policy.script_for(role).map(|s| (role, s.clone())))
            .collect();

        Self {
            name: policy.name().to_string(),
            description: policy.description().to_string(),
            network: policy.network(),
            threshold: policy.threshold(),
            participants: policy.participants().to_vec(),
            scripts,
            stake_credential: policy.stake_credential_override(),
        }
    }

    /// The document keyed by its metadata label
    pub fn to_metadata_json(&self) -> Result<Value, MultisigError> {
        let body =
            serde_json::to_value(self).map_err(|e| MultisigError::InvalidPayload(e.to_string()))?;
        let mut labelled = Map::new();
        labelled.insert(REGISTRATION_METADATA_LABEL.to_string(), body);
        Ok(Value::Object(labelled))
    }

    /// Parse a document, either bare or keyed by its metadata label
    pub fn from_metadata_json(value: &Value) -> Result<Self, MultisigError> {
        let body = value
            .get(REGISTRATION_METADATA_LABEL.to_string())
            .unwrap_or(value);
        serde_json::from_value(body.clone())
            .map_err(|e| MultisigError::MetadataMismatch(format!("malformed document: {}", e)))
    }
}
