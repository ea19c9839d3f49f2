//! Pending multi-signature artifacts
//!
//! An artifact is either an unsigned transaction body or an arbitrary
//! signable payload, waiting for witnesses from the participants eligible
//! for one role of a policy. Every mutation goes through a method here that
//! checks the current state first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::builder::ThresholdRule;
use super::error::MultisigError;
use super::keys::{ParticipantId, Role};
use super::quorum::{QuorumState, QuorumStatus, QuorumTracker};
use super::wallet::MultisigPolicy;
use crate::core::KeyHash;
use crate::crypto::{blake2b_256, key_hash_of, sha256, verify_signature, KeyPair};

/// Lifecycle state of an artifact
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactState {
    /// Created, not yet proposed
    Draft,
    /// Proposed and collecting witnesses
    AwaitingQuorum,
    /// Quorum reached, ready to submit
    Ready,
    /// Handed to the submitter
    Submitted,
    /// Quorum can no longer be reached
    Rejected,
}

impl ArtifactState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ArtifactState::Submitted | ArtifactState::Rejected)
    }
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactState::Draft => "draft",
            ArtifactState::AwaitingQuorum => "awaiting quorum",
            ArtifactState::Ready => "ready",
            ArtifactState::Submitted => "submitted",
            ArtifactState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// What the participants are asked to sign
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ArtifactPayload {
    /// CBOR transaction body; witnesses sign its blake2b-256 hash
    Transaction {
        #[serde(with = "hex::serde")]
        body: Vec<u8>,
    },
    /// Arbitrary bytes, e.g. a governance vote rationale; signed as-is
    Signable {
        #[serde(with = "hex::serde")]
        payload: Vec<u8>,
        #[serde(default)]
        description: String,
    },
}

impl ArtifactPayload {
    /// Bytes a witness signature covers
    pub fn signing_payload(&self) -> Vec<u8> {
        match self {
            ArtifactPayload::Transaction { body } => blake2b_256(body).to_vec(),
            ArtifactPayload::Signable { payload, .. } => payload.clone(),
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            ArtifactPayload::Transaction { body } => body,
            ArtifactPayload::Signable { payload, .. } => payload,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ArtifactPayload::Transaction { .. } => "transaction",
            ArtifactPayload::Signable { .. } => "signable",
        }
    }
}

/// A verification key and its signature over an artifact
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VkeyWitness {
    /// Verification key (hex)
    pub vkey: String,
    /// Ed25519 signature (hex)
    pub signature: String,
    pub signed_at: DateTime<Utc>,
}

impl VkeyWitness {
    pub fn new(vkey: &[u8], signature: &[u8]) -> Self {
        Self {
            vkey: hex::encode(vkey),
            signature: hex::encode(signature),
            signed_at: Utc::now(),
        }
    }

    /// Key hash of the witnessing key
    pub fn key_hash(&self) -> Result<KeyHash, MultisigError> {
        let vkey = hex::decode(&self.vkey)
            .map_err(|e| MultisigError::KeyFormat(format!("witness key: {}", e)))?;
        Ok(key_hash_of(&vkey))
    }

    /// Check the signature over `payload`
    pub fn verify(&self, payload: &[u8]) -> Result<bool, MultisigError> {
        let vkey = hex::decode(&self.vkey)
            .map_err(|e| MultisigError::KeyFormat(format!("witness key: {}", e)))?;
        let signature = hex::decode(&self.signature)
            .map_err(|e| MultisigError::InvalidSignature(format!("signature encoding: {}", e)))?;
        verify_signature(&vkey, payload, &signature)
            .map_err(|e| MultisigError::InvalidSignature(e.to_string()))
    }
}

/// Checks a witness against an expected key hash
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, payload: &[u8], witness: &VkeyWitness, expected: &KeyHash) -> bool;
}

/// Ed25519 witness verification
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, payload: &[u8], witness: &VkeyWitness, expected: &KeyHash) -> bool {
        match witness.key_hash() {
            Ok(hash) if hash == *expected => matches!(witness.verify(payload), Ok(true)),
            _ => false,
        }
    }
}

/// A participant allowed to witness an artifact
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EligibleSigner {
    pub participant: ParticipantId,
    pub key_hash: KeyHash,
}

/// State change caused by one operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: ArtifactState,
    pub to: ArtifactState,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }

    /// True for exactly one operation in an artifact's life
    pub fn became_ready(&self) -> bool {
        self.from != ArtifactState::Ready && self.to == ArtifactState::Ready
    }
}

/// An artifact collecting witnesses
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingArtifact {
    pub id: String,
    /// Wallet the artifact belongs to
    pub policy_ref: String,
    pub role: Role,
    pub payload: ArtifactPayload,
    pub threshold: ThresholdRule,
    pub eligible: Vec<EligibleSigner>,
    pub signed_by: BTreeSet<ParticipantId>,
    pub rejected_by: BTreeSet<ParticipantId>,
    pub witnesses: BTreeMap<ParticipantId, VkeyWitness>,
    pub state: ArtifactState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingArtifact {
    /// Create a draft for `role` of `policy`
    pub fn draft(
        policy_ref: &str,
        policy: &MultisigPolicy,
        role: Role,
        payload: ArtifactPayload,
    ) -> Result<Self, MultisigError> {
        if payload.bytes().is_empty() {
            return Err(MultisigError::InvalidPayload(format!(
                "empty {} payload",
                payload.kind()
            )));
        }
        let eligible = policy
            .eligible_signers(role)
            .ok_or(MultisigError::RoleNotEnabled(role))?
            .into_iter()
            .map(|(participant, key_hash)| EligibleSigner {
                participant,
                key_hash,
            })
            .collect();

        let now = Utc::now();
        let nonce: [u8; 16] = rand::random();
        let id_data = format!(
            "{}{}{}{}{}",
            policy_ref,
            role,
            hex::encode(payload.bytes()),
            now.timestamp_nanos_opt().unwrap_or(0),
            hex::encode(nonce)
        );
        let id = hex::encode(&sha256(id_data.as_bytes())[..16]);

        Ok(Self {
            id,
            policy_ref: policy_ref.to_string(),
            role,
            payload,
            threshold: policy.threshold(),
            eligible,
            signed_by: BTreeSet::new(),
            rejected_by: BTreeSet::new(),
            witnesses: BTreeMap::new(),
            state: ArtifactState::Draft,
            tx_hash: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn signing_payload(&self) -> Vec<u8> {
        self.payload.signing_payload()
    }

    pub fn quorum(&self) -> QuorumStatus {
        QuorumTracker::evaluate(
            self.threshold,
            self.eligible.len(),
            self.signed_by.len(),
            self.rejected_by.len(),
        )
    }

    /// The participant holding `key_hash`, if eligible
    pub fn participant_for(&self, key_hash: &KeyHash) -> Option<&ParticipantId> {
        self.eligible
            .iter()
            .find(|s| s.key_hash == *key_hash)
            .map(|s| &s.participant)
    }

    fn eligible_key(&self, participant: &ParticipantId) -> Result<KeyHash, MultisigError> {
        self.eligible
            .iter()
            .find(|s| s.participant == *participant)
            .map(|s| s.key_hash)
            .ok_or_else(|| MultisigError::UnauthorizedSigner(participant.to_string()))
    }

    fn require(
        &self,
        allowed: &[ArtifactState],
        action: &'static str,
    ) -> Result<ArtifactState, MultisigError> {
        if allowed.contains(&self.state) {
            Ok(self.state)
        } else {
            Err(MultisigError::IllegalStateTransition {
                from: self.state,
                action,
            })
        }
    }

    fn check_witness(
        &self,
        participant: &ParticipantId,
        witness: &VkeyWitness,
        verifier: &dyn SignatureVerifier,
    ) -> Result<(), MultisigError> {
        let expected = self.eligible_key(participant)?;
        if self.rejected_by.contains(participant) {
            return Err(MultisigError::ConflictingResponse {
                participant: participant.to_string(),
                previous: "rejected",
            });
        }
        if !verifier.verify(&self.signing_payload(), witness, &expected) {
            return Err(MultisigError::InvalidSignature(participant.to_string()));
        }
        Ok(())
    }

    fn accept_witness(&mut self, participant: &ParticipantId, witness: VkeyWitness) {
        self.signed_by.insert(participant.clone());
        self.witnesses.insert(participant.clone(), witness);
    }

    /// Apply the quorum outcome to a non-terminal state
    fn reevaluate(&mut self, from: ArtifactState) -> Transition {
        let quorum = self.quorum();
        self.state = match (self.state, quorum.state) {
            (_, QuorumState::Rejected) => ArtifactState::Rejected,
            (ArtifactState::Draft, _) => ArtifactState::Draft,
            (_, QuorumState::Ready) => ArtifactState::Ready,
            (_, QuorumState::AwaitingQuorum) => ArtifactState::AwaitingQuorum,
        };
        self.updated_at = Utc::now();
        Transition {
            from,
            to: self.state,
        }
    }

    /// Open the artifact for witnesses, recording the proposer's own
    pub fn propose(
        &mut self,
        proposer: &ParticipantId,
        witness: VkeyWitness,
        verifier: &dyn SignatureVerifier,
    ) -> Result<Transition, MultisigError> {
        let from = self.require(&[ArtifactState::Draft], "propose")?;
        self.check_witness(proposer, &witness, verifier)?;

        self.accept_witness(proposer, witness);
        self.state = ArtifactState::AwaitingQuorum;
        Ok(self.reevaluate(from))
    }

    /// Record a witness from an eligible participant
    ///
    /// Signing twice is a no-op; the first witness is kept.
    pub fn record_signature(
        &mut self,
        participant: &ParticipantId,
        witness: VkeyWitness,
        verifier: &dyn SignatureVerifier,
    ) -> Result<Transition, MultisigError> {
        let from = self.require(
            &[ArtifactState::AwaitingQuorum, ArtifactState::Ready],
            "record a signature",
        )?;
        self.check_witness(participant, &witness, verifier)?;

        if self.signed_by.contains(participant) {
            return Ok(Transition { from, to: from });
        }
        self.accept_witness(participant, witness);
        Ok(self.reevaluate(from))
    }

    /// Record a participant's refusal to sign
    pub fn record_rejection(
        &mut self,
        participant: &ParticipantId,
    ) -> Result<Transition, MultisigError> {
        let from = self.require(
            &[
                ArtifactState::Draft,
                ArtifactState::AwaitingQuorum,
                ArtifactState::Ready,
            ],
            "record a rejection",
        )?;
        self.eligible_key(participant)?;
        if self.signed_by.contains(participant) {
            return Err(MultisigError::ConflictingResponse {
                participant: participant.to_string(),
                previous: "signed",
            });
        }

        if !self.rejected_by.insert(participant.clone()) {
            return Ok(Transition { from, to: from });
        }
        Ok(self.reevaluate(from))
    }

    /// Record a submission performed outside the coordinator
    pub fn mark_submitted(&mut self, tx_hash: &str) -> Result<Transition, MultisigError> {
        let from = self.require(&[ArtifactState::Ready], "mark submitted")?;
        self.state = ArtifactState::Submitted;
        self.tx_hash = Some(tx_hash.to_string());
        self.updated_at = Utc::now();
        Ok(Transition {
            from,
            to: self.state,
        })
    }

    /// Claim a ready artifact for submission before its hash is known
    pub(crate) fn begin_submission(&mut self) -> Result<Transition, MultisigError> {
        let from = self.require(&[ArtifactState::Ready], "submit")?;
        self.state = ArtifactState::Submitted;
        self.updated_at = Utc::now();
        Ok(Transition {
            from,
            to: self.state,
        })
    }

    /// Attach the hash returned by the submitter to a claimed artifact
    pub(crate) fn record_tx_hash(&mut self, tx_hash: &str) -> Result<Transition, MultisigError> {
        let from = self.require(&[ArtifactState::Submitted], "record a transaction hash")?;
        if self.tx_hash.is_none() {
            self.tx_hash = Some(tx_hash.to_string());
            self.updated_at = Utc::now();
        }
        Ok(Transition { from, to: from })
    }

    /// Re-validate against a rebuilt policy
    ///
    /// Responses from participants who are no longer eligible, or whose key
    /// changed, are dropped and the quorum is evaluated from scratch.
    pub fn rebind(&mut self, policy: &MultisigPolicy) -> Result<Transition, MultisigError> {
        let from = self.require(
            &[
                ArtifactState::Draft,
                ArtifactState::AwaitingQuorum,
                ArtifactState::Ready,
            ],
            "rebind",
        )?;

        self.eligible = policy
            .eligible_signers(self.role)
            .unwrap_or_default()
            .into_iter()
            .map(|(participant, key_hash)| EligibleSigner {
                participant,
                key_hash,
            })
            .collect();
        self.threshold = policy.threshold();

        let eligible = self.eligible.clone();
        let still_eligible = |p: &ParticipantId, witness: Option<&VkeyWitness>| {
            eligible.iter().any(|s| {
                s.participant == *p
                    && witness.map_or(true, |w| matches!(w.key_hash(), Ok(h) if h == s.key_hash))
            })
        };

        let witnesses = std::mem::take(&mut self.witnesses);
        self.witnesses = witnesses
            .into_iter()
            .filter(|(p, w)| still_eligible(p, Some(w)))
            .collect();
        let witnessed: BTreeSet<ParticipantId> = self.witnesses.keys().cloned().collect();
        self.signed_by.retain(|p| witnessed.contains(p));
        self.rejected_by.retain(|p| still_eligible(p, None));

        if self.state == ArtifactState::Ready {
            self.state = ArtifactState::AwaitingQuorum;
        }
        Ok(self.reevaluate(from))
    }

    /// Witnesses in script order
    pub fn witness_set(&self) -> Vec<&VkeyWitness> {
        self.eligible
            .iter()
            .filter_map(|s| self.witnesses.get(&s.participant))
            .collect()
    }
}

/// Witness `artifact` with `key_pair`
pub fn sign_artifact(artifact: &PendingArtifact, key_pair: &KeyPair) -> VkeyWitness {
    let signature = key_pair.sign(&artifact.signing_payload());
    VkeyWitness::new(&key_pair.public_key(), &signature)
}
