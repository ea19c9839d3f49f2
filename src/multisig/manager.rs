//! Artifact lifecycle coordinator
//!
//! Every mutation runs the same loop: load the current version, apply one
//! state-machine operation to it, write it back with compare-and-swap. A
//! stale write is retried against the fresh version, so preconditions and
//! signatures are always checked against the state the write lands on.

use std::error::Error;

use super::error::MultisigError;
use super::keys::{ParticipantId, Role};
use super::transaction::{
    ArtifactPayload, PendingArtifact, SignatureVerifier, Transition, VkeyWitness,
};
use super::wallet::MultisigPolicy;
use crate::storage::{ArtifactStore, StorageError, Versioned};

/// Hands a ready artifact to the chain
///
/// Returns the transaction hash on success.
pub trait Submitter {
    fn submit(&self, artifact: &PendingArtifact) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Result of one accepted operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleOutcome {
    pub artifact: PendingArtifact,
    pub transition: Transition,
}

/// Coordinates artifact state across concurrent participants
pub struct ArtifactLifecycle<S, V> {
    store: S,
    verifier: V,
}

impl<S: ArtifactStore, V: SignatureVerifier> ArtifactLifecycle<S, V> {
    pub fn new(store: S, verifier: V) -> Self {
        Self { store, verifier }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create and persist a draft
    pub fn create(
        &self,
        policy_ref: &str,
        policy: &MultisigPolicy,
        role: Role,
        payload: ArtifactPayload,
    ) -> Result<PendingArtifact, MultisigError> {
        let artifact = PendingArtifact::draft(policy_ref, policy, role, payload)?;
        self.store.insert(&artifact)?;
        log::info!(
            "Created {} artifact {} for {} ({} role, {} signers)",
            artifact.payload.kind(),
            artifact.id,
            policy_ref,
            role,
            artifact.eligible.len()
        );
        Ok(artifact)
    }

    pub fn get(&self, id: &str) -> Result<PendingArtifact, MultisigError> {
        self.store
            .load(id)?
            .map(|record| record.value)
            .ok_or_else(|| MultisigError::ArtifactNotFound(id.to_string()))
    }

    /// Artifacts belonging to `policy_ref`
    pub fn list_for(&self, policy_ref: &str) -> Result<Vec<PendingArtifact>, MultisigError> {
        let mut artifacts = Vec::new();
        for id in self.store.list_ids()? {
            if let Some(record) = self.store.load(&id)? {
                if record.value.policy_ref == policy_ref {
                    artifacts.push(record.value);
                }
            }
        }
        Ok(artifacts)
    }

    pub fn propose(
        &self,
        id: &str,
        proposer: &ParticipantId,
        witness: VkeyWitness,
    ) -> Result<LifecycleOutcome, MultisigError> {
        self.update(id, |artifact| {
            artifact.propose(proposer, witness.clone(), &self.verifier)
        })
    }

    pub fn record_signature(
        &self,
        id: &str,
        participant: &ParticipantId,
        witness: VkeyWitness,
    ) -> Result<LifecycleOutcome, MultisigError> {
        self.update(id, |artifact| {
            artifact.record_signature(participant, witness.clone(), &self.verifier)
        })
    }

    pub fn record_rejection(
        &self,
        id: &str,
        participant: &ParticipantId,
    ) -> Result<LifecycleOutcome, MultisigError> {
        self.update(id, |artifact| artifact.record_rejection(participant))
    }

    /// Record a submission made elsewhere
    pub fn mark_submitted(
        &self,
        id: &str,
        tx_hash: &str,
    ) -> Result<LifecycleOutcome, MultisigError> {
        self.update(id, |artifact| artifact.mark_submitted(tx_hash))
    }

    /// Submit a ready artifact at most once
    ///
    /// The artifact is claimed (`Ready` to `Submitted`) before the submitter
    /// runs, so a concurrent caller fails with `IllegalStateTransition`. A
    /// failed submission leaves the claim in place.
    pub fn submit(
        &self,
        id: &str,
        submitter: &dyn Submitter,
    ) -> Result<LifecycleOutcome, MultisigError> {
        let claimed = self.update(id, |artifact| artifact.begin_submission())?;

        let tx_hash = submitter.submit(&claimed.artifact).map_err(|e| {
            log::warn!("Submission of {} failed: {}", id, e);
            MultisigError::SubmissionFailed(e.to_string())
        })?;

        let recorded = self.update(id, |artifact| artifact.record_tx_hash(&tx_hash))?;
        Ok(LifecycleOutcome {
            artifact: recorded.artifact,
            transition: claimed.transition,
        })
    }

    /// Re-validate the open artifacts of `policy_ref` against a rebuilt policy
    pub fn on_policy_changed(
        &self,
        policy_ref: &str,
        policy: &MultisigPolicy,
    ) -> Result<Vec<LifecycleOutcome>, MultisigError> {
        let mut outcomes = Vec::new();
        for artifact in self.list_for(policy_ref)? {
            if artifact.state.is_terminal() {
                continue;
            }
            match self.update(&artifact.id, |a| a.rebind(policy)) {
                Ok(outcome) => outcomes.push(outcome),
                // finished concurrently
                Err(MultisigError::IllegalStateTransition { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        log::info!(
            "Re-validated {} open artifact(s) of {}",
            outcomes.len(),
            policy_ref
        );
        Ok(outcomes)
    }

    fn update<F>(&self, id: &str, mut apply: F) -> Result<LifecycleOutcome, MultisigError>
    where
        F: FnMut(&mut PendingArtifact) -> Result<Transition, MultisigError>,
    {
        let mut attempt = 1u32;
        loop {
            let Versioned { version, value } = self
                .store
                .load(id)?
                .ok_or_else(|| MultisigError::ArtifactNotFound(id.to_string()))?;

            let mut artifact = value.clone();
            let transition = apply(&mut artifact)?;
            if artifact == value {
                return Ok(LifecycleOutcome {
                    artifact,
                    transition,
                });
            }

            match self.store.compare_and_swap(&artifact, version) {
                Ok(_) => {
                    if transition.changed() {
                        log::info!("Artifact {}: {} -> {}", id, transition.from, transition.to);
                    }
                    return Ok(LifecycleOutcome {
                        artifact,
                        transition,
                    });
                }
                Err(StorageError::StaleVersion { actual, .. }) => {
                    log::debug!(
                        "Artifact {} moved to version {} (attempt {}), retrying",
                        id,
                        actual,
                        attempt
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Network;
    use crate::crypto::KeyPair;
    use crate::multisig::builder::ThresholdRule;
    use crate::multisig::keys::ParticipantKey;
    use crate::multisig::transaction::{sign_artifact, ArtifactState, Ed25519Verifier};
    use crate::storage::{FileArtifactStore, MemoryArtifactStore, StorageConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    type Lifecycle = ArtifactLifecycle<MemoryArtifactStore, Ed25519Verifier>;

    struct CountingSubmitter {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSubmitter {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl Submitter for CountingSubmitter {
        fn submit(
            &self,
            artifact: &PendingArtifact,
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("node unreachable".into());
            }
            Ok(format!("tx-{}", artifact.id))
        }
    }

    fn setup(n: usize, threshold: ThresholdRule) -> (Lifecycle, MultisigPolicy, Vec<KeyPair>) {
        let keys: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
        let participants = keys
            .iter()
            .enumerate()
            .map(|(i, k)| ParticipantKey::new(k.key_hash(), Role::Payment, &format!("p{}", i)))
            .collect();
        let policy =
            MultisigPolicy::new("vault", "", participants, threshold, Network::Testnet, None)
                .unwrap();
        let lifecycle = ArtifactLifecycle::new(MemoryArtifactStore::new(), Ed25519Verifier);
        (lifecycle, policy, keys)
    }

    fn pid(i: usize) -> ParticipantId {
        ParticipantId::new(&format!("p{}", i))
    }

    fn proposed(lifecycle: &Lifecycle, policy: &MultisigPolicy, keys: &[KeyPair]) -> String {
        let draft = lifecycle
            .create(
                "vault",
                policy,
                Role::Payment,
                ArtifactPayload::Transaction {
                    body: vec![0x84, 0xa0],
                },
            )
            .unwrap();
        let witness = sign_artifact(&draft, &keys[0]);
        lifecycle.propose(&draft.id, &pid(0), witness).unwrap();
        draft.id
    }

    #[test]
    fn test_full_lifecycle() {
        let (lifecycle, policy, keys) = setup(3, ThresholdRule::at_least(2));
        let id = proposed(&lifecycle, &policy, &keys);

        let artifact = lifecycle.get(&id).unwrap();
        assert_eq!(artifact.state, ArtifactState::AwaitingQuorum);

        let witness = sign_artifact(&artifact, &keys[1]);
        let outcome = lifecycle.record_signature(&id, &pid(1), witness).unwrap();
        assert!(outcome.transition.became_ready());

        let submitter = CountingSubmitter::new(false);
        let outcome = lifecycle.submit(&id, &submitter).unwrap();
        assert_eq!(outcome.artifact.state, ArtifactState::Submitted);
        assert_eq!(outcome.artifact.tx_hash, Some(format!("tx-{}", id)));
        assert_eq!(lifecycle.get(&id).unwrap(), outcome.artifact);

        let again = lifecycle.submit(&id, &submitter);
        assert!(matches!(
            again,
            Err(MultisigError::IllegalStateTransition {
                from: ArtifactState::Submitted,
                ..
            })
        ));
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_submission_is_not_retried() {
        let (lifecycle, policy, keys) = setup(1, ThresholdRule::All);
        let id = proposed(&lifecycle, &policy, &keys);

        let failing = CountingSubmitter::new(true);
        assert!(matches!(
            lifecycle.submit(&id, &failing),
            Err(MultisigError::SubmissionFailed(_))
        ));
        let artifact = lifecycle.get(&id).unwrap();
        assert_eq!(artifact.state, ArtifactState::Submitted);
        assert_eq!(artifact.tx_hash, None);

        let working = CountingSubmitter::new(false);
        assert!(lifecycle.submit(&id, &working).is_err());
        assert_eq!(working.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_signature_leaves_artifact_untouched() {
        let (lifecycle, policy, keys) = setup(3, ThresholdRule::at_least(2));
        let id = proposed(&lifecycle, &policy, &keys);
        let before = lifecycle.store().load(&id).unwrap().unwrap();

        let artifact = lifecycle.get(&id).unwrap();
        let forged = sign_artifact(&artifact, &keys[2]);
        assert!(matches!(
            lifecycle.record_signature(&id, &pid(1), forged),
            Err(MultisigError::InvalidSignature(_))
        ));
        assert_eq!(lifecycle.store().load(&id).unwrap().unwrap(), before);
    }

    #[test]
    fn test_unknown_artifact() {
        let (lifecycle, _, _) = setup(1, ThresholdRule::All);
        assert!(matches!(
            lifecycle.record_rejection("deadbeef", &pid(0)),
            Err(MultisigError::ArtifactNotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_signatures_reach_ready_once() {
        let n = 8;
        let (lifecycle, policy, keys) = setup(n, ThresholdRule::at_least(3));
        let id = proposed(&lifecycle, &policy, &keys);
        let artifact = lifecycle.get(&id).unwrap();

        let lifecycle = Arc::new(lifecycle);
        let submitter = Arc::new(CountingSubmitter::new(false));
        let barrier = Arc::new(Barrier::new(n - 1));

        let handles: Vec<_> = (1..n)
            .map(|i| {
                let lifecycle = Arc::clone(&lifecycle);
                let submitter = Arc::clone(&submitter);
                let barrier = Arc::clone(&barrier);
                let witness = sign_artifact(&artifact, &keys[i]);
                let id = id.clone();
                thread::spawn(move || {
                    barrier.wait();
                    match lifecycle.record_signature(&id, &pid(i), witness) {
                        Ok(outcome) if outcome.transition.became_ready() => {
                            lifecycle.submit(&id, submitter.as_ref()).unwrap();
                            1
                        }
                        Ok(_) => 0,
                        // signed after the winner already submitted
                        Err(MultisigError::IllegalStateTransition {
                            from: ArtifactState::Submitted,
                            ..
                        }) => 0,
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                })
            })
            .collect();

        let ready_transitions: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(ready_transitions, 1);
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 1);

        let artifact = lifecycle.get(&id).unwrap();
        assert_eq!(artifact.state, ArtifactState::Submitted);
    }

    #[test]
    fn test_concurrent_submit_calls_submit_once() {
        let (lifecycle, policy, keys) = setup(1, ThresholdRule::Any);
        let id = proposed(&lifecycle, &policy, &keys);

        let lifecycle = Arc::new(lifecycle);
        let submitter = Arc::new(CountingSubmitter::new(false));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lifecycle = Arc::clone(&lifecycle);
                let submitter = Arc::clone(&submitter);
                let id = id.clone();
                thread::spawn(move || lifecycle.submit(&id, submitter.as_ref()).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_change_revalidates_open_artifacts() {
        let (lifecycle, policy, keys) = setup(3, ThresholdRule::at_least(2));
        let open = proposed(&lifecycle, &policy, &keys);
        let done = proposed(&lifecycle, &policy, &keys);
        lifecycle.record_rejection(&done, &pid(1)).unwrap();
        lifecycle.record_rejection(&done, &pid(2)).unwrap();
        assert_eq!(lifecycle.get(&done).unwrap().state, ArtifactState::Rejected);

        // p0 is removed; its proposal signature no longer counts
        let remaining = vec![
            ParticipantKey::new(keys[1].key_hash(), Role::Payment, "p1"),
            ParticipantKey::new(keys[2].key_hash(), Role::Payment, "p2"),
        ];
        let changed = MultisigPolicy::new(
            "vault",
            "",
            remaining,
            ThresholdRule::at_least(2),
            Network::Testnet,
            None,
        )
        .unwrap();

        let outcomes = lifecycle.on_policy_changed("vault", &changed).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].artifact.id, open);
        assert!(outcomes[0].artifact.signed_by.is_empty());

        let artifact = lifecycle.get(&open).unwrap();
        assert_eq!(artifact.eligible.len(), 2);
        assert_eq!(artifact.state, ArtifactState::AwaitingQuorum);
    }

    fn file_lifecycle(
        dir: &std::path::Path,
    ) -> ArtifactLifecycle<FileArtifactStore, Ed25519Verifier> {
        let config = StorageConfig {
            data_dir: dir.to_path_buf(),
            ..Default::default()
        };
        ArtifactLifecycle::new(FileArtifactStore::new(config).unwrap(), Ed25519Verifier)
    }

    #[test]
    fn test_separate_file_stores_keep_every_signature() {
        let n = 9;
        let (_, policy, keys) = setup(n, ThresholdRule::All);
        let temp_dir = tempfile::tempdir().unwrap();

        for _ in 0..5 {
            let owner = file_lifecycle(temp_dir.path());
            let draft = owner
                .create(
                    "vault",
                    &policy,
                    Role::Payment,
                    ArtifactPayload::Transaction {
                        body: vec![0x84, 0xa0],
                    },
                )
                .unwrap();
            owner
                .propose(&draft.id, &pid(0), sign_artifact(&draft, &keys[0]))
                .unwrap();

            // one store per signer, as with one CLI process per signer
            let barrier = Arc::new(Barrier::new(n - 1));
            let handles: Vec<_> = (1..n)
                .map(|i| {
                    let dir = temp_dir.path().to_path_buf();
                    let barrier = Arc::clone(&barrier);
                    let witness = sign_artifact(&draft, &keys[i]);
                    let id = draft.id.clone();
                    thread::spawn(move || {
                        let lifecycle = file_lifecycle(&dir);
                        barrier.wait();
                        let outcome = lifecycle.record_signature(&id, &pid(i), witness).unwrap();
                        usize::from(outcome.transition.became_ready())
                    })
                })
                .collect();

            let ready_transitions: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
            assert_eq!(ready_transitions, 1);

            let stored = owner.get(&draft.id).unwrap();
            assert_eq!(stored.signed_by.len(), n);
            assert_eq!(stored.witnesses.len(), n);
            assert_eq!(stored.state, ArtifactState::Ready);
        }

        // no lock or temporary files left behind
        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path().join("artifacts"))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) != Some("json"))
            .collect();
        assert!(leftovers.is_empty(), "leftover files: {:?}", leftovers);
    }
}
