//! Multisig policy facade
//!
//! A [`MultisigPolicy`] is an immutable value built once from a wallet's
//! stored configuration. When the configuration changes a new policy is
//! built; nothing here is ever mutated in place, so per-role scripts can be
//! memoized for the lifetime of the value.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::builder::{ScriptBuilder, ThresholdRule};
use super::config::WalletConfig;
use super::deriver::DerivedAddressSet;
use super::error::MultisigError;
use super::keys::{normalize_key, KeyRegistry, ParticipantId, ParticipantKey, Role};
use super::metadata::MetadataDocument;
use crate::core::{Credential, KeyHash, NativeScript, Network};

/// Which optional roles a policy can exercise
///
/// A role is enabled only when every payment-key holder also holds a key
/// for it. Roles with some keys but incomplete coverage are listed in
/// `partial_roles` and get no script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub staking_enabled: bool,
    pub governance_enabled: bool,
    pub committee_cold_enabled: bool,
    pub committee_hot_enabled: bool,
    pub partial_roles: Vec<Role>,
}

fn slot(role: Role) -> usize {
    match role {
        Role::Payment => 0,
        Role::Stake => 1,
        Role::DRep => 2,
        Role::CommitteeCold => 3,
        Role::CommitteeHot => 4,
    }
}

/// A wallet's multisig policy
#[derive(Debug, Clone)]
pub struct MultisigPolicy {
    name: String,
    description: String,
    registry: KeyRegistry,
    threshold: ThresholdRule,
    network: Network,
    stake_credential_override: Option<Credential>,
    scripts: [OnceLock<Option<NativeScript>>; 5],
}

impl MultisigPolicy {
    /// Create a policy from already-normalized keys
    ///
    /// # Errors
    /// `NoParticipants` if there are no keys or no payment keys,
    /// `DuplicateKeyForRole` / `DuplicateRoleForParticipant` for repeated
    /// keys, `InvalidThreshold` if the rule cannot be met by the payment keys.
    pub fn new(
        name: &str,
        description: &str,
        participants: Vec<ParticipantKey>,
        threshold: ThresholdRule,
        network: Network,
        stake_credential_override: Option<Credential>,
    ) -> Result<Self, MultisigError> {
        if participants.is_empty() {
            return Err(MultisigError::NoParticipants);
        }

        let registry = KeyRegistry::new(participants)?;
        let payment_keys = registry.count(Role::Payment);
        if payment_keys == 0 {
            return Err(MultisigError::NoParticipants);
        }
        threshold.validate(payment_keys)?;

        log::debug!(
            "Policy {:?} built: {} on {}",
            name,
            threshold.describe(payment_keys),
            network
        );

        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            registry,
            threshold,
            network,
            stake_credential_override,
            scripts: std::array::from_fn(|_| OnceLock::new()),
        })
    }

    /// Create a policy from a stored wallet configuration
    pub fn from_config(config: &WalletConfig) -> Result<Self, MultisigError> {
        let participants = config
            .participants
            .iter()
            .map(|entry| {
                normalize_key(&entry.key, entry.role)
                    .map(|hash| ParticipantKey::new(hash, entry.role, &entry.name))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(
            &config.name,
            &config.description,
            participants,
            config.threshold,
            config.network,
            config.resolve_stake_credential()?,
        )
    }

    /// Rebuild a policy from a published registration document and check
    /// that the rebuilt scripts match the published ones
    pub fn from_metadata(document: &MetadataDocument) -> Result<Self, MultisigError> {
        let policy = Self::from_config(&WalletConfig::from_metadata(document)?)?;

        for role in Role::ALL {
            let rebuilt = policy.script_for(role);
            let published = document.scripts.get(&role);
            if rebuilt != published {
                return Err(MultisigError::MetadataMismatch(format!(
                    "{} script differs from the one rebuilt from its participants",
                    role
                )));
            }
        }
        Ok(policy)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn participants(&self) -> &[ParticipantKey] {
        self.registry.all()
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    pub fn threshold(&self) -> ThresholdRule {
        self.threshold
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn stake_credential_override(&self) -> Option<Credential> {
        self.stake_credential_override
    }

    /// Whether a script is built for `role`
    pub fn role_enabled(&self, role: Role) -> bool {
        match role {
            Role::Payment => true,
            other => self.registry.covers(other),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        let partial_roles = Role::ALL
            .into_iter()
            .filter(|role| {
                *role != Role::Payment
                    && self.registry.count(*role) > 0
                    && !self.role_enabled(*role)
            })
            .collect();

        Capabilities {
            staking_enabled: self.role_enabled(Role::Stake),
            governance_enabled: self.role_enabled(Role::DRep),
            committee_cold_enabled: self.role_enabled(Role::CommitteeCold),
            committee_hot_enabled: self.role_enabled(Role::CommitteeHot),
            partial_roles,
        }
    }

    /// The native script for `role`, built on first use
    pub fn script_for(&self, role: Role) -> Option<&NativeScript> {
        self.scripts[slot(role)]
            .get_or_init(|| self.build_script(role))
            .as_ref()
    }

    fn build_script(&self, role: Role) -> Option<NativeScript> {
        if !self.role_enabled(role) {
            return None;
        }
        // Enabled roles have at least as many keys as the payment role the
        // threshold was validated against.
        match ScriptBuilder::build(role, self.registry.all(), self.threshold) {
            Ok(script) => script,
            Err(e) => {
                log::warn!("Policy {:?}: no {} script: {}", self.name, role, e);
                None
            }
        }
    }

    /// Delegation credential for the payment address
    ///
    /// The wallet's own stake script wins; otherwise the configured
    /// external credential, if any.
    pub fn stake_credential(&self) -> Option<Credential> {
        match self.script_for(Role::Stake) {
            Some(script) => Some(Credential::ScriptHash(script.hash())),
            None => self.stake_credential_override,
        }
    }

    /// Participants allowed to sign for `role`, in script order
    pub fn eligible_signers(&self, role: Role) -> Option<Vec<(ParticipantId, KeyHash)>> {
        self.script_for(role)?;
        Some(
            self.registry
                .keys_for(role)
                .map(|k| (k.participant(), k.key_hash))
                .collect(),
        )
    }

    /// Derive addresses and identifiers on the policy's own network
    pub fn derive_addresses(&self) -> Result<DerivedAddressSet, MultisigError> {
        DerivedAddressSet::derive(self, self.network)
    }

    /// Derive addresses and identifiers on an explicit network
    pub fn derive_addresses_for(
        &self,
        network: Network,
    ) -> Result<DerivedAddressSet, MultisigError> {
        DerivedAddressSet::derive(self, network)
    }

    /// Registration metadata describing this policy
    pub fn metadata_document(&self) -> MetadataDocument {
        MetadataDocument::from_policy(self)
    }

    /// Description like "2-of-3"
    pub fn summary(&self) -> String {
        self.threshold.describe(self.registry.count(Role::Payment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multisig::config::ParticipantEntry;

    fn kh(byte: u8) -> KeyHash {
        KeyHash::new([byte; 28])
    }

    fn payment_keys(names: &[(&str, u8)]) -> Vec<ParticipantKey> {
        names
            .iter()
            .map(|(name, b)| ParticipantKey::new(kh(*b), Role::Payment, name))
            .collect()
    }

    fn policy(keys: Vec<ParticipantKey>, threshold: ThresholdRule) -> MultisigPolicy {
        MultisigPolicy::new("treasury", "", keys, threshold, Network::Testnet, None).unwrap()
    }

    #[test]
    fn test_concrete_two_of_three_policy() {
        let p = policy(
            payment_keys(&[("A", 0xa), ("B", 0xb), ("C", 0xc)]),
            ThresholdRule::at_least(2),
        );
        assert_eq!(
            p.script_for(Role::Payment),
            Some(&NativeScript::AtLeastOf {
                required: 2,
                scripts: vec![
                    NativeScript::sig(kh(0xa)),
                    NativeScript::sig(kh(0xb)),
                    NativeScript::sig(kh(0xc)),
                ],
            })
        );
        assert_eq!(p.summary(), "2-of-3");
    }

    #[test]
    fn test_construction_errors() {
        let err = MultisigPolicy::new("w", "", vec![], ThresholdRule::All, Network::Testnet, None);
        assert_eq!(err.unwrap_err(), MultisigError::NoParticipants);

        let only_stake = vec![ParticipantKey::new(kh(1), Role::Stake, "A")];
        let err = MultisigPolicy::new(
            "w",
            "",
            only_stake,
            ThresholdRule::All,
            Network::Testnet,
            None,
        );
        assert_eq!(err.unwrap_err(), MultisigError::NoParticipants);

        let err = MultisigPolicy::new(
            "w",
            "",
            payment_keys(&[("A", 1), ("B", 2)]),
            ThresholdRule::at_least(3),
            Network::Testnet,
            None,
        );
        assert!(matches!(err, Err(MultisigError::InvalidThreshold(_))));

        let err = MultisigPolicy::new(
            "w",
            "",
            payment_keys(&[("A", 1), ("B", 1)]),
            ThresholdRule::Any,
            Network::Testnet,
            None,
        );
        assert!(matches!(
            err,
            Err(MultisigError::DuplicateKeyForRole { .. })
        ));
    }

    #[test]
    fn test_partial_stake_coverage_is_not_enabled() {
        let mut keys = payment_keys(&[("A", 1), ("B", 2)]);
        keys.push(ParticipantKey::new(kh(11), Role::Stake, "A"));
        let p = policy(keys, ThresholdRule::All);

        let caps = p.capabilities();
        assert!(!caps.staking_enabled);
        assert_eq!(caps.partial_roles, vec![Role::Stake]);
        assert_eq!(p.script_for(Role::Stake), None);
        assert_eq!(p.stake_credential(), None);
    }

    #[test]
    fn test_full_coverage_enables_roles() {
        let mut keys = payment_keys(&[("A", 1), ("B", 2)]);
        keys.push(ParticipantKey::new(kh(11), Role::Stake, "A"));
        keys.push(ParticipantKey::new(kh(12), Role::Stake, "B"));
        keys.push(ParticipantKey::new(kh(21), Role::DRep, "B"));
        keys.push(ParticipantKey::new(kh(22), Role::DRep, "A"));
        let p = policy(keys, ThresholdRule::at_least(2));

        let caps = p.capabilities();
        assert!(caps.staking_enabled);
        assert!(caps.governance_enabled);
        assert!(caps.partial_roles.is_empty());

        let drep = p.script_for(Role::DRep).unwrap();
        assert_eq!(drep.key_hashes(), vec![kh(21), kh(22)]);
        let stake_script = p.script_for(Role::Stake).unwrap();
        assert_eq!(
            p.stake_credential(),
            Some(Credential::ScriptHash(stake_script.hash()))
        );
    }

    #[test]
    fn test_own_stake_script_wins_over_override() {
        let external = Credential::KeyHash(kh(99));
        let no_stake = MultisigPolicy::new(
            "w",
            "",
            payment_keys(&[("A", 1)]),
            ThresholdRule::All,
            Network::Mainnet,
            Some(external),
        )
        .unwrap();
        assert_eq!(no_stake.stake_credential(), Some(external));

        let mut keys = payment_keys(&[("A", 1)]);
        keys.push(ParticipantKey::new(kh(2), Role::Stake, "A"));
        let with_stake = MultisigPolicy::new(
            "w",
            "",
            keys,
            ThresholdRule::All,
            Network::Mainnet,
            Some(external),
        )
        .unwrap();
        assert!(matches!(
            with_stake.stake_credential(),
            Some(Credential::ScriptHash(_))
        ));
    }

    #[test]
    fn test_signer_order_changes_address() {
        let rule = ThresholdRule::at_least(2);
        let forward = policy(payment_keys(&[("A", 1), ("B", 2), ("C", 3)]), rule);
        let reversed = policy(payment_keys(&[("C", 3), ("B", 2), ("A", 1)]), rule);

        let a = forward.derive_addresses().unwrap();
        let b = reversed.derive_addresses().unwrap();
        assert_ne!(a.script_hash, b.script_hash);
        assert_ne!(a.payment_address, b.payment_address);
    }

    #[test]
    fn test_derivation_is_repeatable() {
        let p = policy(payment_keys(&[("A", 1), ("B", 2)]), ThresholdRule::All);
        let first = p.derive_addresses().unwrap();
        let second = p.derive_addresses().unwrap();
        assert_eq!(first, second);

        let mainnet = p.derive_addresses_for(Network::Mainnet).unwrap();
        assert_eq!(mainnet.script_hash, first.script_hash);
        assert_ne!(mainnet.payment_address, first.payment_address);
    }

    #[test]
    fn test_from_config_normalizes_keys() {
        let config = WalletConfig {
            name: "ops".to_string(),
            description: "operations".to_string(),
            participants: vec![
                ParticipantEntry::new(&"01".repeat(28), Role::Payment, "A"),
                ParticipantEntry::new(&"02".repeat(28), Role::Payment, "B"),
            ],
            threshold: ThresholdRule::Any,
            network: Network::Testnet,
            stake_credential: Some("ff".repeat(28)),
        };
        let p = MultisigPolicy::from_config(&config).unwrap();
        assert_eq!(p.participants().len(), 2);
        assert_eq!(p.stake_credential(), Some(Credential::KeyHash(kh(0xff))));

        let mut bad = config.clone();
        bad.participants[1].key = "not-a-key".to_string();
        assert!(matches!(
            MultisigPolicy::from_config(&bad),
            Err(MultisigError::KeyFormat(_))
        ));
    }

    #[test]
    fn test_eligible_signers_follow_script_order() {
        let p = policy(payment_keys(&[("B", 2), ("A", 1)]), ThresholdRule::All);
        assert_eq!(
            p.eligible_signers(Role::Payment).unwrap(),
            vec![
                (ParticipantId::new("B"), kh(2)),
                (ParticipantId::new("A"), kh(1)),
            ]
        );
        assert_eq!(p.eligible_signers(Role::DRep), None);
    }
}
