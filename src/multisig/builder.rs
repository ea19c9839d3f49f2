//! Native script construction
//!
//! Building is a pure function of the role, the ordered participant keys
//! and the threshold rule, so every participant's client arrives at the
//! same script without talking to anyone.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::MultisigError;
use super::keys::{ParticipantKey, Role};
use crate::core::NativeScript;

/// How many of a role's keys must sign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ThresholdRule {
    /// Every key must sign
    All,
    /// One key suffices
    Any,
    /// At least `required` keys must sign
    AtLeast { required: u32 },
}

impl ThresholdRule {
    pub fn at_least(required: u32) -> Self {
        ThresholdRule::AtLeast { required }
    }

    /// Check the rule can be satisfied by `eligible` keys
    ///
    /// `AtLeast` is never clamped: a rule asking for more signatures than
    /// there are keys is a configuration error.
    pub fn validate(&self, eligible: usize) -> Result<(), MultisigError> {
        match *self {
            ThresholdRule::AtLeast { required: 0 } => Err(MultisigError::InvalidThreshold(
                "threshold must be at least 1".to_string(),
            )),
            ThresholdRule::AtLeast { required } if required as usize > eligible => {
                Err(MultisigError::InvalidThreshold(format!(
                    "threshold {} exceeds signer count {}",
                    required, eligible
                )))
            }
            _ => Ok(()),
        }
    }

    /// Signatures needed out of `eligible`
    pub fn required_signatures(&self, eligible: usize) -> usize {
        match *self {
            ThresholdRule::All => eligible,
            ThresholdRule::Any => 1,
            ThresholdRule::AtLeast { required } => required as usize,
        }
    }

    /// Description like "2-of-3"
    pub fn describe(&self, eligible: usize) -> String {
        format!("{}-of-{}", self.required_signatures(eligible), eligible)
    }
}

impl fmt::Display for ThresholdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdRule::All => f.write_str("all"),
            ThresholdRule::Any => f.write_str("any"),
            ThresholdRule::AtLeast { required } => write!(f, "atLeast({})", required),
        }
    }
}

/// Assembles per-role native scripts
pub struct ScriptBuilder;

impl ScriptBuilder {
    /// Build the script for `role`
    ///
    /// Returns `Ok(None)` when no participant holds a key for the role; an
    /// empty `all` would be trivially satisfiable and is never produced.
    pub fn build(
        role: Role,
        participants: &[ParticipantKey],
        rule: ThresholdRule,
    ) -> Result<Option<NativeScript>, MultisigError> {
        let scripts: Vec<NativeScript> = participants
            .iter()
            .filter(|k| k.role == role)
            .map(|k| NativeScript::sig(k.key_hash))
            .collect();

        if scripts.is_empty() {
            return Ok(None);
        }
        rule.validate(scripts.len())?;

        Ok(Some(match rule {
            ThresholdRule::All => NativeScript::AllOf { scripts },
            ThresholdRule::Any => NativeScript::AnyOf { scripts },
            ThresholdRule::AtLeast { required } => NativeScript::AtLeastOf { required, scripts },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::KeyHash;

    fn kh(byte: u8) -> KeyHash {
        KeyHash::new([byte; 28])
    }

    fn keys() -> Vec<ParticipantKey> {
        vec![
            ParticipantKey::new(kh(1), Role::Payment, "a"),
            ParticipantKey::new(kh(9), Role::Stake, "a"),
            ParticipantKey::new(kh(2), Role::Payment, "b"),
            ParticipantKey::new(kh(3), Role::Payment, "c"),
        ]
    }

    #[test]
    fn test_build_at_least_keeps_insertion_order() {
        let script = ScriptBuilder::build(Role::Payment, &keys(), ThresholdRule::at_least(2))
            .unwrap()
            .unwrap();
        assert_eq!(
            script,
            NativeScript::AtLeastOf {
                required: 2,
                scripts: vec![
                    NativeScript::sig(kh(1)),
                    NativeScript::sig(kh(2)),
                    NativeScript::sig(kh(3)),
                ],
            }
        );
    }

    #[test]
    fn test_build_all_and_any() {
        let all = ScriptBuilder::build(Role::Stake, &keys(), ThresholdRule::All)
            .unwrap()
            .unwrap();
        assert_eq!(
            all,
            NativeScript::AllOf {
                scripts: vec![NativeScript::sig(kh(9))]
            }
        );

        let any = ScriptBuilder::build(Role::Payment, &keys(), ThresholdRule::Any)
            .unwrap()
            .unwrap();
        assert!(matches!(any, NativeScript::AnyOf { .. }));
        assert_eq!(any.key_hashes().len(), 3);
    }

    #[test]
    fn test_absent_role_builds_nothing() {
        assert_eq!(
            ScriptBuilder::build(Role::DRep, &keys(), ThresholdRule::All).unwrap(),
            None
        );
    }

    #[test]
    fn test_threshold_is_validated_not_clamped() {
        assert!(matches!(
            ScriptBuilder::build(Role::Payment, &keys(), ThresholdRule::at_least(0)),
            Err(MultisigError::InvalidThreshold(_))
        ));
        assert!(matches!(
            ScriptBuilder::build(Role::Payment, &keys(), ThresholdRule::at_least(4)),
            Err(MultisigError::InvalidThreshold(_))
        ));
        assert!(ScriptBuilder::build(Role::Payment, &keys(), ThresholdRule::at_least(3)).is_ok());
    }

    #[test]
    fn test_threshold_serde() {
        let json = r#"{"type":"atLeast","required":2}"#;
        let rule: ThresholdRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule, ThresholdRule::at_least(2));
        let rule: ThresholdRule = serde_json::from_str(r#"{"type":"all"}"#).unwrap();
        assert_eq!(rule, ThresholdRule::All);
        assert_eq!(ThresholdRule::at_least(2).describe(3), "2-of-3");
    }
}
