//! Quorum evaluation
//!
//! A pure function of the threshold rule and the signature and rejection
//! counts. The artifact state machine calls it after every accepted
//! contribution.

use serde::{Deserialize, Serialize};

use super::builder::ThresholdRule;

/// Outcome of evaluating the collected responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuorumState {
    AwaitingQuorum,
    Ready,
    Rejected,
}

/// Snapshot of an artifact's progress towards quorum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuorumStatus {
    pub state: QuorumState,
    pub required: usize,
    pub signed: usize,
    pub rejected: usize,
    pub total_eligible: usize,
}

impl QuorumStatus {
    /// Signatures still missing
    pub fn remaining(&self) -> usize {
        self.required.saturating_sub(self.signed)
    }
}

pub struct QuorumTracker;

impl QuorumTracker {
    /// Evaluate `rule` over distinct signer and rejecter counts
    ///
    /// * `All` is ready once every eligible signer signed; any rejection is
    ///   terminal.
    /// * `Any` is ready after one signature; rejections are informational.
    /// * `AtLeast(k)` is ready at `k` signatures and rejected once fewer than
    ///   `k` non-rejecting signers remain. Readiness is checked first.
    ///
    /// An empty signer set can never reach quorum and evaluates to
    /// `Rejected` under `All` and `AtLeast`.
    pub fn evaluate(
        rule: ThresholdRule,
        total_eligible: usize,
        signed: usize,
        rejected: usize,
    ) -> QuorumStatus {
        let required = rule.required_signatures(total_eligible);

        let state = match rule {
            ThresholdRule::All => {
                if rejected > 0 || total_eligible == 0 {
                    QuorumState::Rejected
                } else if signed >= total_eligible {
                    QuorumState::Ready
                } else {
                    QuorumState::AwaitingQuorum
                }
            }
            ThresholdRule::Any => {
                if signed >= 1 {
                    QuorumState::Ready
                } else {
                    QuorumState::AwaitingQuorum
                }
            }
            ThresholdRule::AtLeast { required } => {
                let required = required as usize;
                if signed >= required {
                    QuorumState::Ready
                } else if total_eligible.saturating_sub(rejected) < required {
                    QuorumState::Rejected
                } else {
                    QuorumState::AwaitingQuorum
                }
            }
        };

        QuorumStatus {
            state,
            required,
            signed,
            rejected,
            total_eligible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(rule: ThresholdRule, total: usize, signed: usize, rejected: usize) -> QuorumState {
        QuorumTracker::evaluate(rule, total, signed, rejected).state
    }

    #[test]
    fn test_all_rule() {
        assert_eq!(
            state(ThresholdRule::All, 3, 2, 0),
            QuorumState::AwaitingQuorum
        );
        assert_eq!(state(ThresholdRule::All, 3, 3, 0), QuorumState::Ready);
        assert_eq!(state(ThresholdRule::All, 3, 2, 1), QuorumState::Rejected);
        assert_eq!(state(ThresholdRule::All, 3, 0, 1), QuorumState::Rejected);
        assert_eq!(state(ThresholdRule::All, 0, 0, 0), QuorumState::Rejected);
    }

    #[test]
    fn test_any_rule_ignores_rejections() {
        assert_eq!(
            state(ThresholdRule::Any, 3, 0, 0),
            QuorumState::AwaitingQuorum
        );
        assert_eq!(
            state(ThresholdRule::Any, 3, 0, 2),
            QuorumState::AwaitingQuorum
        );
        assert_eq!(state(ThresholdRule::Any, 3, 1, 2), QuorumState::Ready);
    }

    #[test]
    fn test_at_least_rule() {
        let rule = ThresholdRule::at_least(3);
        assert_eq!(state(rule, 5, 2, 0), QuorumState::AwaitingQuorum);
        assert_eq!(state(rule, 5, 2, 2), QuorumState::AwaitingQuorum);
        assert_eq!(state(rule, 5, 0, 3), QuorumState::Rejected);
        assert_eq!(state(rule, 5, 3, 0), QuorumState::Ready);
        // readiness wins once reached
        assert_eq!(state(rule, 5, 3, 2), QuorumState::Ready);
    }

    #[test]
    fn test_status_counts() {
        let status = QuorumTracker::evaluate(ThresholdRule::at_least(2), 3, 1, 0);
        assert_eq!(status.required, 2);
        assert_eq!(status.remaining(), 1);

        let status = QuorumTracker::evaluate(ThresholdRule::All, 4, 1, 0);
        assert_eq!(status.required, 4);
        assert_eq!(status.remaining(), 3);
    }
}
