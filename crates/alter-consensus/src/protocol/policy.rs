//! Per-process behaviour of the epoch machine
//!
//! Honest and Byzantine processes share one phase machine; the policy only
//! swaps the proposer action, the voting rule and what the process is willing
//! to broadcast.

use crate::domain::{ByzantineAttack, ConsensusConfig, ProcessId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Behavior {
    /// Follows the protocol
    Honest,
    /// As proposer, sends different blocks to the two halves of the
    /// processes. Votes for everything and never blames a proposer.
    EquivocatingLeader,
    /// Never proposes and never reacts
    Silent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpochPolicy {
    pub behavior: Behavior,
    /// Decide as soon as every process voted while locked
    pub fast_path: bool,
}

impl EpochPolicy {
    pub fn honest() -> Self {
        Self {
            behavior: Behavior::Honest,
            fast_path: false,
        }
    }

    pub fn equivocating_leader() -> Self {
        Self {
            behavior: Behavior::EquivocatingLeader,
            fast_path: false,
        }
    }

    pub fn silent() -> Self {
        Self {
            behavior: Behavior::Silent,
            fast_path: false,
        }
    }

    pub fn with_fast_path(mut self, enabled: bool) -> Self {
        self.fast_path = enabled;
        self
    }

    /// Policy of `process` under `config`
    pub fn for_process(config: &ConsensusConfig, process: ProcessId) -> Self {
        let policy = if !config.is_byzantine(process) {
            Self::honest()
        } else {
            match config.byzantine_attack {
                ByzantineAttack::Equivocation => Self::equivocating_leader(),
                ByzantineAttack::Silent => Self::silent(),
            }
        };
        policy.with_fast_path(config.fast_path_enabled)
    }

    pub(crate) fn is_honest(&self) -> bool {
        self.behavior == Behavior::Honest
    }

    pub(crate) fn is_inert(&self) -> bool {
        self.behavior == Behavior::Silent
    }

    pub(crate) fn splits_proposals(&self) -> bool {
        self.behavior == Behavior::EquivocatingLeader
    }
}
