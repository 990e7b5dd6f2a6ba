//! Epoch protocols
//!
//! [`AlterBft`] runs one consensus epoch under an [`EpochPolicy`];
//! [`DeltaProbe`] replaces it when the replica only measures latency.
//! [`EpochFactory`] picks the right one for a process.

mod alter;
mod delta;
mod policy;


pub use alter::{AlterBft, Phase};
pub use delta::DeltaProbe;
pub use policy::{Behavior, EpochPolicy};

use crate::domain::{ConsensusConfig, Epoch, ProcessId, ProtocolModel};
use crate::ports::EpochProtocol;

/// Builds epoch instances for one process
#[derive(Clone, Debug)]
pub struct EpochFactory {
    model: ProtocolModel,
    policy: EpochPolicy,
    pending_limit: usize,
}

impl EpochFactory {
    pub fn new(config: &ConsensusConfig, process: ProcessId) -> Self {
        Self {
            model: config.model,
            policy: EpochPolicy::for_process(config, process),
            pending_limit: config.pending_messages_limit,
        }
    }

    pub fn policy(&self) -> EpochPolicy {
        self.policy
    }

    pub fn create(&self, epoch: Epoch) -> Box<dyn EpochProtocol> {
        match self.model {
            ProtocolModel::Sync => Box::new(AlterBft::new(epoch, self.policy, self.pending_limit)),
            ProtocolModel::Delta => Box::new(DeltaProbe::new(epoch)),
        }
    }
}
