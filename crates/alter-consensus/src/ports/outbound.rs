//! Driven ports (Outbound dependencies)

use crate::domain::{Block, Certificate, Epoch, Message, ProcessId, Signature, Timeout};
use std::time::Duration;

/// Capabilities an epoch instance uses to act on the world.
///
/// Implemented by the replica context in production and by a recording mock
/// in the protocol tests.
pub trait Process {
    fn id(&self) -> ProcessId;

    fn num_processes(&self) -> usize;

    /// Sign (when authored by this process) and send to every process,
    /// including this one
    fn broadcast(&mut self, message: Message);

    /// Relay an already signed message to every other process
    fn forward(&mut self, message: Message);

    /// Sign (when authored by this process) and send to the listed processes
    fn send(&mut self, message: Message, to: &[ProcessId]);

    /// Request `timeout`; `false` if it was dropped and should be requested again
    fn schedule(&mut self, timeout: Timeout) -> bool;

    /// Proposer of `epoch`: processes take turns
    fn proposer(&self, epoch: Epoch) -> ProcessId {
        (epoch % self.num_processes() as u64) as ProcessId
    }

    /// Next application value to propose; `None` means nothing to propose now
    fn get_value(&mut self) -> Option<Vec<u8>>;

    fn add_block(&mut self, block: &Block) -> bool;

    fn extend_valid_chain(&self, block: &Block) -> bool;

    fn decide(&mut self, epoch: Epoch, block: Block);

    /// The epoch can no longer change the certificates passed to the next one
    fn finish(&mut self, epoch: Epoch, valid: Option<Certificate>, locked: Option<Certificate>);

    fn timeout_propose(&self, epoch: Epoch) -> Duration;

    fn timeout_equivocation(&self, epoch: Epoch) -> Duration;

    fn timeout_quit_epoch(&self, epoch: Epoch) -> Duration;

    fn timeout_epoch_change(&self, epoch: Epoch) -> Duration;
}

/// Byte transport between processes
pub trait Transport: Send + Sync {
    /// Deliver to every process, the sender included
    fn broadcast(&self, from: ProcessId, bytes: &[u8]);

    fn send(&self, from: ProcessId, bytes: &[u8], to: &[ProcessId]);
}

/// Replicated application fed by consensus
pub trait Application: Send + Sync {
    fn get_value(&self) -> Option<Vec<u8>>;

    /// Called once per committed block, in height order
    fn deliver(&self, epoch: Epoch, block: &Block);
}

/// Signs statement payloads on behalf of the local process
pub trait MessageSigner: Send + Sync {
    fn sign(&self, payload: &[u8]) -> Signature;
}

/// Accepts timeout requests; returns `false` if the request was dropped
pub trait TimeoutSink: Send + Sync {
    fn schedule(&self, timeout: Timeout) -> bool;
}
