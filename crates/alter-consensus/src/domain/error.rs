//! Error types for the consensus crate

use super::ProcessId;

/// Consensus error types
///
/// Protocol-local rejections (stale votes, invalid proposals, out-of-window
/// blocks) are not errors: the epoch machine drops them. These variants cover
/// decoding, configuration, signature checking and driver plumbing.
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    #[error("Buffer truncated: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Not a consensus message: code {0}")]
    InvalidMessageCode(u8),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("Invalid certificate kind: {0}")]
    InvalidCertificateKind(u8),

    #[error("Length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown signer: process {0}")]
    UnknownSigner(ProcessId),

    #[error("Invalid signature from process {0}")]
    InvalidSignature(ProcessId),

    #[error("Invalid public key for process {0}")]
    InvalidPublicKey(ProcessId),

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),
}

/// Result type for consensus operations
pub type ConsensusResult<T> = Result<T, ConsensusError>;
