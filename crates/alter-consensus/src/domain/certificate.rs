//! Quorum certificates
//!
//! A certificate aggregates identical signed statements (block votes or
//! silence statements) from distinct senders. It becomes a quorum once it holds
//! signatures from more than half of the processes.

use super::message::{block_statement, silence_statement, Silence, Vote};
use super::wire::WireReader;
use super::{
    BlockId, ConsensusError, ConsensusResult, Epoch, Height, Message, ProcessId, Signature,
    BLOCK_ID_SIZE, MESSAGE_CODE, MESSAGE_SIGNATURE_SIZE,
};
use std::collections::BTreeMap;

/// Wire code of an invalid certificate kind
pub const INVALID_CERT: u8 = 0;

/// Kind of statement a certificate aggregates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CertificateKind {
    /// Processes blamed the proposer for not proposing in time
    Silence,
    /// Processes voted for the same block
    Block,
}

impl CertificateKind {
    pub fn code(self) -> u8 {
        match self {
            CertificateKind::Silence => 1,
            CertificateKind::Block => 2,
        }
    }

    pub fn from_code(code: u8) -> ConsensusResult<Self> {
        match code {
            1 => Ok(CertificateKind::Silence),
            2 => Ok(CertificateKind::Block),
            other => Err(ConsensusError::InvalidCertificateKind(other)),
        }
    }
}

/// Aggregated signatures over one statement.
///
/// `block_id` is set only for [`CertificateKind::Block`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Certificate {
    kind: CertificateKind,
    epoch: Epoch,
    height: Height,
    block_id: Option<BlockId>,
    signatures: BTreeMap<ProcessId, Signature>,
}

impl Certificate {
    /// Empty block certificate for votes on `(block_id, height)` in `epoch`
    pub fn block(epoch: Epoch, block_id: BlockId, height: Height) -> Self {
        Self {
            kind: CertificateKind::Block,
            epoch,
            height,
            block_id: Some(block_id),
            signatures: BTreeMap::new(),
        }
    }

    /// Empty silence certificate for `epoch`
    pub fn silence(epoch: Epoch) -> Self {
        Self {
            kind: CertificateKind::Silence,
            epoch,
            height: 0,
            block_id: None,
            signatures: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> CertificateKind {
        self.kind
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn height(&self) -> Height {
        self.height
    }

    pub fn block_id(&self) -> Option<BlockId> {
        self.block_id
    }

    /// Add `sender`'s signature.
    ///
    /// Returns `false` without changing anything if `sender` already signed.
    pub fn add_signature(&mut self, sender: ProcessId, signature: Signature) -> bool {
        if self.signatures.contains_key(&sender) {
            return false;
        }
        self.signatures.insert(sender, signature);
        true
    }

    pub fn signature(&self, sender: ProcessId) -> Option<&Signature> {
        self.signatures.get(&sender)
    }

    pub fn signatures(&self) -> impl Iterator<Item = (ProcessId, &Signature)> {
        self.signatures.iter().map(|(sender, sig)| (*sender, sig))
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// Strict majority of `num_processes`
    pub fn has_quorum(&self, num_processes: usize) -> bool {
        self.signature_count() > num_processes / 2
    }

    /// Locking rule comparison against a possibly absent certificate
    pub fn ranks_higher_or_equal(&self, other: Option<&Certificate>) -> bool {
        ranks_higher_or_equal(Some(self), other)
    }

    /// Statement bytes every signature in this certificate signs
    pub fn payload(&self) -> Vec<u8> {
        match (self.kind, self.block_id) {
            (CertificateKind::Block, Some(block_id)) => {
                block_statement(self.epoch, self.height, &block_id)
            }
            _ => silence_statement(self.epoch),
        }
    }

    /// Rebuild the statement `sender` signed, if present
    pub fn reconstruct_message(&self, sender: ProcessId) -> Option<Message> {
        self.signatures
            .get(&sender)
            .map(|signature| self.statement(sender, *signature))
    }

    /// Rebuild every aggregated statement, ordered by sender
    pub fn reconstruct_messages(&self) -> Vec<Message> {
        self.signatures
            .iter()
            .map(|(sender, signature)| self.statement(*sender, *signature))
            .collect()
    }

    fn statement(&self, sender: ProcessId, signature: Signature) -> Message {
        match (self.kind, self.block_id) {
            (CertificateKind::Block, Some(block_id)) => Message::Vote(Vote {
                epoch: self.epoch,
                height: self.height,
                block_id,
                sender,
                signature,
                sender2: sender,
                signature2: None,
            }),
            _ => Message::Silence(Silence {
                epoch: self.epoch,
                sender,
                signature,
            }),
        }
    }

    fn header_size(&self) -> usize {
        match self.kind {
            CertificateKind::Block => 10 + 8 + BLOCK_ID_SIZE,
            CertificateKind::Silence => 10,
        }
    }

    /// Encoded size: fixed header plus one `(sender, signature)` pair per signer
    pub fn byte_size(&self) -> usize {
        self.header_size() + self.signatures.len() * MESSAGE_SIGNATURE_SIZE
    }

    pub fn encode_to(&self, buffer: &mut Vec<u8>) {
        buffer.push(MESSAGE_CODE);
        buffer.push(self.kind.code());
        buffer.extend_from_slice(&self.epoch.to_le_bytes());
        if let (CertificateKind::Block, Some(block_id)) = (self.kind, &self.block_id) {
            buffer.extend_from_slice(&self.height.to_le_bytes());
            buffer.extend_from_slice(block_id.as_bytes());
        }
        for (sender, signature) in &self.signatures {
            buffer.extend_from_slice(&sender.to_le_bytes());
            buffer.extend_from_slice(signature.as_bytes());
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.byte_size());
        self.encode_to(&mut buffer);
        buffer
    }

    /// Decode a certificate occupying the whole buffer.
    ///
    /// Zero signatures is accepted.
    pub fn decode(buffer: &[u8]) -> ConsensusResult<Self> {
        let mut reader = WireReader::new(buffer);
        let code = reader.u8()?;
        if code != MESSAGE_CODE {
            return Err(ConsensusError::InvalidMessageCode(code));
        }
        let kind = CertificateKind::from_code(reader.u8()?)?;
        let epoch = reader.u64()?;
        let mut certificate = match kind {
            CertificateKind::Block => {
                let height = reader.u64()?;
                let block_id = reader.block_id()?;
                Certificate::block(epoch, block_id, height)
            }
            CertificateKind::Silence => Certificate::silence(epoch),
        };

        if reader.remaining() % MESSAGE_SIGNATURE_SIZE != 0 {
            return Err(ConsensusError::LengthMismatch {
                declared: reader.offset()
                    + reader.remaining() / MESSAGE_SIGNATURE_SIZE * MESSAGE_SIGNATURE_SIZE,
                actual: buffer.len(),
            });
        }
        while reader.remaining() > 0 {
            let sender = reader.u16()?;
            let signature = reader.signature()?;
            certificate.add_signature(sender, signature);
        }
        Ok(certificate)
    }
}

/// Locking rule: `candidate` ranks at least as high as `other`.
///
/// True when `other` is absent, false when only `candidate` is absent,
/// otherwise compares epochs.
pub fn ranks_higher_or_equal(candidate: Option<&Certificate>, other: Option<&Certificate>) -> bool {
    match (candidate, other) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(candidate), Some(other)) => candidate.epoch >= other.epoch,
    }
}
