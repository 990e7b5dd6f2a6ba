//! Consensus wire messages
//!
//! Every message starts with `[MESSAGE_CODE][type]` followed by its
//! little-endian fields. Signatures cover a short statement prefix (epoch,
//! height, block id), never the full wire bytes, so a proposal signature
//! doubles as the proposer's vote.

use super::wire::WireReader;
use super::{
    Block, BlockId, Certificate, ConsensusError, ConsensusResult, Epoch, Height, ProcessId,
    Signature, BLOCK_ID_SIZE, MESSAGE_CODE, SIGNATURE_SIZE,
};

/// Size of the `[MESSAGE_CODE][type]` header
pub const HEADER_SIZE: usize = 2;

/// Statement signed by block votes and proposals
pub(crate) fn block_statement(epoch: Epoch, height: Height, block_id: &BlockId) -> Vec<u8> {
    let mut payload = Vec::with_capacity(16 + BLOCK_ID_SIZE);
    payload.extend_from_slice(&epoch.to_le_bytes());
    payload.extend_from_slice(&height.to_le_bytes());
    payload.extend_from_slice(block_id.as_bytes());
    payload
}

/// Statement signed by silence messages
pub(crate) fn silence_statement(epoch: Epoch) -> Vec<u8> {
    epoch.to_le_bytes().to_vec()
}

/// Wire type codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Propose = 0,
    Silence = 1,
    Vote = 2,
    QuitEpoch = 3,
    Certificate = 4,
    DeltaRequest = 5,
    DeltaResponse = 6,
}

impl MessageType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> ConsensusResult<Self> {
        Ok(match code {
            0 => MessageType::Propose,
            1 => MessageType::Silence,
            2 => MessageType::Vote,
            3 => MessageType::QuitEpoch,
            4 => MessageType::Certificate,
            5 => MessageType::DeltaRequest,
            6 => MessageType::DeltaResponse,
            other => return Err(ConsensusError::UnknownMessageType(other)),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageType::Propose => "propose",
            MessageType::Silence => "silence",
            MessageType::Vote => "vote",
            MessageType::QuitEpoch => "quit_epoch",
            MessageType::Certificate => "certificate",
            MessageType::DeltaRequest => "delta_request",
            MessageType::DeltaResponse => "delta_response",
        }
    }
}

/// Block proposal from the epoch's proposer.
///
/// `certificate` justifies the predecessor; `sender_fwd` is the last process
/// that relayed the proposal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proposal {
    pub epoch: Epoch,
    pub block: Block,
    pub certificate: Option<Certificate>,
    pub sender: ProcessId,
    pub sender_fwd: ProcessId,
    pub signature: Signature,
}

impl Proposal {
    pub fn signing_payload(&self) -> Vec<u8> {
        block_statement(self.epoch, self.block.height(), &self.block.id())
    }
}

/// Blame against a proposer that did not propose in time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Silence {
    pub epoch: Epoch,
    pub sender: ProcessId,
    pub signature: Signature,
}

impl Silence {
    pub fn signing_payload(&self) -> Vec<u8> {
        silence_statement(self.epoch)
    }
}

/// Vote for a block.
///
/// `sender2`/`signature2` optionally carry a second signature over the same
/// statement, normally the proposer's proposal signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    pub epoch: Epoch,
    pub height: Height,
    pub block_id: BlockId,
    pub sender: ProcessId,
    pub signature: Signature,
    pub sender2: ProcessId,
    pub signature2: Option<Signature>,
}

impl Vote {
    pub fn signing_payload(&self) -> Vec<u8> {
        block_statement(self.epoch, self.height, &self.block_id)
    }
}

/// Quorum certificate broadcast to make other processes leave the epoch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuitEpoch {
    pub certificate: Certificate,
}

/// Standalone certificate tagged with the epoch it is relevant for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateMessage {
    pub epoch: Epoch,
    pub certificate: Certificate,
}

/// Latency probe payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delta {
    pub payload: Vec<u8>,
    pub sender: ProcessId,
}

/// All consensus messages
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Propose(Proposal),
    Silence(Silence),
    Vote(Vote),
    QuitEpoch(QuitEpoch),
    Certificate(CertificateMessage),
    DeltaRequest(Delta),
    DeltaResponse(Delta),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Propose(_) => MessageType::Propose,
            Message::Silence(_) => MessageType::Silence,
            Message::Vote(_) => MessageType::Vote,
            Message::QuitEpoch(_) => MessageType::QuitEpoch,
            Message::Certificate(_) => MessageType::Certificate,
            Message::DeltaRequest(_) => MessageType::DeltaRequest,
            Message::DeltaResponse(_) => MessageType::DeltaResponse,
        }
    }

    /// Epoch the message belongs to. Delta probes have none.
    pub fn epoch(&self) -> Option<Epoch> {
        match self {
            Message::Propose(m) => Some(m.epoch),
            Message::Silence(m) => Some(m.epoch),
            Message::Vote(m) => Some(m.epoch),
            Message::QuitEpoch(m) => Some(m.certificate.epoch()),
            Message::Certificate(m) => Some(m.epoch),
            Message::DeltaRequest(_) | Message::DeltaResponse(_) => None,
        }
    }

    /// Signing author, if the message carries one
    pub fn sender(&self) -> Option<ProcessId> {
        match self {
            Message::Propose(m) => Some(m.sender),
            Message::Silence(m) => Some(m.sender),
            Message::Vote(m) => Some(m.sender),
            Message::DeltaRequest(m) | Message::DeltaResponse(m) => Some(m.sender),
            Message::QuitEpoch(_) | Message::Certificate(_) => None,
        }
    }

    /// Bytes covered by the author's signature, for signed kinds
    pub fn signing_payload(&self) -> Option<Vec<u8>> {
        match self {
            Message::Propose(m) => Some(m.signing_payload()),
            Message::Silence(m) => Some(m.signing_payload()),
            Message::Vote(m) => Some(m.signing_payload()),
            _ => None,
        }
    }

    pub fn signature(&self) -> Option<Signature> {
        match self {
            Message::Propose(m) => Some(m.signature),
            Message::Silence(m) => Some(m.signature),
            Message::Vote(m) => Some(m.signature),
            _ => None,
        }
    }

    /// Attach the author's signature. No-op for unsigned kinds.
    pub fn set_signature(&mut self, signature: Signature) {
        match self {
            Message::Propose(m) => m.signature = signature,
            Message::Silence(m) => m.signature = signature,
            Message::Vote(m) => m.signature = signature,
            _ => {}
        }
    }

    pub fn byte_size(&self) -> usize {
        HEADER_SIZE
            + match self {
                Message::Propose(m) => {
                    8 + 4
                        + m.block.byte_size()
                        + 1
                        + m.certificate.as_ref().map_or(0, Certificate::byte_size)
                        + 2
                        + 2
                        + SIGNATURE_SIZE
                }
                Message::Silence(_) => 8 + 2 + SIGNATURE_SIZE,
                Message::Vote(_) => 8 + 8 + BLOCK_ID_SIZE + 2 * (2 + SIGNATURE_SIZE),
                Message::QuitEpoch(m) => m.certificate.byte_size(),
                Message::Certificate(m) => 8 + m.certificate.byte_size(),
                Message::DeltaRequest(m) | Message::DeltaResponse(m) => m.payload.len() + 2,
            }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.byte_size());
        buffer.push(MESSAGE_CODE);
        buffer.push(self.message_type().code());
        match self {
            Message::Propose(m) => {
                buffer.extend_from_slice(&m.epoch.to_le_bytes());
                buffer.extend_from_slice(&(m.block.byte_size() as u32).to_le_bytes());
                m.block.encode_to(&mut buffer);
                match &m.certificate {
                    Some(certificate) => {
                        buffer.push(1);
                        certificate.encode_to(&mut buffer);
                    }
                    None => buffer.push(0),
                }
                buffer.extend_from_slice(&m.sender.to_le_bytes());
                buffer.extend_from_slice(&m.sender_fwd.to_le_bytes());
                buffer.extend_from_slice(m.signature.as_bytes());
            }
            Message::Silence(m) => {
                buffer.extend_from_slice(&m.epoch.to_le_bytes());
                buffer.extend_from_slice(&m.sender.to_le_bytes());
                buffer.extend_from_slice(m.signature.as_bytes());
            }
            Message::Vote(m) => {
                buffer.extend_from_slice(&m.epoch.to_le_bytes());
                buffer.extend_from_slice(&m.height.to_le_bytes());
                buffer.extend_from_slice(m.block_id.as_bytes());
                buffer.extend_from_slice(&m.sender2.to_le_bytes());
                buffer.extend_from_slice(m.signature2.unwrap_or(Signature::EMPTY).as_bytes());
                buffer.extend_from_slice(&m.sender.to_le_bytes());
                buffer.extend_from_slice(m.signature.as_bytes());
            }
            Message::QuitEpoch(m) => m.certificate.encode_to(&mut buffer),
            Message::Certificate(m) => {
                buffer.extend_from_slice(&m.epoch.to_le_bytes());
                m.certificate.encode_to(&mut buffer);
            }
            Message::DeltaRequest(m) | Message::DeltaResponse(m) => {
                buffer.extend_from_slice(&m.payload);
                buffer.extend_from_slice(&m.sender.to_le_bytes());
            }
        }
        buffer
    }

    /// Decode a message occupying the whole buffer
    pub fn decode(buffer: &[u8]) -> ConsensusResult<Self> {
        let mut reader = WireReader::new(buffer);
        let code = reader.u8()?;
        if code != MESSAGE_CODE {
            return Err(ConsensusError::InvalidMessageCode(code));
        }
        let message_type = MessageType::from_code(reader.u8()?)?;

        let message = match message_type {
            MessageType::Propose => {
                let epoch = reader.u64()?;
                let block_len = reader.u32()? as usize;
                let block = Block::decode(reader.take(block_len)?)?;
                let has_certificate = reader.u8()? != 0;
                let trailer = 2 + 2 + SIGNATURE_SIZE;
                let certificate = if has_certificate {
                    let cert_len = reader.remaining().checked_sub(trailer).ok_or(
                        ConsensusError::Truncated {
                            offset: reader.offset(),
                            needed: trailer,
                            available: reader.remaining(),
                        },
                    )?;
                    Some(Certificate::decode(reader.take(cert_len)?)?)
                } else {
                    None
                };
                Message::Propose(Proposal {
                    epoch,
                    block,
                    certificate,
                    sender: reader.u16()?,
                    sender_fwd: reader.u16()?,
                    signature: reader.signature()?,
                })
            }
            MessageType::Silence => Message::Silence(Silence {
                epoch: reader.u64()?,
                sender: reader.u16()?,
                signature: reader.signature()?,
            }),
            MessageType::Vote => {
                let epoch = reader.u64()?;
                let height = reader.u64()?;
                let block_id = reader.block_id()?;
                let sender2 = reader.u16()?;
                let signature2 = reader.signature()?;
                Message::Vote(Vote {
                    epoch,
                    height,
                    block_id,
                    sender2,
                    signature2: (!signature2.is_empty()).then_some(signature2),
                    sender: reader.u16()?,
                    signature: reader.signature()?,
                })
            }
            MessageType::QuitEpoch => Message::QuitEpoch(QuitEpoch {
                certificate: Certificate::decode(reader.take_rest())?,
            }),
            MessageType::Certificate => {
                let epoch = reader.u64()?;
                Message::Certificate(CertificateMessage {
                    epoch,
                    certificate: Certificate::decode(reader.take_rest())?,
                })
            }
            MessageType::DeltaRequest | MessageType::DeltaResponse => {
                let payload_len =
                    reader
                        .remaining()
                        .checked_sub(2)
                        .ok_or(ConsensusError::Truncated {
                            offset: reader.offset(),
                            needed: 2,
                            available: reader.remaining(),
                        })?;
                let delta = Delta {
                    payload: reader.take(payload_len)?.to_vec(),
                    sender: reader.u16()?,
                };
                if message_type == MessageType::DeltaRequest {
                    Message::DeltaRequest(delta)
                } else {
                    Message::DeltaResponse(delta)
                }
            }
        };

        if reader.remaining() != 0 {
            return Err(ConsensusError::LengthMismatch {
                declared: reader.offset(),
                actual: buffer.len(),
            });
        }
        Ok(message)
    }
}
