//! Little-endian cursor used by the block, certificate and message decoders.

use super::{BlockId, ConsensusError, ConsensusResult, Signature, BLOCK_ID_SIZE, SIGNATURE_SIZE};

/// Read cursor over an encoded buffer
pub(crate) struct WireReader<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    pub fn take(&mut self, len: usize) -> ConsensusResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(ConsensusError::Truncated {
                offset: self.offset,
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn take_rest(&mut self) -> &'a [u8] {
        let slice = &self.buffer[self.offset..];
        self.offset = self.buffer.len();
        slice
    }

    fn array<const N: usize>(&mut self) -> ConsensusResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> ConsensusResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> ConsensusResult<u16> {
        self.array::<2>().map(u16::from_le_bytes)
    }

    pub fn u32(&mut self) -> ConsensusResult<u32> {
        self.array::<4>().map(u32::from_le_bytes)
    }

    pub fn u64(&mut self) -> ConsensusResult<u64> {
        self.array::<8>().map(u64::from_le_bytes)
    }

    pub fn block_id(&mut self) -> ConsensusResult<BlockId> {
        self.array::<BLOCK_ID_SIZE>().map(BlockId)
    }

    pub fn signature(&mut self) -> ConsensusResult<Signature> {
        self.array::<SIGNATURE_SIZE>().map(Signature)
    }
}
