//! Block domain entity
//!
//! A block is `(height, prev_block_id, value)`. Its identifier is the SHA-256
//! digest of the encoded block, computed once and cached.

use super::wire::WireReader;
use super::{ConsensusResult, Height, MIN_HEIGHT};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;

/// Size of a block identifier in bytes
pub const BLOCK_ID_SIZE: usize = 32;

/// SHA-256 hash of an encoded block
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub [u8; BLOCK_ID_SIZE]);

impl BlockId {
    /// Hash an encoded block
    pub fn digest(encoded: &[u8]) -> Self {
        let hash = Sha256::digest(encoded);
        let mut id = [0u8; BLOCK_ID_SIZE];
        id.copy_from_slice(&hash);
        Self(id)
    }

    pub fn as_bytes(&self) -> &[u8; BLOCK_ID_SIZE] {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({self})")
    }
}

/// Arena key of a block: blocks at the same height are told apart by id
pub type BlockKey = (Height, BlockId);

/// Immutable chain block.
///
/// Invariant: `prev_block_id` is `None` exactly when `height == MIN_HEIGHT`.
#[derive(Clone)]
pub struct Block {
    height: Height,
    value: Vec<u8>,
    prev_block_id: Option<BlockId>,
    id: OnceLock<BlockId>,
}

impl Block {
    /// Create a block at an explicit height
    pub fn new(height: Height, value: Vec<u8>, prev_block_id: Option<BlockId>) -> Self {
        debug_assert_eq!(
            prev_block_id.is_none(),
            height == MIN_HEIGHT,
            "only genesis-height blocks lack a predecessor"
        );
        Self {
            height,
            value,
            prev_block_id,
            id: OnceLock::new(),
        }
    }

    /// Create a genesis-height block
    pub fn genesis(value: Vec<u8>) -> Self {
        Self::new(MIN_HEIGHT, value, None)
    }

    /// Create a block extending `parent`
    pub fn child_of(parent: &Block, value: Vec<u8>) -> Self {
        Self::new(parent.height + 1, value, Some(parent.id()))
    }

    pub fn height(&self) -> Height {
        self.height
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn prev_block_id(&self) -> Option<BlockId> {
        self.prev_block_id
    }

    /// Block identifier (cached after the first call)
    pub fn id(&self) -> BlockId {
        *self.id.get_or_init(|| BlockId::digest(&self.encode()))
    }

    pub fn key(&self) -> BlockKey {
        (self.height, self.id())
    }

    /// Whether this block extends `other`, or is the same block.
    ///
    /// Only genesis-height blocks extend `None`.
    pub fn extends(&self, other: Option<&Block>) -> bool {
        let Some(other) = other else {
            return self.height == MIN_HEIGHT;
        };
        if self.height == other.height + 1 && self.prev_block_id == Some(other.id()) {
            return true;
        }
        self.height == other.height && self.id() == other.id()
    }

    /// Encoded size in bytes
    pub fn byte_size(&self) -> usize {
        match self.prev_block_id {
            Some(_) => 8 + BLOCK_ID_SIZE + self.value.len(),
            None => 8 + self.value.len(),
        }
    }

    /// Append the encoding `height | [prev_block_id] | value`
    pub fn encode_to(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.height.to_le_bytes());
        if let Some(prev) = &self.prev_block_id {
            buffer.extend_from_slice(prev.as_bytes());
        }
        buffer.extend_from_slice(&self.value);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.byte_size());
        self.encode_to(&mut buffer);
        buffer
    }

    /// Decode a block occupying the whole buffer.
    ///
    /// A predecessor id is present only for heights above genesis.
    pub fn decode(buffer: &[u8]) -> ConsensusResult<Self> {
        let mut reader = WireReader::new(buffer);
        let height = reader.u64()?;
        let prev_block_id = if height > MIN_HEIGHT {
            Some(reader.block_id()?)
        } else {
            None
        };
        let value = reader.take_rest().to_vec();
        Ok(Self {
            height,
            value,
            prev_block_id,
            id: OnceLock::new(),
        })
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.height == other.height
            && self.value == other.value
            && self.prev_block_id == other.prev_block_id
    }
}

impl Eq for Block {}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("height", &self.height)
            .field("id", &self.id())
            .field("prev", &self.prev_block_id)
            .field("value_len", &self.value.len())
            .finish()
    }
}
