//! Primitive identifiers shared by every consensus structure

use std::fmt;

/// Epoch number. Epoch `e` is led by process `e mod N`.
pub type Epoch = u64;

/// Height of a block in the chain. Genesis is at [`MIN_HEIGHT`].
pub type Height = u64;

/// Process identifier, encoded on the wire as a little-endian `u16`.
pub type ProcessId = u16;

/// Height of the first block of the chain
pub const MIN_HEIGHT: Height = 0;

/// First byte of every consensus wire message and certificate
pub const MESSAGE_CODE: u8 = 0;

/// Size of an ed25519 signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Size of a `(sender, signature)` pair on the wire
pub const MESSAGE_SIGNATURE_SIZE: usize = SIGNATURE_SIZE + 2;

/// Raw ed25519 signature over a message payload.
///
/// The all-zero value marks an unsigned message; it is what the codec writes
/// before the owning process signs the encoded payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature(pub [u8; SIGNATURE_SIZE]);

impl Signature {
    /// Unsigned placeholder
    pub const EMPTY: Signature = Signature([0u8; SIGNATURE_SIZE]);

    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    /// Whether this is the unsigned placeholder
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}
