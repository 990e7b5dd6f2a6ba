//! # Ed25519 message signing
//!
//! Deterministic signatures: no RNG is needed to sign, so replicas started
//! from the same seeds produce identical messages.

use crate::domain::{ConsensusError, ConsensusResult, ProcessId, Signature};
use crate::ports::MessageSigner;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

/// Signs statements with the local process's secret key
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Create from secret seed (32 bytes).
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl MessageSigner for Ed25519Signer {
    fn sign(&self, payload: &[u8]) -> Signature {
        Signature(self.signing_key.sign(payload).to_bytes())
    }
}

/// Check `signature` over `payload` against `key`
pub fn verify_signature(key: &VerifyingKey, payload: &[u8], signature: &Signature) -> bool {
    let signature = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    key.verify(payload, &signature).is_ok()
}

/// Parse a public key table indexed by process id
pub fn public_keys_from_bytes(keys: &[[u8; 32]]) -> ConsensusResult<Vec<VerifyingKey>> {
    keys.iter()
        .enumerate()
        .map(|(process, bytes)| {
            VerifyingKey::from_bytes(bytes)
                .map_err(|_| ConsensusError::InvalidPublicKey(process as ProcessId))
        })
        .collect()
}
