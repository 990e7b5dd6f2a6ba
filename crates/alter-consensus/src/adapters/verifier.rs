//! Signature verification of inbound traffic
//!
//! Decodes raw bytes and checks every signature a message embeds against the
//! public key table. Verified `(signer, statement, signature)` triples are
//! cached so forwarded copies and certificates are not re-verified.

use super::crypto::verify_signature;
use crate::domain::{
    Certificate, ConsensusError, ConsensusResult, Message, ProcessId, Signature, MESSAGE_CODE,
};
use ed25519_dalek::VerifyingKey;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type CacheKey = (ProcessId, Signature, Vec<u8>);

fn certificate_statements(
    certificate: &Certificate,
) -> impl Iterator<Item = (ProcessId, Vec<u8>, Signature)> + '_ {
    let payload = certificate.payload();
    certificate
        .signatures()
        .map(move |(signer, signature)| (signer, payload.clone(), *signature))
}

/// Every `(signer, statement, signature)` a message carries
pub fn signed_statements(message: &Message) -> Vec<(ProcessId, Vec<u8>, Signature)> {
    let mut statements = Vec::new();
    match message {
        Message::Propose(proposal) => {
            statements.push((
                proposal.sender,
                proposal.signing_payload(),
                proposal.signature,
            ));
            if let Some(certificate) = &proposal.certificate {
                statements.extend(certificate_statements(certificate));
            }
        }
        Message::Silence(silence) => {
            statements.push((
                silence.sender,
                silence.signing_payload(),
                silence.signature,
            ));
        }
        Message::Vote(vote) => {
            let payload = vote.signing_payload();
            if let Some(signature2) = vote.signature2 {
                statements.push((vote.sender2, payload.clone(), signature2));
            }
            statements.push((vote.sender, payload, vote.signature));
        }
        Message::QuitEpoch(quit) => statements.extend(certificate_statements(&quit.certificate)),
        Message::Certificate(message) => {
            statements.extend(certificate_statements(&message.certificate))
        }
        Message::DeltaRequest(_) | Message::DeltaResponse(_) => {}
    }
    statements
}

pub struct SignatureVerifier {
    keys: Vec<VerifyingKey>,
    cache: Mutex<LruCache<CacheKey, ()>>,
}

impl SignatureVerifier {
    pub fn new(keys: Vec<VerifyingKey>, cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            keys,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Verified statements currently cached
    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }

    /// Decode `raw` and check every embedded signature
    pub fn verify(&self, raw: &[u8]) -> ConsensusResult<Message> {
        match raw.first() {
            Some(&MESSAGE_CODE) => {}
            Some(&code) => return Err(ConsensusError::InvalidMessageCode(code)),
            None => {
                return Err(ConsensusError::Truncated {
                    offset: 0,
                    needed: 1,
                    available: 0,
                })
            }
        }
        let message = Message::decode(raw)?;
        for (signer, payload, signature) in signed_statements(&message) {
            self.verify_statement(signer, payload, signature)?;
        }
        Ok(message)
    }

    fn verify_statement(
        &self,
        signer: ProcessId,
        payload: Vec<u8>,
        signature: Signature,
    ) -> ConsensusResult<()> {
        let key = (signer, signature, payload);
        if self.cache.lock().get(&key).is_some() {
            return Ok(());
        }
        let public_key = self
            .keys
            .get(signer as usize)
            .ok_or(ConsensusError::UnknownSigner(signer))?;
        if !verify_signature(public_key, &key.2, &signature) {
            return Err(ConsensusError::InvalidSignature(signer));
        }
        self.cache.lock().put(key, ());
        Ok(())
    }

    /// Verify raw messages from `input` and pass the valid ones to `output`.
    ///
    /// Stops when either queue closes.
    pub fn spawn(
        self: Arc<Self>,
        mut input: mpsc::UnboundedReceiver<Vec<u8>>,
        output: mpsc::Sender<Message>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(raw) = input.recv().await {
                match self.verify(&raw) {
                    Ok(message) => {
                        if output.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(ConsensusError::InvalidMessageCode(code)) => {
                        debug!(code, "not a consensus message, skipped");
                    }
                    Err(error) => warn!(%error, "message rejected"),
                }
            }
            debug!("verifier stopped");
        })
    }
}
