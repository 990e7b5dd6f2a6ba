//! Per-epoch collections of proposals and vote certificates

use super::{BlockId, Certificate, Epoch, Height, ProcessId, Proposal};
use std::collections::HashMap;

/// Proposals received for one epoch, keyed by block id in arrival order
#[derive(Debug, Default)]
pub struct ProposalSet {
    order: Vec<BlockId>,
    proposals: HashMap<BlockId, Proposal>,
}

impl ProposalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, block_id: &BlockId) -> bool {
        self.proposals.contains_key(block_id)
    }

    /// Record a proposal. Returns `false` if its block was already recorded.
    pub fn add(&mut self, proposal: Proposal) -> bool {
        let block_id = proposal.block.id();
        if self.proposals.contains_key(&block_id) {
            return false;
        }
        self.order.push(block_id);
        self.proposals.insert(block_id, proposal);
        true
    }

    pub fn get(&self, block_id: &BlockId) -> Option<&Proposal> {
        self.proposals.get(block_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The only recorded proposal, if exactly one was received
    pub fn single(&self) -> Option<&Proposal> {
        match self.order.as_slice() {
            [only] => self.proposals.get(only),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Proposal> {
        self.order.iter().filter_map(|id| self.proposals.get(id))
    }
}

/// Vote certificates of one epoch, keyed by `(height, block id)`
#[derive(Debug, Default)]
pub struct CertificateSet {
    certificates: HashMap<(Height, BlockId), Certificate>,
}

impl CertificateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Certificate for `(block_id, height)`, created empty on first use
    pub fn get_or_create(
        &mut self,
        epoch: Epoch,
        block_id: BlockId,
        height: Height,
    ) -> &mut Certificate {
        self.certificates
            .entry((height, block_id))
            .or_insert_with(|| Certificate::block(epoch, block_id, height))
    }

    pub fn get(&self, block_id: &BlockId, height: Height) -> Option<&Certificate> {
        self.certificates.get(&(height, *block_id))
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Certificates holding a signature from `signer`, ordered by height then id
    pub fn signed_by(&self, signer: ProcessId) -> Vec<&Certificate> {
        let mut signed: Vec<&Certificate> = self
            .certificates
            .values()
            .filter(|cert| cert.signature(signer).is_some())
            .collect();
        signed.sort_by_key(|cert| (cert.height(), cert.block_id()));
        signed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Block, Signature, SIGNATURE_SIZE};

    fn create_proposal(value: &[u8]) -> Proposal {
        Proposal {
            epoch: 0,
            block: Block::genesis(value.to_vec()),
            certificate: None,
            sender: 0,
            sender_fwd: 0,
            signature: Signature::EMPTY,
        }
    }

    #[test]
    fn test_proposal_set_single() {
        let mut set = ProposalSet::new();
        assert!(set.single().is_none());

        assert!(set.add(create_proposal(b"a")));
        assert!(!set.add(create_proposal(b"a")));
        assert_eq!(set.single().map(|p| p.block.value()), Some(&b"a"[..]));

        assert!(set.add(create_proposal(b"b")));
        assert_eq!(set.len(), 2);
        assert!(set.single().is_none());
        let values: Vec<_> = set.iter().map(|p| p.block.value().to_vec()).collect();
        assert_eq!(values, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn test_certificate_set_signed_by() {
        let a = Block::genesis(b"a".to_vec());
        let b = Block::genesis(b"b".to_vec());
        let mut set = CertificateSet::new();
        let sig = Signature([1u8; SIGNATURE_SIZE]);

        set.get_or_create(0, a.id(), 0).add_signature(0, sig);
        set.get_or_create(0, a.id(), 0).add_signature(1, sig);
        assert_eq!(set.len(), 1);
        assert_eq!(set.signed_by(0).len(), 1);

        set.get_or_create(0, b.id(), 0).add_signature(0, sig);
        assert_eq!(set.signed_by(0).len(), 2);
        assert_eq!(set.signed_by(1).len(), 1);
        assert!(set.signed_by(2).is_empty());
        assert_eq!(set.get(&a.id(), 0).map(|c| c.signature_count()), Some(2));
    }
}
