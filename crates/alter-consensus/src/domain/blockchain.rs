//! Windowed block store
//!
//! Candidate blocks are kept in `size` height slots (slot `h mod size`), each
//! valid only while its recorded height equals `h`. Blocks live in an arena
//! keyed by `(height, id)` with explicit parent keys, so forks form a tree
//! rooted at the last committed block (the anchor).

use super::{Block, BlockId, BlockKey, Height, MIN_HEIGHT};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Arena entry: the block and the key of its linked predecessor
struct StoredBlock {
    block: Block,
    parent: Option<BlockKey>,
}

#[derive(Default)]
struct HeightSlot {
    height: Option<Height>,
    candidates: Vec<BlockId>,
}

/// Fixed-capacity store of candidate blocks above the last committed block
pub struct Blockchain {
    size: usize,
    slots: Vec<HeightSlot>,
    arena: HashMap<BlockKey, StoredBlock>,
    last_committed: Option<Block>,
}

impl Blockchain {
    /// Create a store with `size` height slots. `size` must be non-zero.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "blockchain window must hold at least one height");
        Self {
            size,
            slots: (0..size).map(|_| HeightSlot::default()).collect(),
            arena: HashMap::new(),
            last_committed: None,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The anchor: last committed block
    pub fn last_committed(&self) -> Option<&Block> {
        self.last_committed.as_ref()
    }

    fn anchor_key(&self) -> Option<BlockKey> {
        self.last_committed.as_ref().map(Block::key)
    }

    fn slot_index(&self, height: Height) -> usize {
        (height % self.size as u64) as usize
    }

    /// Whether `height` may hold candidates right now
    pub fn in_window(&self, height: Height) -> bool {
        match &self.last_committed {
            Some(anchor) => height > anchor.height() && height - anchor.height() < self.size as u64,
            None => height < self.size as u64,
        }
    }

    /// Stored candidate `(height, id)`
    pub fn get(&self, height: Height, block_id: &BlockId) -> Option<&Block> {
        self.arena
            .get(&(height, *block_id))
            .map(|stored| &stored.block)
    }

    /// Candidates currently stored at `height`
    pub fn candidates(&self, height: Height) -> Vec<&Block> {
        let slot = &self.slots[self.slot_index(height)];
        if slot.height != Some(height) {
            return Vec::new();
        }
        slot.candidates
            .iter()
            .filter_map(|id| self.get(height, id))
            .collect()
    }

    /// Number of stored candidates across all heights
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Add a candidate block.
    ///
    /// Rejects duplicates (including the anchor), heights outside the window,
    /// and blocks directly above the anchor that do not extend it.
    pub fn add_block(&mut self, block: &Block) -> bool {
        let height = block.height();
        let key = block.key();

        if self.anchor_key() == Some(key) || self.arena.contains_key(&key) {
            trace!(height, block = %key.1, "duplicate block");
            return false;
        }
        if !self.in_window(height) {
            debug!(height, block = %key.1, "block outside the window");
            return false;
        }
        if let Some(anchor) = &self.last_committed {
            if height == anchor.height() + 1 && !block.extends(Some(anchor)) {
                debug!(height, block = %key.1, "block conflicts with the committed chain");
                return false;
            }
        }

        self.claim_slot(height);

        let parent = block.prev_block_id().and_then(|prev| {
            let parent_key = (height - 1, prev);
            let linked =
                self.anchor_key() == Some(parent_key) || self.arena.contains_key(&parent_key);
            linked.then_some(parent_key)
        });

        let index = self.slot_index(height);
        self.slots[index].candidates.push(key.1);
        self.arena.insert(
            key,
            StoredBlock {
                block: block.clone(),
                parent,
            },
        );
        self.link_successors(key);

        trace!(height, block = %key.1, linked = parent.is_some(), "block added");
        true
    }

    /// Reset a stale slot before storing a block at `height` in it
    fn claim_slot(&mut self, height: Height) {
        let index = self.slot_index(height);
        if self.slots[index].height == Some(height) {
            return;
        }
        self.clear_slot(index);
        self.slots[index].height = Some(height);
    }

    fn clear_slot(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        if let Some(height) = slot.height.take() {
            for id in slot.candidates.drain(..) {
                self.arena.remove(&(height, id));
            }
        }
        slot.candidates.clear();
    }

    /// Link stored blocks one height above `key` that were waiting for it
    fn link_successors(&mut self, key: BlockKey) {
        let next = key.0 + 1;
        let index = self.slot_index(next);
        if self.slots[index].height != Some(next) {
            return;
        }
        for id in &self.slots[index].candidates {
            if let Some(stored) = self.arena.get_mut(&(next, *id)) {
                if stored.parent.is_none() && stored.block.prev_block_id() == Some(key.1) {
                    stored.parent = Some(key);
                }
            }
        }
    }

    /// Whether `block` is linked through stored predecessors to the anchor.
    ///
    /// Before any commit the chain must reach a genesis-height block instead.
    pub fn extend_valid_chain(&self, block: &Block) -> bool {
        let anchor = self.anchor_key();
        let mut current = block.key();
        loop {
            if anchor == Some(current) {
                return true;
            }
            let Some(stored) = self.arena.get(&current) else {
                return false;
            };
            match stored.parent {
                Some(parent) => current = parent,
                None => return anchor.is_none() && current.0 == MIN_HEIGHT,
            }
        }
    }

    /// Commit `block` and every uncommitted predecessor.
    ///
    /// Returns the committed blocks newest first. `block` becomes the anchor
    /// and the slots of the committed heights are freed.
    ///
    /// # Panics
    ///
    /// If the path from `block` to the anchor is not fully stored and linked.
    pub fn commit(&mut self, block: &Block) -> Vec<Block> {
        let anchor = self.anchor_key();
        let mut current = block.key();
        if anchor == Some(current) {
            return Vec::new();
        }

        let mut path = Vec::new();
        loop {
            let stored = self.arena.get(&current).unwrap_or_else(|| {
                panic!(
                    "committing height {} ({}): block at height {} missing from the window",
                    block.height(),
                    block.id(),
                    current.0
                )
            });
            path.push(stored.block.clone());
            match stored.parent {
                Some(parent) if anchor == Some(parent) => break,
                Some(parent) => current = parent,
                None if anchor.is_none() && current.0 == MIN_HEIGHT => break,
                None => panic!(
                    "committing height {} ({}): block at height {} is not linked",
                    block.height(),
                    block.id(),
                    current.0
                ),
            }
        }

        for committed in &path {
            let index = self.slot_index(committed.height());
            self.clear_slot(index);
        }
        self.last_committed = path.first().cloned();

        debug!(
            height = block.height(),
            block = %block.id(),
            committed = path.len(),
            "blocks committed"
        );
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_block(height: Height, parent: Option<&Block>, tag: &str) -> Block {
        Block::new(height, tag.as_bytes().to_vec(), parent.map(|p| p.id()))
    }

    fn create_child(parent: &Block, tag: &str) -> Block {
        Block::child_of(parent, tag.as_bytes().to_vec())
    }

    fn assert_window_invariant(chain: &Blockchain) {
        for slot in &chain.slots {
            if let Some(height) = slot.height {
                assert!(chain.in_window(height), "slot holds stale height {height}");
            }
        }
        for (height, _) in chain.arena.keys() {
            assert!(chain.in_window(*height));
        }
    }

    #[test]
    fn test_commit_returns_path_newest_first() {
        let mut chain = Blockchain::new(5);
        let b0 = create_block(0, None, "b0");
        let b1 = create_child(&b0, "b1");
        let b2 = create_child(&b1, "b2");

        assert!(chain.add_block(&b0));
        assert!(chain.add_block(&b1));
        assert!(chain.add_block(&b2));
        assert!(chain.extend_valid_chain(&b2));

        let committed = chain.commit(&b2);
        assert_eq!(committed, vec![b2.clone(), b1, b0]);
        assert_eq!(chain.last_committed(), Some(&b2));
        assert!(chain.is_empty());
        assert_window_invariant(&chain);
    }

    #[test]
    fn test_rejects_duplicates_and_anchor() {
        let mut chain = Blockchain::new(5);
        let b0 = create_block(0, None, "b0");
        assert!(chain.add_block(&b0));
        assert!(!chain.add_block(&b0));

        chain.commit(&b0);
        assert!(!chain.add_block(&b0));
    }

    #[test]
    fn test_rejects_out_of_window() {
        let mut chain = Blockchain::new(3);
        let far = create_block(3, Some(&create_block(0, None, "x")), "far");
        assert!(!chain.add_block(&far));

        let b0 = create_block(0, None, "b0");
        chain.add_block(&b0);
        chain.commit(&b0);

        let other_genesis = create_block(0, None, "other");
        assert!(!chain.add_block(&other_genesis));
        let b1 = create_child(&b0, "b1");
        let b2 = create_child(&b1, "b2");
        let b3 = create_child(&b2, "b3");
        assert!(chain.add_block(&b1));
        assert!(chain.add_block(&b2));
        assert!(!chain.add_block(&b3));
    }

    #[test]
    fn test_rejects_conflict_above_anchor() {
        let mut chain = Blockchain::new(5);
        let b0 = create_block(0, None, "b0");
        let fork = create_block(0, None, "fork");
        chain.add_block(&b0);
        chain.commit(&b0);

        let bad = create_child(&fork, "bad");
        assert!(!chain.add_block(&bad));

        // Higher blocks are admitted and linked later
        let good = create_child(&create_child(&fork, "mid"), "good");
        assert!(chain.add_block(&good));
        assert!(!chain.extend_valid_chain(&good));
    }

    #[test]
    fn test_successor_linked_when_predecessor_arrives() {
        let mut chain = Blockchain::new(5);
        let b0 = create_block(0, None, "b0");
        let b1 = create_child(&b0, "b1");
        let b2 = create_child(&b1, "b2");

        assert!(chain.add_block(&b2));
        assert!(chain.add_block(&b0));
        assert!(!chain.extend_valid_chain(&b2));

        assert!(chain.add_block(&b1));
        assert!(chain.extend_valid_chain(&b1));
        assert!(chain.extend_valid_chain(&b2));
    }

    #[test]
    fn test_extend_valid_chain_requires_genesis_root() {
        let mut chain = Blockchain::new(5);
        let orphan = create_block(1, Some(&create_block(0, None, "missing")), "orphan");
        chain.add_block(&orphan);
        assert!(!chain.extend_valid_chain(&orphan));

        let unknown = create_block(0, None, "unknown");
        assert!(!chain.extend_valid_chain(&unknown));
    }

    #[test]
    fn test_commit_clears_forks_at_committed_heights() {
        let mut chain = Blockchain::new(5);
        let b0 = create_block(0, None, "b0");
        let b1 = create_child(&b0, "b1");
        let f1 = create_child(&b0, "f1");
        let f2 = create_child(&f1, "f2");
        let b2 = create_child(&b1, "b2");

        for block in [&b0, &b1, &f1, &f2, &b2] {
            assert!(chain.add_block(block));
        }
        assert_eq!(chain.candidates(1).len(), 2);

        let committed = chain.commit(&b1);
        assert_eq!(committed, vec![b1.clone(), b0]);
        assert!(chain.candidates(1).is_empty());
        assert!(chain.extend_valid_chain(&b2));
        assert!(!chain.extend_valid_chain(&f2));
        assert_window_invariant(&chain);
    }

    #[test]
    fn test_window_slides_across_many_commits() {
        let mut chain = Blockchain::new(3);
        let mut tip = create_block(0, None, "g");
        chain.add_block(&tip);
        chain.commit(&tip);

        for round in 1..20 {
            let next = create_child(&tip, &format!("r{round}"));
            let stale = create_child(&tip, &format!("s{round}"));
            assert!(chain.add_block(&next));
            assert!(chain.add_block(&stale));
            assert_eq!(chain.commit(&next), vec![next.clone()]);
            assert_window_invariant(&chain);
            tip = next;
        }
        assert_eq!(chain.last_committed().map(Block::height), Some(19));
    }

    #[test]
    fn test_slot_reused_after_commit() {
        let mut chain = Blockchain::new(2);
        let b0 = create_block(0, None, "b0");
        let b1 = create_child(&b0, "b1");
        let b2 = create_child(&b1, "b2");
        chain.add_block(&b0);
        chain.add_block(&b1);
        assert_eq!(chain.commit(&b1).len(), 2);

        // Height 2 lands in the slot height 0 used
        assert!(chain.add_block(&b2));
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.candidates(2), vec![&b2]);
        assert!(chain.candidates(0).is_empty());
        assert!(chain.extend_valid_chain(&b2));
    }

    #[test]
    #[should_panic(expected = "missing from the window")]
    fn test_commit_unknown_block_panics() {
        let mut chain = Blockchain::new(5);
        chain.commit(&create_block(0, None, "never added"));
    }
}
