//! Block Cache: the in-memory home for blocks the tree has seen but storage has not yet
//! finalized.
//!
//! Grounded on reth's `TreeState`/`EngineApiTreeState` (`engine/tree/src/tree/mod.rs`): two maps
//! keyed by hash and by number so a finality watermark can be swept forward in one pass, plus a
//! small LRU for blocks whose parent hasn't arrived yet (the remote/buffered half of spec.md
//! §4.1).

use alloy_primitives::{BlockHash, BlockNumber, B256};
use engine_primitives::{ExecutionBlock, ExecutionOutcome};
use schnellru::{ByLength, LruMap};
use std::collections::{BTreeMap, HashMap};

/// A block that has been run through the VM and is held in memory pending finalization.
#[derive(Debug, Clone)]
pub struct ExecutedBlock<B> {
    /// The decoded block.
    pub block: B,
    /// The state root (and any other outcome data) produced by executing it.
    pub outcome: ExecutionOutcome,
}

/// Blocks the tree has executed and is keeping live, indexed both by hash (for ancestor walks
/// and forkchoice lookups) and by number (so a finality watermark can be applied cheaply).
#[derive(Debug)]
pub struct TreeState<B: ExecutionBlock> {
    blocks_by_hash: HashMap<BlockHash, ExecutedBlock<B>>,
    blocks_by_number: BTreeMap<BlockNumber, Vec<BlockHash>>,
}

impl<B: ExecutionBlock> Default for TreeState<B> {
    fn default() -> Self {
        Self { blocks_by_hash: HashMap::new(), blocks_by_number: BTreeMap::new() }
    }
}

impl<B: ExecutionBlock> TreeState<B> {
    /// Looks up an executed block by hash.
    pub fn block_by_hash(&self, hash: BlockHash) -> Option<&ExecutedBlock<B>> {
        self.blocks_by_hash.get(&hash)
    }

    /// Records a newly executed block.
    pub fn insert_executed(&mut self, executed: ExecutedBlock<B>) {
        let hash = executed.block.hash();
        let number = executed.block.number();
        self.blocks_by_number.entry(number).or_default().push(hash);
        self.blocks_by_hash.insert(hash, executed);
    }

    /// Drops every executed block below `finalized_number`, freeing memory for anything the
    /// consensus layer has told us can no longer be reorged away from (spec.md §4.1's pruning
    /// rule).
    pub fn prune_before(&mut self, finalized_number: BlockNumber) {
        while self
            .blocks_by_number
            .first_key_value()
            .map(|(number, _)| *number < finalized_number)
            .unwrap_or(false)
        {
            let (_, hashes) = self.blocks_by_number.pop_first().expect("checked above");
            for hash in hashes {
                self.blocks_by_hash.remove(&hash);
            }
        }
    }

    /// Number of executed blocks currently held.
    pub fn len(&self) -> usize {
        self.blocks_by_hash.len()
    }

    /// Whether no executed blocks are held.
    pub fn is_empty(&self) -> bool {
        self.blocks_by_hash.is_empty()
    }
}

/// Blocks seen via a `newPayload` call (accepted or executed) but not yet canonical, keyed by
/// hash and by number for watermark pruning (spec.md §3/§4.1's Remote Blocks Cache).
#[derive(Debug)]
pub struct RemoteCache<B: ExecutionBlock> {
    by_hash: HashMap<BlockHash, B>,
    by_number: BTreeMap<BlockNumber, Vec<BlockHash>>,
}

impl<B: ExecutionBlock> Default for RemoteCache<B> {
    fn default() -> Self {
        Self { by_hash: HashMap::new(), by_number: BTreeMap::new() }
    }
}

impl<B: ExecutionBlock> RemoteCache<B> {
    /// Records a block seen via payload but not yet canonical.
    pub fn insert(&mut self, block: B) {
        let hash = block.hash();
        let number = block.number();
        self.by_number.entry(number).or_default().push(hash);
        self.by_hash.insert(hash, block);
    }

    /// Looks up a remote block by hash.
    pub fn block_by_hash(&self, hash: BlockHash) -> Option<&B> {
        self.by_hash.get(&hash)
    }

    /// Drops every remote block at or below `finalized_number` (spec.md §4.1's watermark for
    /// this cache).
    pub fn prune_before(&mut self, finalized_number: BlockNumber) {
        while self
            .by_number
            .first_key_value()
            .map(|(number, _)| *number <= finalized_number)
            .unwrap_or(false)
        {
            let (_, hashes) = self.by_number.pop_first().expect("checked above");
            for hash in hashes {
                self.by_hash.remove(&hash);
            }
        }
    }
}

/// Capacity of the buffered-block LRU. Blocks whose parent has not arrived sit here until
/// either the parent shows up or they age out.
const BUFFERED_BLOCK_CAPACITY: u32 = 256;

/// Blocks received (e.g. via `newPayload`) whose parent is not yet known to the tree or to
/// storage. Held so that once the missing ancestor arrives, buffered descendants can be
/// replayed instead of re-requested from the network.
#[derive(Debug)]
pub struct BlockBuffer<B: ExecutionBlock> {
    blocks: LruMap<BlockHash, B>,
    by_parent: HashMap<BlockHash, Vec<BlockHash>>,
}

impl<B: ExecutionBlock> Default for BlockBuffer<B> {
    fn default() -> Self {
        Self {
            blocks: LruMap::new(ByLength::new(BUFFERED_BLOCK_CAPACITY)),
            by_parent: HashMap::new(),
        }
    }
}

impl<B: ExecutionBlock> BlockBuffer<B> {
    /// Buffers `block`, indexed under its parent hash.
    pub fn insert(&mut self, block: B) {
        let hash = block.hash();
        let parent = block.parent_hash();
        self.by_parent.entry(parent).or_default().push(hash);
        self.blocks.insert(hash, block);
    }

    /// Returns and removes every buffered block whose parent is `parent_hash`.
    pub fn remove_children_of(&mut self, parent_hash: BlockHash) -> Vec<B> {
        let Some(children) = self.by_parent.remove(&parent_hash) else {
            return Vec::new();
        };
        children.into_iter().filter_map(|hash| self.blocks.remove(&hash)).collect()
    }

    /// Looks up a buffered block by hash without removing it.
    pub fn block_by_hash(&mut self, hash: BlockHash) -> Option<&B> {
        self.blocks.get(&hash).map(|b| &*b)
    }

    /// Walks buffered ancestors starting at `hash` and returns the earliest one whose own
    /// parent is not itself buffered — the detached root of this buffered chain.
    pub fn lowest_buffered_ancestor(&mut self, hash: BlockHash) -> B256 {
        let mut current = hash;
        loop {
            let Some(block) = self.blocks.get(&current) else {
                return current;
            };
            current = block.parent_hash();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_primitives::ExecutionBlock as _;
    use alloy_primitives::U256;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestBlock {
        hash: BlockHash,
        number: BlockNumber,
        parent_hash: BlockHash,
    }

    impl ExecutionBlock for TestBlock {
        fn hash(&self) -> BlockHash {
            self.hash
        }
        fn number(&self) -> BlockNumber {
            self.number
        }
        fn parent_hash(&self) -> BlockHash {
            self.parent_hash
        }
        fn timestamp(&self) -> u64 {
            0
        }
        fn difficulty(&self) -> U256 {
            U256::ZERO
        }
        fn state_root(&self) -> B256 {
            B256::ZERO
        }
        fn blob_versioned_hashes(&self) -> Vec<B256> {
            Vec::new()
        }
    }

    fn block(number: u64, hash: u8, parent: u8) -> TestBlock {
        TestBlock {
            hash: BlockHash::repeat_byte(hash),
            number,
            parent_hash: BlockHash::repeat_byte(parent),
        }
    }

    #[test]
    fn prune_before_drops_only_stale_numbers() {
        let mut state = TreeState::default();
        state.insert_executed(ExecutedBlock {
            block: block(1, 1, 0),
            outcome: ExecutionOutcome { state_root: B256::ZERO },
        });
        state.insert_executed(ExecutedBlock {
            block: block(2, 2, 1),
            outcome: ExecutionOutcome { state_root: B256::ZERO },
        });

        state.prune_before(2);

        assert!(state.block_by_hash(BlockHash::repeat_byte(1)).is_none());
        assert!(state.block_by_hash(BlockHash::repeat_byte(2)).is_some());
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn buffer_replays_children_once_parent_arrives() {
        let mut buffer = BlockBuffer::default();
        buffer.insert(block(2, 2, 1));

        assert!(buffer.remove_children_of(BlockHash::repeat_byte(1)).len() == 1);
        assert!(buffer.remove_children_of(BlockHash::repeat_byte(1)).is_empty());
    }

    #[test]
    fn lowest_buffered_ancestor_walks_to_the_detached_root() {
        let mut buffer = BlockBuffer::default();
        buffer.insert(block(3, 3, 2));
        buffer.insert(block(2, 2, 1));

        assert_eq!(buffer.lowest_buffered_ancestor(BlockHash::repeat_byte(3)), BlockHash::repeat_byte(1));
    }
}
