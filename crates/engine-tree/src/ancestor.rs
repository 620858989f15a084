//! Ancestor Walker (spec.md §4.4): bridges a parent hash back to the VM head by following
//! parent pointers, without executing anything along the way.

use alloy_primitives::BlockHash;
use engine_primitives::{ExecutionBlock, ForkchoiceError};

/// Walks parent pointers starting at `start_parent_hash`, stopping once `vm_head_hash` or the
/// zero hash is reached, and returns the bridged blocks oldest-first (i.e. `start_parent_hash`'s
/// block last, if it is itself included).
///
/// `vm_head_hash` is never included in the result: it is already known to be executed, which is
/// exactly why the walk stops there. `lookup` resolves a hash to a block, searching whatever
/// combination of caches and chain storage the caller wants to consult (spec.md §4.5 step 4:
/// "beacon skeleton → remote cache → chain").
///
/// Returns [`ForkchoiceError::CannotExtendChain`] if the walk exceeds `max_depth` or a hash
/// along the way cannot be resolved at all — both are observably "not enough information to
/// extend the chain yet", which callers turn into `SYNCING`.
pub fn walk_ancestors<B: ExecutionBlock>(
    vm_head_hash: BlockHash,
    start_parent_hash: BlockHash,
    max_depth: u64,
    mut lookup: impl FnMut(BlockHash) -> Option<B>,
) -> Result<Vec<B>, ForkchoiceError> {
    let mut chain = Vec::new();
    let mut current = start_parent_hash;
    let mut depth = 0u64;

    while current != vm_head_hash && current != BlockHash::ZERO {
        if depth > max_depth {
            return Err(ForkchoiceError::CannotExtendChain);
        }
        let block = lookup(current).ok_or(ForkchoiceError::CannotExtendChain)?;
        current = block.parent_hash();
        chain.push(block);
        depth += 1;
    }

    chain.reverse();
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestBlock {
        hash: BlockHash,
        parent_hash: BlockHash,
    }

    impl ExecutionBlock for TestBlock {
        fn hash(&self) -> BlockHash {
            self.hash
        }
        fn number(&self) -> alloy_primitives::BlockNumber {
            0
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
        fn state_root(&self) -> alloy_primitives::B256 {
            alloy_primitives::B256::ZERO
        }
        fn blob_versioned_hashes(&self) -> Vec<alloy_primitives::B256> {
            Vec::new()
        }
    }

    fn chain_map() -> HashMap<BlockHash, TestBlock> {
        // head(0) <- 1 <- 2 <- 3
        let h = |n: u8| BlockHash::repeat_byte(n);
        HashMap::from([
            (h(1), TestBlock { hash: h(1), parent_hash: h(0) }),
            (h(2), TestBlock { hash: h(2), parent_hash: h(1) }),
            (h(3), TestBlock { hash: h(3), parent_hash: h(2) }),
        ])
    }

    #[test]
    fn walks_oldest_first_excluding_vm_head() {
        let map = chain_map();
        let h = |n: u8| BlockHash::repeat_byte(n);
        let result = walk_ancestors(h(0), h(3), 10, |hash| map.get(&hash).cloned()).unwrap();
        assert_eq!(result.iter().map(|b| b.hash).collect::<Vec<_>>(), vec![h(1), h(2), h(3)]);
    }

    #[test]
    fn empty_when_parent_already_is_vm_head() {
        let map = chain_map();
        let h = |n: u8| BlockHash::repeat_byte(n);
        let result = walk_ancestors(h(1), h(1), 10, |hash| map.get(&hash).cloned()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn overflow_reports_cannot_extend_chain() {
        let map = chain_map();
        let h = |n: u8| BlockHash::repeat_byte(n);
        let err = walk_ancestors(h(0), h(3), 1, |hash| map.get(&hash).cloned()).unwrap_err();
        assert!(matches!(err, ForkchoiceError::CannotExtendChain));
    }

    #[test]
    fn missing_ancestor_reports_cannot_extend_chain() {
        let h = |n: u8| BlockHash::repeat_byte(n);
        let err = walk_ancestors(h(0), h(9), 10, |_: BlockHash| Option::<TestBlock>::None)
            .unwrap_err();
        assert!(matches!(err, ForkchoiceError::CannotExtendChain));
    }
}
