use alloy_primitives::{BlockHash, BlockNumber, B256, U256};
use std::fmt::Debug;

/// A fully decoded, hash-consistent block as the engine core needs to see it.
///
/// Decoding and RLP hashing are out of scope for this crate (spec.md §1 lists
/// block/transaction decoding as an external collaborator); this trait is the
/// seam. A concrete block type (e.g. `alloy_consensus::Block`) implements it
/// once and every engine-tree routine stays generic over `B: ExecutionBlock`.
pub trait ExecutionBlock: Clone + Debug + Send + Sync + 'static {
    /// The block's own hash, `keccak(rlp(header))`.
    fn hash(&self) -> BlockHash;

    /// The block number.
    fn number(&self) -> BlockNumber;

    /// The parent block's hash.
    fn parent_hash(&self) -> BlockHash;

    /// The block timestamp, seconds since the Unix epoch.
    fn timestamp(&self) -> u64;

    /// The block's difficulty. Zero for every post-merge block.
    fn difficulty(&self) -> U256;

    /// The state root committed to in the header.
    fn state_root(&self) -> B256;

    /// Versioned hashes of every blob transaction in the block, concatenated
    /// in inclusion order. Empty if the block carries no blob transactions.
    fn blob_versioned_hashes(&self) -> Vec<B256>;
}

/// Execution outcome of running a block through the VM, independent of the
/// concrete VM/state-manager types (out of scope per spec.md §1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// The state root produced by applying the block's state transition.
    pub state_root: B256,
}
