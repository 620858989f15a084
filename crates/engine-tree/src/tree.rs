//! The engine's owned state machine: caches, forkchoice tracking and the collaborators it
//! drives requests through.
//!
//! Grounded on reth's `EngineApiTreeHandlerImpl<P, E, T>` (`engine/tree/src/tree/mod.rs`): one
//! struct holding the provider/executor/decoder collaborators alongside the block caches, owned
//! exclusively by whichever task processes engine requests (spec.md §5's single-task-owner
//! concurrency model — see [`crate::handle::EngineHandle`] for how callers reach it).

use crate::{
    cache::{BlockBuffer, RemoteCache, TreeState},
    metrics::TreeMetrics,
};
use alloy_primitives::BlockHash;
use engine_primitives::{
    BeaconSyncHandle, BlockDecoder, ChainProvider, EngineChainSpec, ExecutionBlock,
    ExecutionEngine, MempoolHandle, PendingBuildService,
};
use std::sync::Arc;

/// Default bound on how many blocks a single `newPayload` call will execute before bailing out
/// with `SYNCING`/`ACCEPTED` instead (spec.md §4.6's `engineNewpayloadMaxExecute`).
pub const DEFAULT_MAX_EXECUTE_PER_PAYLOAD: usize = 1024;

/// Default bound on how deep the ancestor walker may recurse before reporting it cannot yet
/// extend the chain (spec.md §4.4's `maxDepth`).
pub const DEFAULT_MAX_ANCESTOR_DEPTH: u64 = 1024;

/// The last-seen hardfork per method family, tracked so a hardfork transition can be logged
/// once instead of on every request (spec.md §3).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LastSeenHardforks {
    /// Hardfork last observed on a `newPayload*` call.
    pub new_payload: Option<engine_primitives::Hardfork>,
    /// Hardfork last observed on a `forkchoiceUpdated*` call.
    pub forkchoice_updated: Option<engine_primitives::Hardfork>,
}

/// Tracks the most recent forkchoice state the consensus layer has sent, so a repeated update
/// with the same head can be recognised as a no-op (spec.md §4.7 step 4's hardfork-change log
/// and the `EngineApiTreeState`'s `ForkchoiceStateTracker` field).
#[derive(Debug, Default)]
pub struct ForkchoiceStateTracker {
    last: Option<alloy_rpc_types_engine::ForkchoiceState>,
}

impl ForkchoiceStateTracker {
    /// Records `state` as the most recently received forkchoice update.
    pub fn set_latest(&mut self, state: alloy_rpc_types_engine::ForkchoiceState) {
        self.last = Some(state);
    }

    /// Returns the most recently received forkchoice state, if any.
    pub fn last(&self) -> Option<&alloy_rpc_types_engine::ForkchoiceState> {
        self.last.as_ref()
    }
}

/// The in-memory block tree and the collaborators it is wired to.
///
/// Generic over the decoded block type `B`; every other collaborator is held behind an `Arc<dyn
/// Trait>` so the tree itself stays a single concrete type regardless of which storage/VM/sync
/// stack it's wired to; swapping a collaborator never requires recompiling the state machine.
pub struct EngineTree<B: ExecutionBlock> {
    pub(crate) spec: Arc<dyn EngineChainSpec>,
    pub(crate) provider: Arc<dyn ChainProvider<B>>,
    pub(crate) executor: Arc<dyn ExecutionEngine<B>>,
    pub(crate) decoder: Arc<dyn BlockDecoder<B>>,
    pub(crate) sync: Arc<dyn BeaconSyncHandle>,
    pub(crate) mempool: Arc<dyn MempoolHandle>,
    pub(crate) pending_builds: Arc<dyn PendingBuildService<B>>,

    pub(crate) state: TreeState<B>,
    pub(crate) remote: RemoteCache<B>,
    pub(crate) buffer: BlockBuffer<B>,
    pub(crate) forkchoice: ForkchoiceStateTracker,
    pub(crate) last_seen_hardforks: LastSeenHardforks,

    pub(crate) vm_head: BlockHash,
    pub(crate) max_execute_per_payload: usize,
    pub(crate) max_ancestor_depth: u64,

    pub(crate) metrics: TreeMetrics,
}

/// Collaborators required to build an [`EngineTree`], grouped so callers don't have to name
/// each `Arc<dyn Trait>` positionally.
pub struct EngineTreeCollaborators<B: ExecutionBlock> {
    /// Hardfork/TTD configuration.
    pub spec: Arc<dyn EngineChainSpec>,
    /// Read access to canonical chain storage.
    pub provider: Arc<dyn ChainProvider<B>>,
    /// The VM/state-transition function.
    pub executor: Arc<dyn ExecutionEngine<B>>,
    /// Wire-payload decoder and hash validator.
    pub decoder: Arc<dyn BlockDecoder<B>>,
    /// Beacon sync skeleton handle.
    pub sync: Arc<dyn BeaconSyncHandle>,
    /// Transaction pool handle.
    pub mempool: Arc<dyn MempoolHandle>,
    /// Pending payload-build bridge.
    pub pending_builds: Arc<dyn PendingBuildService<B>>,
}

impl<B: ExecutionBlock> EngineTree<B> {
    /// Builds a new tree rooted at `vm_head`, the block whose state the VM currently reflects.
    pub fn new(collaborators: EngineTreeCollaborators<B>, vm_head: BlockHash) -> Self {
        Self {
            spec: collaborators.spec,
            provider: collaborators.provider,
            executor: collaborators.executor,
            decoder: collaborators.decoder,
            sync: collaborators.sync,
            mempool: collaborators.mempool,
            pending_builds: collaborators.pending_builds,
            state: TreeState::default(),
            remote: RemoteCache::default(),
            buffer: BlockBuffer::default(),
            forkchoice: ForkchoiceStateTracker::default(),
            last_seen_hardforks: LastSeenHardforks::default(),
            vm_head,
            max_execute_per_payload: DEFAULT_MAX_EXECUTE_PER_PAYLOAD,
            max_ancestor_depth: DEFAULT_MAX_ANCESTOR_DEPTH,
            metrics: TreeMetrics::default(),
        }
    }

    /// Overrides the execution-per-payload bound. Exposed for configuration and tests.
    pub fn with_max_execute_per_payload(mut self, max: usize) -> Self {
        self.max_execute_per_payload = max;
        self
    }

    /// Overrides the ancestor-walk depth bound. Exposed for configuration and tests.
    pub fn with_max_ancestor_depth(mut self, max: u64) -> Self {
        self.max_ancestor_depth = max;
        self
    }

    /// The block whose state the VM currently reflects.
    pub fn vm_head(&self) -> BlockHash {
        self.vm_head
    }

    /// Whether `hash` is already executed: either held in the executed-block cache, or
    /// canonical at or below the VM head and resolvable through storage (spec.md §4.5 step 3).
    pub(crate) async fn is_executed_or_canonical(&self, hash: BlockHash) -> bool {
        if self.state.block_by_hash(hash).is_some() {
            return true;
        }
        matches!(self.provider.block_by_hash(hash).await, Ok(Some(_)))
    }

    /// Resolves the "valid hash" to report for `hash`: itself, if it is known to be executed or
    /// canonical, else `None` (spec.md's recurring `validHash(parentHash)` helper).
    pub(crate) async fn valid_hash(&self, hash: BlockHash) -> Option<BlockHash> {
        if hash.is_zero() {
            return Some(BlockHash::ZERO);
        }
        if self.is_executed_or_canonical(hash).await {
            Some(hash)
        } else {
            None
        }
    }

    /// Looks up a block by hash, consulting the executed cache, then the remote cache, then
    /// storage — the order spec.md §4.5 step 4 calls "beacon skeleton → remote cache → chain"
    /// collapsed by one tier since the beacon skeleton is out of scope here.
    pub(crate) async fn find_block(&self, hash: BlockHash) -> Option<B>
    where
        B: Clone,
    {
        if let Some(executed) = self.state.block_by_hash(hash) {
            return Some(executed.block.clone());
        }
        if let Some(remote) = self.remote.block_by_hash(hash) {
            return Some(remote.clone());
        }
        self.provider.block_by_hash(hash).await.ok().flatten()
    }

    /// Resolves whether `block` is itself the terminal PoW block (spec.md §4.5.1), by pulling
    /// its own and its parent's cumulative total difficulty from the chain provider and
    /// comparing against the configured TTD.
    ///
    /// Total-difficulty accounting is the out-of-scope chain collaborator's own concern; when
    /// the TTD isn't configured, or the provider can't resolve a total difficulty for `block` or
    /// its parent, this trusts that an upstream terminal check already ran rather than blocking
    /// the request on data this crate has no way to reconstruct itself.
    pub(crate) async fn is_terminal_block(&self, block: &B) -> bool {
        let Some(ttd) = self.spec.terminal_total_difficulty() else {
            return true;
        };
        let Ok(Some(block_td)) = self.provider.total_difficulty(block.hash()).await else {
            return true;
        };
        let parent_td = self.provider.total_difficulty(block.parent_hash()).await.ok().flatten();
        crate::terminal::is_terminal_block(block_td, parent_td, ttd)
    }
}
