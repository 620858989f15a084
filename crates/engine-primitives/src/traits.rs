use crate::{
    block::{ExecutionBlock, ExecutionOutcome},
    error::NewPayloadError,
    payload::{BuiltPayload, ExecutionData, ExecutionPayload},
};
use alloy_primitives::{BlockHash, BlockNumber, B256};
use alloy_rpc_types_engine::{ExecutionPayloadBodyV1, PayloadAttributes, PayloadId};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

/// Read access to already-canonicalized chain state.
///
/// Out of scope to implement (spec.md §1 names storage as an external
/// collaborator); the engine-tree core only ever needs to ask it these
/// questions.
#[async_trait]
pub trait ChainProvider<B: ExecutionBlock>: Send + Sync + 'static {
    /// Looks up a canonical or side-chain block already known to storage by hash.
    async fn block_by_hash(&self, hash: BlockHash) -> eyre::Result<Option<B>>;

    /// Looks up a canonical block by number.
    async fn block_by_number(&self, number: BlockNumber) -> eyre::Result<Option<B>>;

    /// Returns the hash of the current canonical head known to storage, independent of
    /// whatever the in-memory tree considers its VM head.
    async fn canonical_head_hash(&self) -> eyre::Result<BlockHash>;

    /// Returns the cumulative total difficulty of the block identified by `hash`, if known.
    /// `None` for a block whose ancestry (or the block itself) isn't resolvable, and for any
    /// post-merge block whose total difficulty storage no longer bothers tracking.
    async fn total_difficulty(&self, hash: BlockHash) -> eyre::Result<Option<alloy_primitives::U256>>;
}

/// Runs a block through the VM and reports the resulting state root, or why it couldn't.
///
/// Out of scope to implement (spec.md §1 names the VM/state-transition function and state
/// manager as external collaborators).
#[async_trait]
pub trait ExecutionEngine<B: ExecutionBlock>: Send + Sync + 'static {
    /// Executes `block` against the state committed to by `block.parent_hash()`.
    async fn execute_block(&self, block: &B) -> Result<ExecutionOutcome, NewPayloadError>;

    /// Commits `blocks` (oldest first, already executed) as the canonical chain and records the
    /// new safe/finalized pointers. Used by the forkchoice resolver's canonicalization step.
    async fn canonicalize(
        &self,
        blocks: &[BlockHash],
        safe: Option<BlockHash>,
        finalized: Option<BlockHash>,
    ) -> eyre::Result<()>;

    /// Best-effort removal of a block that failed execution, from both chain storage and the
    /// beacon sync skeleton. Secondary errors are swallowed by the caller.
    async fn delete_block(&self, block_hash: BlockHash) -> eyre::Result<()>;
}

/// Decodes a wire [`ExecutionData`] payload into a concrete block type, performing the
/// block-hash and blob-versioned-hash checks that must hold regardless of sync state.
///
/// Out of scope to implement (spec.md §1); this is the seam that resolves the
/// "error-string sniffing" Open Question — implementations return a
/// [`NewPayloadError`] variant directly instead of a generic decode error.
pub trait BlockDecoder<B: ExecutionBlock>: Send + Sync + 'static {
    /// Decodes and validates `data`, returning the block on success.
    fn decode_and_validate(&self, data: &ExecutionData) -> Result<B, NewPayloadError>;
}

/// Handle to the beacon chain sync subsystem: whether it is actively backfilling, and how to
/// kick off sync toward a newly observed, unknown head.
///
/// Out of scope to implement (spec.md §1 names sync orchestration as an external collaborator
/// feeding the SYNCING/ACCEPTED decision in the payload validator).
#[async_trait]
pub trait BeaconSyncHandle: Send + Sync + 'static {
    /// Whether the node is still backfilling historical blocks and cannot yet service the
    /// canonical chain tip.
    fn is_backfill_active(&self) -> bool;

    /// Requests that sync begin targeting `target_hash` as the new sync goal.
    async fn download_full_block(&self, target_hash: BlockHash);
}

/// Handle to the transaction pool, consulted when a payload build is kicked off so the built
/// block can include pending transactions.
///
/// Out of scope to implement (spec.md §1).
pub trait MempoolHandle: Send + Sync + 'static {
    /// Removes transactions that a just-canonicalized block already included.
    fn remove_mined(&self, block_hash: BlockHash);
}

/// Bridge to the payload-building service invoked by a forkchoice update that carries
/// `payloadAttributes` (spec.md §4.8).
///
/// Out of scope to implement (spec.md §1 names payload construction as an external
/// collaborator); this is the seam the forkchoice resolver calls through to start a build
/// and the `getPayload*` methods call through to retrieve its current-best result.
#[async_trait]
pub trait PendingBuildService<B: ExecutionBlock>: Send + Sync + 'static {
    /// Starts building on top of `parent`, guided by `attributes`. Returns the id the
    /// consensus layer will later pass to `getPayload*`.
    async fn start_build(
        &self,
        parent: BlockHash,
        attributes: PayloadAttributes,
    ) -> eyre::Result<PayloadId>;

    /// Returns the best payload built so far under `id`, if the id is still known.
    async fn best_payload(&self, id: PayloadId) -> eyre::Result<Option<BuiltPayload<B>>>;
}

/// Produces the JSON-RPC wire envelope for a built payload — the inverse of [`BlockDecoder`].
///
/// Out of scope to implement (spec.md §1 groups encoding with decoding under the same
/// block/transaction collaborator); `getPayload*` calls through this once a build has been
/// retrieved from the [`PendingBuildService`], since `BuiltPayload::block` only carries the
/// engine's own decoded representation, not its wire form.
pub trait PayloadEncoder<B: ExecutionBlock>: Send + Sync + 'static {
    /// Encodes `block` back into its wire [`ExecutionPayload`] form.
    fn encode(&self, block: &B) -> ExecutionPayload;
}

/// Read access to decoded block bodies, independent of the header-only view [`ChainProvider`]
/// exposes.
///
/// Out of scope to implement (spec.md §1 names the blockchain/block-store as an external
/// collaborator). `getPayloadBodies*` (spec.md §4.10) is the only caller — the engine-tree core
/// never needs a transaction or withdrawal list, only the header fields [`ExecutionBlock`]
/// already exposes.
#[async_trait]
pub trait PayloadBodyProvider: Send + Sync + 'static {
    /// Looks up a block's body by hash. `Ok(None)` means the hash is unknown.
    async fn body_by_hash(&self, hash: BlockHash) -> eyre::Result<Option<ExecutionPayloadBodyV1>>;

    /// Looks up a block's body by number. `Ok(None)` means the number is unknown.
    async fn body_by_number(
        &self,
        number: BlockNumber,
    ) -> eyre::Result<Option<ExecutionPayloadBodyV1>>;

    /// The highest block number currently known to storage. `getPayloadBodiesByRangeV1` clamps
    /// against this so it never reports trailing nulls past the chain tip (spec.md §4.10).
    async fn best_block_number(&self) -> eyre::Result<BlockNumber>;
}

/// Runs a blocking closure off whatever task is awaiting its result.
///
/// Out of scope to implement (spec.md §1 treats the host's scheduling primitives as ambient).
/// The body-query handlers are the only callers: a block-range scan is the one operation in
/// this crate whose cost scales with caller-supplied input rather than chain depth.
pub trait TaskSpawner: Send + Sync + 'static {
    /// Spawns `fut` on a blocking-friendly executor, detached from the caller.
    fn spawn_blocking(&self, fut: Pin<Box<dyn Future<Output = ()> + Send>>);
}
