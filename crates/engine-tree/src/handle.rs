//! Single-writer access to an [`EngineTree`] (spec.md §5's concurrency model).
//!
//! Grounded on reth's `BeaconConsensusEngineHandle`: the tree itself is never shared behind a
//! lock. Instead one task owns it exclusively and receives requests over an unbounded
//! `tokio::sync::mpsc` channel carrying a `oneshot` reply sender; every other task — in
//! particular `rpc-engine-api`'s handlers — only ever holds a clone of the channel's sending
//! half. This gives the ordering guarantees spec.md §5 requires (a `newPayload` observes its
//! own prior executed-cache insert, a `forkchoiceUpdated` observes its own prior `setHead`)
//! without any explicit mutex around the cache-and-VM-head invariants.

use crate::tree::EngineTree;
use alloy_rpc_types_engine::{
    ForkchoiceState, ForkchoiceUpdated, PayloadAttributes, PayloadId, PayloadStatus,
};
use engine_primitives::{BuiltPayload, ExecutionBlock, ExecutionData, ForkchoiceError, GetPayloadError};
use tokio::sync::{mpsc, oneshot};

/// The single task that owns the [`EngineTree`] has stopped — normally because it panicked, or
/// because every [`EngineHandle`] pointing at it was already dropped before the node exited
/// cleanly. Distinct from any protocol-level error the tree itself can report.
#[derive(Debug, thiserror::Error)]
#[error("engine task is no longer running")]
pub struct EngineGone;

/// A single request routed to the task that owns the [`EngineTree`], paired with the `oneshot`
/// channel its answer is delivered on.
pub enum EngineMessage<B: ExecutionBlock> {
    /// An `engine_newPayload*` request.
    NewPayload { data: ExecutionData, reply: oneshot::Sender<PayloadStatus> },
    /// An `engine_forkchoiceUpdated*` request.
    ForkchoiceUpdated {
        state: ForkchoiceState,
        attributes: Option<PayloadAttributes>,
        reply: oneshot::Sender<Result<ForkchoiceUpdated, ForkchoiceError>>,
    },
    /// An `engine_getPayload*` request.
    GetPayload { id: PayloadId, reply: oneshot::Sender<Result<BuiltPayload<B>, GetPayloadError>> },
}

/// Clone-able handle to a running [`EngineTree`]. Cheap to clone (one `Arc`-backed channel
/// sender); every clone reaches the same tree instance.
pub struct EngineHandle<B: ExecutionBlock> {
    to_engine: mpsc::UnboundedSender<EngineMessage<B>>,
}

impl<B: ExecutionBlock> Clone for EngineHandle<B> {
    fn clone(&self) -> Self {
        Self { to_engine: self.to_engine.clone() }
    }
}

impl<B: ExecutionBlock> EngineHandle<B> {
    /// Submits a `newPayload` request and awaits its `PayloadStatus`.
    pub async fn new_payload(&self, data: ExecutionData) -> Result<PayloadStatus, EngineGone> {
        let (reply, recv) = oneshot::channel();
        self.to_engine
            .send(EngineMessage::NewPayload { data, reply })
            .map_err(|_| EngineGone)?;
        recv.await.map_err(|_| EngineGone)
    }

    /// Submits a `forkchoiceUpdated` request and awaits its result.
    pub async fn forkchoice_updated(
        &self,
        state: ForkchoiceState,
        attributes: Option<PayloadAttributes>,
    ) -> Result<Result<ForkchoiceUpdated, ForkchoiceError>, EngineGone> {
        let (reply, recv) = oneshot::channel();
        self.to_engine
            .send(EngineMessage::ForkchoiceUpdated { state, attributes, reply })
            .map_err(|_| EngineGone)?;
        recv.await.map_err(|_| EngineGone)
    }

    /// Submits a `getPayload` request and awaits its result.
    pub async fn get_payload(
        &self,
        id: PayloadId,
    ) -> Result<Result<BuiltPayload<B>, GetPayloadError>, EngineGone> {
        let (reply, recv) = oneshot::channel();
        self.to_engine.send(EngineMessage::GetPayload { id, reply }).map_err(|_| EngineGone)?;
        recv.await.map_err(|_| EngineGone)
    }
}

/// Spawns the task that owns `tree` exclusively and returns a handle to it.
///
/// The returned task runs until every [`EngineHandle`] clone is dropped, at which point the
/// channel closes and the loop exits.
pub fn spawn_engine<B>(tree: EngineTree<B>) -> EngineHandle<B>
where
    B: ExecutionBlock + Clone,
{
    let (to_engine, from_handles) = mpsc::unbounded_channel();
    tokio::spawn(run(tree, from_handles));
    EngineHandle { to_engine }
}

async fn run<B>(mut tree: EngineTree<B>, mut requests: mpsc::UnboundedReceiver<EngineMessage<B>>)
where
    B: ExecutionBlock + Clone,
{
    while let Some(message) = requests.recv().await {
        match message {
            EngineMessage::NewPayload { data, reply } => {
                let status = tree.on_new_payload(data).await;
                let _ = reply.send(status);
            }
            EngineMessage::ForkchoiceUpdated { state, attributes, reply } => {
                let result = tree.on_forkchoice_updated(state, attributes).await;
                let _ = reply.send(result);
            }
            EngineMessage::GetPayload { id, reply } => {
                let result = tree.get_payload(id).await;
                let _ = reply.send(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::EngineTreeCollaborators;
    use alloy_primitives::{BlockHash, BlockNumber, B256, U256};
    use async_trait::async_trait;
    use engine_primitives::{
        BeaconSyncHandle, BlockDecoder, ChainProvider, EngineChainSpec, ExecutionEngine,
        ExecutionOutcome, Hardfork, MempoolHandle, NewPayloadError, PendingBuildService,
    };
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestBlock {
        hash: BlockHash,
        parent_hash: BlockHash,
    }

    impl ExecutionBlock for TestBlock {
        fn hash(&self) -> BlockHash {
            self.hash
        }
        fn number(&self) -> BlockNumber {
            1
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

    struct NoopChain;
    #[async_trait]
    impl ChainProvider<TestBlock> for NoopChain {
        async fn block_by_hash(&self, _hash: BlockHash) -> eyre::Result<Option<TestBlock>> {
            Ok(None)
        }
        async fn block_by_number(&self, _number: BlockNumber) -> eyre::Result<Option<TestBlock>> {
            Ok(None)
        }
        async fn canonical_head_hash(&self) -> eyre::Result<BlockHash> {
            Ok(BlockHash::ZERO)
        }
        async fn total_difficulty(&self, _hash: BlockHash) -> eyre::Result<Option<U256>> {
            Ok(None)
        }
    }

    struct NoopDecoder;
    impl BlockDecoder<TestBlock> for NoopDecoder {
        fn decode_and_validate(&self, _data: &ExecutionData) -> Result<TestBlock, NewPayloadError> {
            unimplemented!()
        }
    }

    struct NoopExecutor;
    #[async_trait]
    impl ExecutionEngine<TestBlock> for NoopExecutor {
        async fn execute_block(&self, _block: &TestBlock) -> Result<ExecutionOutcome, NewPayloadError> {
            Ok(ExecutionOutcome { state_root: B256::ZERO })
        }
        async fn canonicalize(
            &self,
            _blocks: &[BlockHash],
            _safe: Option<BlockHash>,
            _finalized: Option<BlockHash>,
        ) -> eyre::Result<()> {
            Ok(())
        }
        async fn delete_block(&self, _block_hash: BlockHash) -> eyre::Result<()> {
            Ok(())
        }
    }

    struct NoBackfill;
    #[async_trait]
    impl BeaconSyncHandle for NoBackfill {
        fn is_backfill_active(&self) -> bool {
            true
        }
        async fn download_full_block(&self, _target_hash: BlockHash) {}
    }

    struct NoopMempool;
    impl MempoolHandle for NoopMempool {
        fn remove_mined(&self, _block_hash: BlockHash) {}
    }

    struct NoBuilds;
    #[async_trait]
    impl PendingBuildService<TestBlock> for NoBuilds {
        async fn start_build(
            &self,
            _parent: BlockHash,
            _attributes: PayloadAttributes,
        ) -> eyre::Result<PayloadId> {
            unimplemented!()
        }
        async fn best_payload(&self, _id: PayloadId) -> eyre::Result<Option<BuiltPayload<TestBlock>>> {
            Ok(None)
        }
    }

    struct StaticSpec;
    impl EngineChainSpec for StaticSpec {
        fn hardfork_at_timestamp(&self, _timestamp: u64) -> Hardfork {
            Hardfork::Paris
        }
        fn terminal_total_difficulty(&self) -> Option<U256> {
            None
        }
    }

    fn spawn() -> EngineHandle<TestBlock> {
        let tree = EngineTree::new(
            EngineTreeCollaborators {
                spec: Arc::new(StaticSpec),
                provider: Arc::new(NoopChain),
                executor: Arc::new(NoopExecutor),
                decoder: Arc::new(NoopDecoder),
                sync: Arc::new(NoBackfill),
                mempool: Arc::new(NoopMempool),
                pending_builds: Arc::new(NoBuilds),
            },
            BlockHash::ZERO,
        );
        spawn_engine(tree)
    }

    #[tokio::test]
    async fn get_payload_round_trips_through_the_channel() {
        let handle = spawn();
        let result = handle.get_payload(PayloadId::new([0u8; 8])).await.unwrap();
        assert!(matches!(result, Err(GetPayloadError::UnknownPayload)));
    }

    #[tokio::test]
    async fn cloned_handles_reach_the_same_task() {
        let handle = spawn();
        let other = handle.clone();
        let (a, b) = tokio::join!(
            handle.get_payload(PayloadId::new([1u8; 8])),
            other.get_payload(PayloadId::new([2u8; 8])),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn dropped_engine_task_reports_gone() {
        let (to_engine, from_handles) = mpsc::unbounded_channel::<EngineMessage<TestBlock>>();
        drop(from_handles);
        let handle = EngineHandle { to_engine };
        let err = handle.get_payload(PayloadId::new([0u8; 8])).await.unwrap_err();
        assert!(matches!(err, EngineGone));
    }
}
