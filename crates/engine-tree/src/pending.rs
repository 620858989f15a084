//! Pending Build Bridge (spec.md §4.8): retrieves a payload build by id and re-executes it
//! before handing it back, so `getPayload` never returns a block the tree hasn't itself run.

use crate::{cache::ExecutedBlock, tree::EngineTree};
use engine_primitives::{BuiltPayload, ExecutionBlock, GetPayloadError};
use tracing::debug;

impl<B: ExecutionBlock + Clone> EngineTree<B> {
    /// Looks up the build started under `id`, re-executes its block (`runWithoutSetHead`'s
    /// "force execution even if the VM is busy" semantics are the pending-build service's own
    /// concern; this just drives the call and caches the result), and returns it.
    pub async fn get_payload(&mut self, id: alloy_rpc_types_engine::PayloadId) -> Result<BuiltPayload<B>, GetPayloadError> {
        let built = self
            .pending_builds
            .best_payload(id)
            .await
            .map_err(|err| GetPayloadError::ExecutionFailed(err.into()))?
            .ok_or(GetPayloadError::UnknownPayload)?;

        match self.executor.execute_block(&built.block).await {
            Ok(outcome) => {
                debug!(target: "engine::tree", hash = %built.block.hash(), "re-executed retrieved payload");
                self.state.insert_executed(ExecutedBlock { block: built.block.clone(), outcome });
            }
            Err(err) => return Err(GetPayloadError::ExecutionFailed(Box::new(err))),
        }

        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::EngineTreeCollaborators;
    use alloy_primitives::{BlockHash, BlockNumber, B256, U256};
    use async_trait::async_trait;
    use engine_primitives::{
        BeaconSyncHandle, BlockDecoder, ChainProvider, EngineChainSpec, ExecutionData,
        ExecutionEngine, ExecutionOutcome, Hardfork, MempoolHandle, NewPayloadError,
        PendingBuildService,
    };
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestBlock {
        hash: BlockHash,
    }

    impl ExecutionBlock for TestBlock {
        fn hash(&self) -> BlockHash {
            self.hash
        }
        fn number(&self) -> BlockNumber {
            1
        }
        fn parent_hash(&self) -> BlockHash {
            BlockHash::ZERO
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

    struct SucceedingExecutor;
    #[async_trait]
    impl ExecutionEngine<TestBlock> for SucceedingExecutor {
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
            false
        }
        async fn download_full_block(&self, _target_hash: BlockHash) {}
    }

    struct NoopMempool;
    impl MempoolHandle for NoopMempool {
        fn remove_mined(&self, _block_hash: BlockHash) {}
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

    struct KnownBuild(BlockHash);
    #[async_trait]
    impl PendingBuildService<TestBlock> for KnownBuild {
        async fn start_build(
            &self,
            _parent: BlockHash,
            _attributes: alloy_rpc_types_engine::PayloadAttributes,
        ) -> eyre::Result<alloy_rpc_types_engine::PayloadId> {
            unimplemented!()
        }
        async fn best_payload(
            &self,
            _id: alloy_rpc_types_engine::PayloadId,
        ) -> eyre::Result<Option<BuiltPayload<TestBlock>>> {
            Ok(Some(BuiltPayload {
                block: TestBlock { hash: self.0 },
                outcome: ExecutionOutcome { state_root: B256::ZERO },
                value: U256::ZERO,
                blobs_bundle: None,
            }))
        }
    }

    struct UnknownBuild;
    #[async_trait]
    impl PendingBuildService<TestBlock> for UnknownBuild {
        async fn start_build(
            &self,
            _parent: BlockHash,
            _attributes: alloy_rpc_types_engine::PayloadAttributes,
        ) -> eyre::Result<alloy_rpc_types_engine::PayloadId> {
            unimplemented!()
        }
        async fn best_payload(
            &self,
            _id: alloy_rpc_types_engine::PayloadId,
        ) -> eyre::Result<Option<BuiltPayload<TestBlock>>> {
            Ok(None)
        }
    }

    fn tree(pending_builds: Arc<dyn PendingBuildService<TestBlock>>) -> EngineTree<TestBlock> {
        EngineTree::new(
            EngineTreeCollaborators {
                spec: Arc::new(StaticSpec),
                provider: Arc::new(NoopChain),
                executor: Arc::new(SucceedingExecutor),
                decoder: Arc::new(NoopDecoder),
                sync: Arc::new(NoBackfill),
                mempool: Arc::new(NoopMempool),
                pending_builds,
            },
            BlockHash::ZERO,
        )
    }

    #[tokio::test]
    async fn known_build_is_returned_and_cached_as_executed() {
        let hash = BlockHash::repeat_byte(7);
        let mut engine = tree(Arc::new(KnownBuild(hash)));
        let id = alloy_rpc_types_engine::PayloadId::new([0u8; 8]);
        let built = engine.get_payload(id).await.unwrap();
        assert_eq!(built.block.hash(), hash);
        assert!(engine.is_executed_or_canonical(hash).await);
    }

    #[tokio::test]
    async fn unknown_build_reports_unknown_payload() {
        let mut engine = tree(Arc::new(UnknownBuild));
        let id = alloy_rpc_types_engine::PayloadId::new([0u8; 8]);
        let err = engine.get_payload(id).await.unwrap_err();
        assert!(matches!(err, GetPayloadError::UnknownPayload));
    }
}
