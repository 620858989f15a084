//! Forkchoice Resolver (spec.md §4.7): resolves head/safe/finalized, canonicalizes the chain,
//! and optionally kicks off a payload build.
//!
//! Grounded on the `handle_forkchoice`/`validate_attributes_v*` flow from ethrex's
//! `engine/fork_choice.rs`: a sequence of named, early-returning checks rather than one deep
//! conditional, and attribute/timestamp validation split from head resolution.

use crate::{ancestor, terminal, tree::EngineTree};
use alloy_primitives::BlockHash;
use alloy_rpc_types_engine::{
    ForkchoiceState, ForkchoiceUpdated, PayloadAttributes, PayloadStatus, PayloadStatusEnum,
};
use engine_primitives::{ExecutionBlock, ForkchoiceError};
use tracing::info;

impl<B: ExecutionBlock + Clone> EngineTree<B> {
    /// Handles an incoming `forkchoiceUpdated*` request.
    ///
    /// Version-matrix legality of `attributes` (is this shape even allowed for the active fork)
    /// is checked by the caller before this is reached.
    pub async fn on_forkchoice_updated(
        &mut self,
        state: ForkchoiceState,
        attributes: Option<PayloadAttributes>,
    ) -> Result<ForkchoiceUpdated, ForkchoiceError> {
        // Step 1: sanity.
        if !state.finalized_block_hash.is_zero() && state.safe_block_hash.is_zero() {
            return Err(ForkchoiceError::SafeNotAvailable);
        }

        // Step 2: beacon-sync activation.
        if !self.sync.is_backfill_active() {
            self.sync.download_full_block(state.head_block_hash).await;
        }

        // Step 3: head resolution.
        let Some(head) = self.find_block(state.head_block_hash).await else {
            return Ok(ForkchoiceUpdated::new(PayloadStatus {
                status: PayloadStatusEnum::Syncing,
                latest_valid_hash: None,
            }));
        };

        // Step 4: hardfork-change log.
        let hardfork = self.spec.hardfork_at_timestamp(head.timestamp());
        if self.last_seen_hardforks.forkchoice_updated != Some(hardfork) {
            info!(target: "engine::tree", %hardfork, "hardfork change observed on forkchoiceUpdated");
            self.last_seen_hardforks.forkchoice_updated = Some(hardfork);
        }

        // Step 6: pre-merge terminal gate. (Step 5's `beaconSync.setHead` bookkeeping is the
        // beacon skeleton's own concern, folded into the sync handle above.)
        if terminal::is_pre_merge(&head) && !self.is_terminal_block(&head).await {
            return Err(ForkchoiceError::InvalidTerminalBlock);
        }

        // Step 7: head executedness.
        if !self.is_executed_or_canonical(head.hash()).await {
            return Ok(ForkchoiceUpdated::new(PayloadStatus {
                status: PayloadStatusEnum::Syncing,
                latest_valid_hash: None,
            }));
        }

        // Step 8: resolve safe/finalized.
        let safe = if state.safe_block_hash.is_zero() {
            None
        } else if state.safe_block_hash == head.hash() {
            Some(head.clone())
        } else {
            Some(self.find_block(state.safe_block_hash).await.ok_or(ForkchoiceError::SafeNotAvailable)?)
        };

        let finalized = if state.finalized_block_hash.is_zero() {
            None
        } else {
            Some(
                self.find_block(state.finalized_block_hash)
                    .await
                    .ok_or(ForkchoiceError::FinalizedNotAvailable)?,
            )
        };

        // Step 9: canonicalization.
        if self.vm_head != head.hash() {
            let ancestors = ancestor::walk_ancestors(
                self.vm_head,
                head.parent_hash(),
                self.max_ancestor_depth,
                |hash| {
                    self.state
                        .block_by_hash(hash)
                        .map(|executed| executed.block.clone())
                        .or_else(|| self.remote.block_by_hash(hash).cloned())
                },
            )?;

            let mut chain: Vec<BlockHash> = ancestors.iter().map(|b| b.hash()).collect();
            chain.push(head.hash());

            self.executor
                .canonicalize(&chain, safe.as_ref().map(|b| b.hash()), finalized.as_ref().map(|b| b.hash()))
                .await
                .map_err(|err| ForkchoiceError::SetHead(err.into()))?;

            for hash in &chain {
                self.mempool.remove_mined(*hash);
            }

            self.vm_head = head.hash();
            self.metrics.forkchoice_set_head.increment(1);
        }

        // Step 10: build gate.
        let payload_id = match attributes {
            Some(attrs) => {
                if attrs.timestamp <= head.timestamp() {
                    return Err(ForkchoiceError::InvalidAttributesTimestamp {
                        got: attrs.timestamp,
                        need: head.timestamp() + 1,
                    });
                }
                let id = self
                    .pending_builds
                    .start_build(head.hash(), attrs)
                    .await
                    .map_err(|err| ForkchoiceError::BuildFailed(err.into()))?;
                self.metrics.payload_builds_started.increment(1);
                Some(id)
            }
            None => None,
        };

        // Step 11: prune caches, best-effort.
        if let Some(finalized) = &finalized {
            self.state.prune_before(finalized.number());
            self.remote.prune_before(finalized.number());
            self.metrics.cache_prunes.increment(1);
        }

        self.forkchoice.set_latest(state);

        let mut updated = ForkchoiceUpdated::new(PayloadStatus {
            status: PayloadStatusEnum::Valid,
            latest_valid_hash: Some(head.hash()),
        });
        updated.payload_id = payload_id;
        Ok(updated)
    }
}
