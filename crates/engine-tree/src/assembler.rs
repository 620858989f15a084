//! Block Assembler (spec.md §4.3): turns a wire payload into a decoded, hash-checked block.

use alloy_rpc_types_engine::{PayloadStatus, PayloadStatusEnum};
use engine_primitives::{BlockDecoder, ChainProvider, ExecutionBlock, ExecutionData};
use tracing::debug;

/// Result of assembling a wire payload into a decoded block.
pub enum Assembled<B> {
    /// Decoding and hash validation succeeded.
    Block(B),
    /// Decoding or hash validation failed; the caller returns this status directly.
    Rejected(PayloadStatus),
}

/// Decodes `data` via `decoder`, mapping failures onto the `PayloadStatus` the engine API
/// replies with, per spec.md §4.3: a block-hash mismatch reports `INVALID_BLOCK_HASH`, any
/// other decode failure reports plain `INVALID`, and `latestValidHash` is the claimed parent
/// hash if `chain` already knows it, else `null`.
pub async fn assemble<B, D, P>(data: &ExecutionData, decoder: &D, chain: &P) -> Assembled<B>
where
    B: ExecutionBlock,
    D: BlockDecoder<B>,
    P: ChainProvider<B>,
{
    match decoder.decode_and_validate(data) {
        Ok(block) => Assembled::Block(block),
        Err(err) => {
            debug!(target: "engine::tree", %err, "payload failed to assemble");
            let status =
                if err.is_block_hash_mismatch() { PayloadStatusEnum::InvalidBlockHash } else {
                    PayloadStatusEnum::Invalid { validation_error: err.to_string() }
                };
            let parent_hash = data.parent_hash();
            let latest_valid_hash = match chain.block_by_hash(parent_hash).await {
                Ok(Some(_)) => Some(parent_hash),
                _ => None,
            };
            Assembled::Rejected(PayloadStatus { status, latest_valid_hash })
        }
    }
}
