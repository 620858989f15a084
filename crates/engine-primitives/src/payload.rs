use crate::block::ExecutionOutcome;
use alloy_primitives::{B256, U256};
pub use alloy_rpc_types_engine::{
    BlobsBundleV1, CancunPayloadFields, ExecutionPayload, ExecutionPayloadSidecar,
    PayloadAttributes, PayloadId, PraguePayloadFields,
};

/// The payload and its version-specific side channel (blob versioned hashes, parent beacon
/// block root, execution requests), bundled the way a `newPayload*` call receives them.
///
/// Named `ExecutionData` after the teacher's own `alloy_rpc_types_engine::ExecutionData` /
/// `reth-engine-primitives` convention: the wire payload is versioned, the side channel is not
/// part of the payload's own RLP-hashed shape.
#[derive(Debug, Clone)]
pub struct ExecutionData {
    /// The versioned execution payload.
    pub payload: ExecutionPayload,
    /// Version-specific fields carried alongside the payload.
    pub sidecar: ExecutionPayloadSidecar,
}

impl ExecutionData {
    /// Returns the payload's claimed block hash.
    pub fn block_hash(&self) -> B256 {
        match &self.payload {
            ExecutionPayload::V1(p) => p.block_hash,
            ExecutionPayload::V2(p) => p.payload_inner.block_hash,
            ExecutionPayload::V3(p) => p.payload_inner.payload_inner.block_hash,
        }
    }

    /// Returns the payload's claimed parent hash.
    pub fn parent_hash(&self) -> B256 {
        match &self.payload {
            ExecutionPayload::V1(p) => p.parent_hash,
            ExecutionPayload::V2(p) => p.payload_inner.parent_hash,
            ExecutionPayload::V3(p) => p.payload_inner.payload_inner.parent_hash,
        }
    }

    /// Returns the payload's timestamp.
    pub fn timestamp(&self) -> u64 {
        match &self.payload {
            ExecutionPayload::V1(p) => p.timestamp,
            ExecutionPayload::V2(p) => p.payload_inner.timestamp,
            ExecutionPayload::V3(p) => p.payload_inner.payload_inner.timestamp,
        }
    }

    /// Returns whether the wire payload carries a `withdrawals` field (i.e. is V2 or V3 shaped).
    pub fn has_withdrawals_field(&self) -> bool {
        !matches!(self.payload, ExecutionPayload::V1(_))
    }

    /// Returns whether the wire payload carries `excessBlobGas`/`blobGasUsed` (V3 shaped).
    pub fn has_v3_fields(&self) -> bool {
        matches!(self.payload, ExecutionPayload::V3(_))
    }

    /// Returns the `versionedHashes` array supplied in the sidecar, if any.
    pub fn versioned_hashes(&self) -> Option<&[B256]> {
        match &self.sidecar {
            ExecutionPayloadSidecar::V3(fields) => Some(&fields.versioned_hashes),
            ExecutionPayloadSidecar::V4(fields, _) => Some(&fields.versioned_hashes),
            _ => None,
        }
    }

    /// Returns the `parentBeaconBlockRoot` supplied in the sidecar, if any.
    pub fn parent_beacon_block_root(&self) -> Option<B256> {
        match &self.sidecar {
            ExecutionPayloadSidecar::V3(fields) => Some(fields.parent_beacon_block_root),
            ExecutionPayloadSidecar::V4(fields, _) => Some(fields.parent_beacon_block_root),
            _ => None,
        }
    }
}

/// The result of a payload build, as the Pending Build Bridge (spec.md §4.8) retrieves it: the
/// block itself, its execution outcome, the fee value the builder claims it earns, and the
/// blob sidecar bundle for any blob transactions it included.
#[derive(Debug, Clone)]
pub struct BuiltPayload<B> {
    /// The built block.
    pub block: B,
    /// The execution outcome of running `block`.
    pub outcome: ExecutionOutcome,
    /// Total fees the block is expected to earn its builder.
    pub value: U256,
    /// Blob sidecars for the block's blob transactions, if any (Cancun+ only).
    pub blobs_bundle: Option<BlobsBundleV1>,
}

/// Which versioned engine API method is being served. Threads through the version dispatcher
/// (spec.md §4.9) so a single validation routine can apply the right row of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineApiMessageVersion {
    /// `engine_newPayloadV1` / `engine_forkchoiceUpdatedV1` / `engine_getPayloadV1`.
    V1,
    /// `engine_newPayloadV2` / `engine_forkchoiceUpdatedV2` / `engine_getPayloadV2`.
    V2,
    /// `engine_newPayloadV3` / `engine_forkchoiceUpdatedV3` / `engine_getPayloadV3`.
    V3,
}

/// Either side of a version-matrix check: an incoming payload, or forkchoice-update payload
/// attributes. The dispatcher validates both through the same entry point.
#[derive(Debug, Clone, Copy)]
pub enum PayloadOrAttributesRef<'a> {
    /// A `newPayload*` request.
    ExecutionPayload(&'a ExecutionData),
    /// A `forkchoiceUpdated*` request's build directive.
    PayloadAttributes(&'a PayloadAttributes),
}

impl<'a> PayloadOrAttributesRef<'a> {
    /// The timestamp to validate against fork-activation times.
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::ExecutionPayload(data) => data.timestamp(),
            Self::PayloadAttributes(attrs) => attrs.timestamp,
        }
    }

    /// Whether a `withdrawals` field/array is present.
    pub fn withdrawals_present(&self) -> bool {
        match self {
            Self::ExecutionPayload(data) => data.has_withdrawals_field(),
            Self::PayloadAttributes(attrs) => attrs.withdrawals.is_some(),
        }
    }

    /// Whether `excessBlobGas`/`blobGasUsed` fields are present (payload side only).
    pub fn has_v3_fields(&self) -> bool {
        match self {
            Self::ExecutionPayload(data) => data.has_v3_fields(),
            Self::PayloadAttributes(_) => false,
        }
    }

    /// Whether `parentBeaconBlockRoot` is present.
    pub fn parent_beacon_block_root_present(&self) -> bool {
        match self {
            Self::ExecutionPayload(data) => data.parent_beacon_block_root().is_some(),
            Self::PayloadAttributes(attrs) => attrs.parent_beacon_block_root.is_some(),
        }
    }
}
