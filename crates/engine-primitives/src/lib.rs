//! Wire types, collaborator traits and structured errors shared by `engine-tree` and
//! `rpc-engine-api`.
//!
//! This crate has no notion of networking, storage, or the VM: it only describes the shapes
//! that cross those seams, so the state machine and the RPC surface can both depend on it
//! without depending on each other's internals.

pub mod block;
pub mod error;
pub mod hardfork;
pub mod payload;
pub mod traits;

pub use block::{ExecutionBlock, ExecutionOutcome};
pub use error::{EngineObjectValidationError, ForkchoiceError, GetPayloadError, NewPayloadError};
pub use hardfork::{EngineChainSpec, Hardfork};
pub use payload::{
    BlobsBundleV1, BuiltPayload, CancunPayloadFields, EngineApiMessageVersion, ExecutionData,
    ExecutionPayload, ExecutionPayloadSidecar, PayloadAttributes, PayloadId,
    PayloadOrAttributesRef, PraguePayloadFields,
};
pub use traits::{
    BeaconSyncHandle, BlockDecoder, ChainProvider, ExecutionEngine, MempoolHandle,
    PayloadBodyProvider, PayloadEncoder, PendingBuildService, TaskSpawner,
};

pub use alloy_rpc_types_engine::ExecutionPayloadBodyV1;
