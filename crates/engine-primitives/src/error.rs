use alloy_primitives::B256;
use std::error::Error as StdError;

/// Failure to turn an [`crate::block::ExecutionBlock`] out of a wire payload, or to validate it
/// against the rules that hold regardless of sync state.
///
/// This resolves the "error-string sniffing" Open Question from spec.md §9: instead of grepping
/// a decode exception's message for `"Invalid blockHash"`, the decoder (out of scope, injected
/// through `BlockDecoder`) returns one of these variants directly, and callers match on it.
#[derive(Debug, thiserror::Error)]
pub enum NewPayloadError {
    /// The block's intrinsic hash does not match the hash claimed by the payload.
    #[error("block hash mismatch: execution {execution}, consensus {consensus}")]
    BlockHashMismatch {
        /// Hash computed from the decoded block.
        execution: B256,
        /// Hash claimed in the payload.
        consensus: B256,
    },
    /// The payload's `versionedHashes` array does not match the blob transactions' versioned
    /// hashes, in length or in content.
    #[error("expected blob versioned hashes: expected={expected} received={received}")]
    InvalidVersionedHashes {
        /// Number of versioned hashes found across the block's blob transactions.
        expected: usize,
        /// Number of versioned hashes supplied in the request.
        received: usize,
    },
    /// `versionedHashes` was supplied for a block before the blob-carrying fork activated.
    #[error("versioned hashes provided for a pre-Cancun block")]
    UnexpectedVersionedHashes,
    /// The raw payload failed to decode into a block at all (malformed RLP, bad transaction
    /// envelope, withdrawals root mismatch, ...).
    #[error("failed to decode payload: {0}")]
    Decode(String),
    /// Transaction sender recovery failed.
    #[error("failed to recover transaction senders")]
    SenderRecovery,
    /// Anything else the decoder/validator collaborator chooses to surface.
    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl NewPayloadError {
    /// Whether this is the "blockHash validation failed" case, which per the engine API spec
    /// always reports `latestValidHash: null` rather than walking the chain for a parent.
    pub fn is_block_hash_mismatch(&self) -> bool {
        matches!(self, Self::BlockHashMismatch { .. })
    }

    /// Whether this is a blob-versioned-hashes mismatch, which also reports
    /// `latestValidHash: null`.
    pub fn is_invalid_versioned_hashes(&self) -> bool {
        matches!(self, Self::InvalidVersionedHashes { .. } | Self::UnexpectedVersionedHashes)
    }
}

/// Failure validating a request's parameters or payload/attributes shape against the
/// version↔timestamp↔fork matrix (spec.md §4.9, §6).
#[derive(Debug, thiserror::Error)]
pub enum EngineObjectValidationError {
    /// Structural or matrix violation — maps to JSON-RPC `INVALID_PARAMS`.
    #[error("invalid params: {0}")]
    InvalidParams(#[from] Box<dyn StdError + Send + Sync>),
    /// A version was used before its fork is active — maps to JSON-RPC `UNSUPPORTED_FORK`.
    #[error("unsupported fork: {0}")]
    UnsupportedFork(String),
}

/// Failure resolving a forkchoice update (spec.md §4.7).
#[derive(Debug, thiserror::Error)]
pub enum ForkchoiceError {
    /// Sanity check failed: `finalized != 0` but `safe == 0`.
    #[error("invalid forkchoice state: safe block not available")]
    SafeNotAvailable,
    /// Sanity check failed: the finalized block could not be resolved.
    #[error("invalid forkchoice state: finalized block not available")]
    FinalizedNotAvailable,
    /// Ancestor walk could not bridge to the VM head within the configured depth.
    #[error("cannot yet extend canonical chain")]
    CannotExtendChain,
    /// The requested head (or an ancestor on the pre-merge side) is not a valid terminal block.
    #[error("invalid terminal block")]
    InvalidTerminalBlock,
    /// `execution.setHead` (canonicalization) failed.
    #[error("failed to set chain head: {0}")]
    SetHead(#[source] Box<dyn StdError + Send + Sync>),
    /// The payload-attributes timestamp did not strictly exceed the head's timestamp.
    #[error("invalid timestamp in payloadAttributes, got {got}, need at least {need}")]
    InvalidAttributesTimestamp {
        /// Timestamp supplied in the attributes.
        got: u64,
        /// Minimum acceptable timestamp (head timestamp + 1).
        need: u64,
    },
    /// Building the pending payload failed.
    #[error("failed to start payload build: {0}")]
    BuildFailed(#[source] Box<dyn StdError + Send + Sync>),
}

/// Failure retrieving a previously started payload build (spec.md §4.8).
#[derive(Debug, thiserror::Error)]
pub enum GetPayloadError {
    /// No build is known under the requested id. Maps to the dedicated JSON-RPC
    /// `UnknownPayload (-32001)` code, never folded into a generic internal error.
    #[error("unknown payload")]
    UnknownPayload,
    /// Re-executing the built block under `runWithoutSetHead` failed.
    #[error("failed to execute built payload: {0}")]
    ExecutionFailed(#[source] Box<dyn StdError + Send + Sync>),
}
