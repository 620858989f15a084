//! Maps the structured errors `engine-primitives` and `engine-tree` produce onto the five
//! JSON-RPC error codes spec.md §6/§7 defines. No substring matching anywhere in this module —
//! every mapping is an exhaustive match over a concrete enum variant.

use engine_primitives::{EngineObjectValidationError, ForkchoiceError, GetPayloadError};
use engine_tree::handle::EngineGone;
use jsonrpsee_types::ErrorObject;

/// `INVALID_PARAMS`, reused by the teacher's own engine API crate under the same name.
pub const INVALID_PARAMS_CODE: i32 = -32602;
/// `INTERNAL_ERROR`.
pub const INTERNAL_ERROR_CODE: i32 = -32603;
/// `TOO_LARGE_REQUEST`, used only by the body-query cap (spec.md §4.10).
pub const TOO_LARGE_REQUEST_CODE: i32 = -38004;
/// `UNSUPPORTED_FORK`, used only by the Cancun-crossing row of the version matrix (spec.md §6).
pub const UNSUPPORTED_FORK_CODE: i32 = -38005;
/// `UnknownPayload`, returned by `getPayload*` for an absent build id. Never remapped to
/// `INTERNAL_ERROR` regardless of cause (spec.md §7).
pub const UNKNOWN_PAYLOAD_CODE: i32 = -32001;

/// Every way a request to this surface can fail without producing a [`PayloadStatus`] body.
///
/// Protocol statuses (`VALID`/`INVALID`/`SYNCING`/`ACCEPTED`/`INVALID_BLOCK_HASH`) are never
/// represented here — per spec.md §7 those are always returned as a value, not a JSON-RPC error.
#[derive(Debug, thiserror::Error)]
pub enum EngineApiError {
    /// Structural or version-matrix violation.
    #[error(transparent)]
    InvalidParams(#[from] EngineObjectValidationError),
    /// `forkchoiceUpdated` rejected the request or attributes before reaching a status.
    #[error(transparent)]
    Forkchoice(#[from] ForkchoiceError),
    /// `getPayload*` could not retrieve the requested build.
    #[error(transparent)]
    GetPayload(#[from] GetPayloadError),
    /// The configured terminal total difficulty does not match the caller's.
    #[error("invalid params: terminal total difficulty mismatch")]
    TransitionConfigurationMismatch,
    /// More hashes were requested than `getPayloadBodiesByHashV1` permits in one call.
    #[error("too many hashes requested: {len} (max {max})")]
    TooManyHashes {
        /// Number of hashes the caller supplied.
        len: usize,
        /// The cap (spec.md §4.10).
        max: usize,
    },
    /// More blocks were requested than `getPayloadBodiesByRangeV1` permits in one call.
    #[error("too many blocks requested: {count} (max {max})")]
    TooManyBlocksRequested {
        /// `count` as supplied by the caller.
        count: u64,
        /// The cap (spec.md §4.10).
        max: u64,
    },
    /// `start` or `count` violated `start >= 1 && count >= 1` (spec.md §4.10).
    #[error("invalid range: start={start} count={count}")]
    InvalidBodyRange {
        /// `start` as supplied by the caller.
        start: u64,
        /// `count` as supplied by the caller.
        count: u64,
    },
    /// The task that owns the engine state machine is no longer running.
    #[error(transparent)]
    EngineGone(#[from] EngineGone),
    /// `exchangeTransitionConfigurationV1` was called but this node has no configured terminal
    /// total difficulty (spec.md §9's internal-error case).
    #[error("internal error: terminal total difficulty not configured")]
    TtdNotConfigured,
    /// A pending build's encoded payload didn't match the shape the caller's method version
    /// requires (e.g. a pre-Cancun build retrieved through `getPayloadV3`).
    #[error("built payload does not match the requested version")]
    PayloadVersionMismatch,
    /// Any other failure from an out-of-scope collaborator (storage, task spawner, ...).
    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Shorthand used throughout this crate's handlers.
pub type EngineApiResult<T> = Result<T, EngineApiError>;

impl EngineApiError {
    /// The JSON-RPC error code this failure is reported under.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidParams(EngineObjectValidationError::InvalidParams(_)) => {
                INVALID_PARAMS_CODE
            }
            Self::InvalidParams(EngineObjectValidationError::UnsupportedFork(_)) => {
                UNSUPPORTED_FORK_CODE
            }
            Self::Forkchoice(
                ForkchoiceError::SafeNotAvailable
                | ForkchoiceError::FinalizedNotAvailable
                | ForkchoiceError::CannotExtendChain
                | ForkchoiceError::InvalidTerminalBlock
                | ForkchoiceError::InvalidAttributesTimestamp { .. }
                | ForkchoiceError::SetHead(_),
            ) => INVALID_PARAMS_CODE,
            Self::Forkchoice(ForkchoiceError::BuildFailed(_)) => INTERNAL_ERROR_CODE,
            Self::GetPayload(GetPayloadError::UnknownPayload) => UNKNOWN_PAYLOAD_CODE,
            Self::GetPayload(GetPayloadError::ExecutionFailed(_)) => INTERNAL_ERROR_CODE,
            Self::TransitionConfigurationMismatch => INVALID_PARAMS_CODE,
            Self::TooManyHashes { .. } | Self::TooManyBlocksRequested { .. } => {
                TOO_LARGE_REQUEST_CODE
            }
            Self::InvalidBodyRange { .. } => INVALID_PARAMS_CODE,
            Self::EngineGone(_) => INTERNAL_ERROR_CODE,
            Self::TtdNotConfigured | Self::PayloadVersionMismatch => INTERNAL_ERROR_CODE,
            Self::Internal(_) => INTERNAL_ERROR_CODE,
        }
    }
}

impl From<EngineApiError> for ErrorObject<'static> {
    fn from(err: EngineApiError) -> Self {
        let code = err.code();
        ErrorObject::owned(code, err.to_string(), None::<()>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_payload_is_never_remapped() {
        let err = EngineApiError::from(GetPayloadError::UnknownPayload);
        assert_eq!(err.code(), UNKNOWN_PAYLOAD_CODE);
    }

    #[test]
    fn unsupported_fork_keeps_its_own_code() {
        let err = EngineApiError::from(EngineObjectValidationError::UnsupportedFork(
            "newPayloadV3 used before Cancun".to_string(),
        ));
        assert_eq!(err.code(), UNSUPPORTED_FORK_CODE);
    }

    #[test]
    fn body_query_caps_report_too_large_request() {
        let err = EngineApiError::TooManyHashes { len: 64, max: 32 };
        assert_eq!(err.code(), TOO_LARGE_REQUEST_CODE);
    }

    #[test]
    fn set_head_failure_is_invalid_params_not_internal() {
        let err = EngineApiError::from(ForkchoiceError::SetHead("disk full".into()));
        assert_eq!(err.code(), INVALID_PARAMS_CODE);
    }

    #[test]
    fn build_failed_is_still_internal() {
        let err = EngineApiError::from(ForkchoiceError::BuildFailed("no space".into()));
        assert_eq!(err.code(), INTERNAL_ERROR_CODE);
    }
}
