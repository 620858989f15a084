//! Metrics tapped on every reply leaving this surface (spec.md §2: "every response is tapped by
//! a telemetry/connection-manager collaborator"). Distinct from `engine_tree::metrics`, which
//! times what the state machine does internally; these time the request as the caller sees it.

use alloy_rpc_types_engine::PayloadStatusEnum;
use metrics::{Counter, Histogram};
use metrics_derive::Metrics;

/// One histogram per method plus one counter per `PayloadStatusV1.status` value actually
/// returned, so an operator can tell "slow" apart from "mostly syncing".
#[derive(Metrics)]
#[metrics(scope = "engine_rpc")]
pub struct EngineApiMetrics {
    /// Latency of `engine_newPayloadV1`.
    #[metric(describe = "Duration of engine_newPayloadV1 calls")]
    pub new_payload_v1: Histogram,
    /// Latency of `engine_newPayloadV2`.
    #[metric(describe = "Duration of engine_newPayloadV2 calls")]
    pub new_payload_v2: Histogram,
    /// Latency of `engine_newPayloadV3`.
    #[metric(describe = "Duration of engine_newPayloadV3 calls")]
    pub new_payload_v3: Histogram,
    /// Latency of `engine_forkchoiceUpdatedV1`.
    #[metric(describe = "Duration of engine_forkchoiceUpdatedV1 calls")]
    pub forkchoice_updated_v1: Histogram,
    /// Latency of `engine_forkchoiceUpdatedV2`.
    #[metric(describe = "Duration of engine_forkchoiceUpdatedV2 calls")]
    pub forkchoice_updated_v2: Histogram,
    /// Latency of `engine_forkchoiceUpdatedV3`.
    #[metric(describe = "Duration of engine_forkchoiceUpdatedV3 calls")]
    pub forkchoice_updated_v3: Histogram,
    /// Latency of `engine_getPayloadV1`.
    #[metric(describe = "Duration of engine_getPayloadV1 calls")]
    pub get_payload_v1: Histogram,
    /// Latency of `engine_getPayloadV2`.
    #[metric(describe = "Duration of engine_getPayloadV2 calls")]
    pub get_payload_v2: Histogram,
    /// Latency of `engine_getPayloadV3`.
    #[metric(describe = "Duration of engine_getPayloadV3 calls")]
    pub get_payload_v3: Histogram,
    /// Latency of `engine_getPayloadBodiesByHashV1`.
    #[metric(describe = "Duration of engine_getPayloadBodiesByHashV1 calls")]
    pub get_payload_bodies_by_hash_v1: Histogram,
    /// Latency of `engine_getPayloadBodiesByRangeV1`.
    #[metric(describe = "Duration of engine_getPayloadBodiesByRangeV1 calls")]
    pub get_payload_bodies_by_range_v1: Histogram,
    /// Total `newPayload*` responses reporting `VALID`.
    #[metric(describe = "Total newPayload responses with status VALID")]
    pub status_valid: Counter,
    /// Total `newPayload*` responses reporting `INVALID` or `INVALID_BLOCK_HASH`.
    #[metric(describe = "Total newPayload responses with status INVALID or INVALID_BLOCK_HASH")]
    pub status_invalid: Counter,
    /// Total `newPayload*` responses reporting `SYNCING`.
    #[metric(describe = "Total newPayload responses with status SYNCING")]
    pub status_syncing: Counter,
    /// Total `newPayload*` responses reporting `ACCEPTED`.
    #[metric(describe = "Total newPayload responses with status ACCEPTED")]
    pub status_accepted: Counter,
}

impl EngineApiMetrics {
    /// Records which protocol status a `newPayload*`/`forkchoiceUpdated*` reply carried.
    pub fn record_status(&self, status: &PayloadStatusEnum) {
        match status {
            PayloadStatusEnum::Valid => self.status_valid.increment(1),
            PayloadStatusEnum::Invalid { .. } | PayloadStatusEnum::InvalidBlockHash => {
                self.status_invalid.increment(1)
            }
            PayloadStatusEnum::Syncing => self.status_syncing.increment(1),
            PayloadStatusEnum::Accepted => self.status_accepted.increment(1),
        }
    }
}
