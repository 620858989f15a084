//! The public JSON-RPC surface (spec.md §6): `EngineApi<B>` implements [`EngineApiServer`],
//! wiring the Version Dispatcher (spec.md §4.9), the JSON-RPC error mapping (spec.md §7) and
//! request metrics around the single [`EngineHandle`] that owns the state machine.
//!
//! Grounded on the teacher's own `rpc-engine-api::EngineApi`/`EngineApiServer` split: a thin,
//! cheaply-cloneable facade in front of an `Arc`-shared inner struct, with one plain method per
//! RPC method and the `#[rpc]`-annotated trait implemented over it so the dispatch logic stays
//! testable without a jsonrpsee server in the loop. `getPayloadBodies*`/`exchangeCapabilities`
//! are grounded on this crate's own `bodies`/`capabilities` modules rather than on the engine
//! tree, since neither touches the state machine.

use crate::{
    bodies, capabilities,
    error::{EngineApiError, EngineApiResult},
    metrics::EngineApiMetrics,
    versioning::{validate_no_v3_fields_on_v2, validate_version_specific_fields},
};
use alloy_primitives::BlockHash;
use alloy_rpc_types_engine::{
    CancunPayloadFields, ExecutionPayloadBodyV1, ExecutionPayloadEnvelopeV2,
    ExecutionPayloadEnvelopeV3, ExecutionPayloadFieldV2, ExecutionPayloadInputV2,
    ExecutionPayloadSidecar, ExecutionPayloadV1, ExecutionPayloadV3, ForkchoiceState,
    ForkchoiceUpdated, PayloadAttributes, PayloadId, PayloadStatus, PayloadStatusEnum,
    TransitionConfigurationV1,
};
use engine_primitives::{
    BuiltPayload, EngineApiMessageVersion, EngineChainSpec, ExecutionBlock, ExecutionData,
    ExecutionPayload, PayloadBodyProvider, PayloadEncoder, PayloadOrAttributesRef, TaskSpawner,
};
use async_trait::async_trait;
use engine_tree::handle::EngineHandle;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee_core::RpcResult;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Lets a caller hand this surface's module to an `RpcModuleBuilder` without naming the concrete
/// server type, mirroring the teacher's own `IntoEngineApiRpcModule`.
pub trait IntoEngineApiRpcModule {
    /// Consumes `self` and returns the single [`jsonrpsee::RpcModule`] covering every method
    /// this surface serves.
    fn into_rpc_module(self) -> jsonrpsee::RpcModule<()>;
}

/// `engine_*` methods this node answers over JSON-RPC (spec.md §6).
///
/// Wire types are concrete alloy types rather than generic over the decoded block `B`: the
/// version matrix and the JSON-RPC envelope shapes it describes are fixed by the protocol, not
/// by whatever block representation a given node happens to use internally.
#[rpc(server, namespace = "engine")]
pub trait EngineApi {
    /// `engine_newPayloadV1`.
    #[method(name = "newPayloadV1")]
    async fn new_payload_v1(&self, payload: ExecutionPayloadV1) -> RpcResult<PayloadStatus>;

    /// `engine_newPayloadV2`.
    #[method(name = "newPayloadV2")]
    async fn new_payload_v2(&self, payload: ExecutionPayloadInputV2) -> RpcResult<PayloadStatus>;

    /// `engine_newPayloadV3`.
    #[method(name = "newPayloadV3")]
    async fn new_payload_v3(
        &self,
        payload: ExecutionPayloadV3,
        versioned_hashes: Vec<BlockHash>,
        parent_beacon_block_root: BlockHash,
    ) -> RpcResult<PayloadStatus>;

    /// `engine_forkchoiceUpdatedV1`.
    #[method(name = "forkchoiceUpdatedV1")]
    async fn fork_choice_updated_v1(
        &self,
        fork_choice_state: ForkchoiceState,
        payload_attributes: Option<PayloadAttributes>,
    ) -> RpcResult<ForkchoiceUpdated>;

    /// `engine_forkchoiceUpdatedV2`.
    #[method(name = "forkchoiceUpdatedV2")]
    async fn fork_choice_updated_v2(
        &self,
        fork_choice_state: ForkchoiceState,
        payload_attributes: Option<PayloadAttributes>,
    ) -> RpcResult<ForkchoiceUpdated>;

    /// `engine_forkchoiceUpdatedV3`.
    #[method(name = "forkchoiceUpdatedV3")]
    async fn fork_choice_updated_v3(
        &self,
        fork_choice_state: ForkchoiceState,
        payload_attributes: Option<PayloadAttributes>,
    ) -> RpcResult<ForkchoiceUpdated>;

    /// `engine_getPayloadV1`.
    #[method(name = "getPayloadV1")]
    async fn get_payload_v1(&self, payload_id: PayloadId) -> RpcResult<ExecutionPayloadV1>;

    /// `engine_getPayloadV2`.
    #[method(name = "getPayloadV2")]
    async fn get_payload_v2(&self, payload_id: PayloadId) -> RpcResult<ExecutionPayloadEnvelopeV2>;

    /// `engine_getPayloadV3`.
    #[method(name = "getPayloadV3")]
    async fn get_payload_v3(&self, payload_id: PayloadId) -> RpcResult<ExecutionPayloadEnvelopeV3>;

    /// `engine_getPayloadBodiesByHashV1`.
    #[method(name = "getPayloadBodiesByHashV1")]
    async fn get_payload_bodies_by_hash_v1(
        &self,
        block_hashes: Vec<BlockHash>,
    ) -> RpcResult<Vec<Option<ExecutionPayloadBodyV1>>>;

    /// `engine_getPayloadBodiesByRangeV1`.
    #[method(name = "getPayloadBodiesByRangeV1")]
    async fn get_payload_bodies_by_range_v1(
        &self,
        start: alloy_primitives::U64,
        count: alloy_primitives::U64,
    ) -> RpcResult<Vec<Option<ExecutionPayloadBodyV1>>>;

    /// `engine_exchangeTransitionConfigurationV1`.
    #[method(name = "exchangeTransitionConfigurationV1")]
    async fn exchange_transition_configuration_v1(
        &self,
        config: TransitionConfigurationV1,
    ) -> RpcResult<TransitionConfigurationV1>;

    /// `engine_exchangeCapabilities`.
    #[method(name = "exchangeCapabilities")]
    async fn exchange_capabilities(&self, capabilities: Vec<String>) -> RpcResult<Vec<String>>;
}

struct EngineApiInner<B: ExecutionBlock + Clone> {
    engine: EngineHandle<B>,
    chain_spec: Arc<dyn EngineChainSpec>,
    bodies: Arc<dyn PayloadBodyProvider>,
    encoder: Arc<dyn PayloadEncoder<B>>,
    task_spawner: Arc<dyn TaskSpawner>,
    metrics: EngineApiMetrics,
}

/// The engine API handler: one cheaply-cloneable facade in front of the single task that owns
/// the [`engine_tree::tree::EngineTree`] state machine.
pub struct EngineApi<B: ExecutionBlock + Clone> {
    inner: Arc<EngineApiInner<B>>,
}

impl<B: ExecutionBlock + Clone> Clone for EngineApi<B> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<B: ExecutionBlock + Clone> std::fmt::Debug for EngineApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineApi").finish_non_exhaustive()
    }
}

impl<B: ExecutionBlock + Clone + Send + Sync + 'static> EngineApi<B> {
    /// Builds a new handler around an already-running [`EngineHandle`] and its out-of-scope
    /// collaborators.
    pub fn new(
        engine: EngineHandle<B>,
        chain_spec: Arc<dyn EngineChainSpec>,
        bodies: Arc<dyn PayloadBodyProvider>,
        encoder: Arc<dyn PayloadEncoder<B>>,
        task_spawner: Arc<dyn TaskSpawner>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineApiInner {
                engine,
                chain_spec,
                bodies,
                encoder,
                task_spawner,
                metrics: EngineApiMetrics::default(),
            }),
        }
    }

    async fn dispatch_new_payload(
        &self,
        version: EngineApiMessageVersion,
        data: ExecutionData,
    ) -> EngineApiResult<PayloadStatus> {
        let payload_or_attrs = PayloadOrAttributesRef::ExecutionPayload(&data);
        validate_version_specific_fields(&*self.inner.chain_spec, version, payload_or_attrs)?;
        if version == EngineApiMessageVersion::V2 {
            validate_no_v3_fields_on_v2(payload_or_attrs)?;
        }

        let start = Instant::now();
        let mut status = self.inner.engine.new_payload(data).await?;
        record_new_payload_latency(&self.inner.metrics, version, start.elapsed());

        // spec.md §4.9: V2/V3 fold INVALID_BLOCK_HASH down to plain INVALID before replying; V1
        // preserves it.
        if version != EngineApiMessageVersion::V1 {
            status = fold_invalid_block_hash(status);
        }

        self.inner.metrics.record_status(&status.status);
        Ok(status)
    }

    async fn dispatch_forkchoice_updated(
        &self,
        version: EngineApiMessageVersion,
        state: ForkchoiceState,
        attributes: Option<PayloadAttributes>,
    ) -> EngineApiResult<ForkchoiceUpdated> {
        if let Some(attrs) = &attributes {
            validate_version_specific_fields(
                &*self.inner.chain_spec,
                version,
                PayloadOrAttributesRef::PayloadAttributes(attrs),
            )?;
        }

        let start = Instant::now();
        let updated = self.inner.engine.forkchoice_updated(state, attributes).await??;
        record_forkchoice_latency(&self.inner.metrics, version, start.elapsed());
        self.inner.metrics.record_status(&updated.payload_status.status);
        Ok(updated)
    }

    async fn dispatch_get_payload(&self, id: PayloadId) -> EngineApiResult<ExecutionPayload> {
        let built = self.inner.engine.get_payload(id).await??;
        Ok(self.inner.encoder.encode(&built.block))
    }

    async fn dispatch_get_payload_with_value(
        &self,
        id: PayloadId,
    ) -> EngineApiResult<(ExecutionPayload, BuiltPayload<B>)> {
        let built = self.inner.engine.get_payload(id).await??;
        let payload = self.inner.encoder.encode(&built.block);
        Ok((payload, built))
    }
}

#[async_trait]
impl<B: ExecutionBlock + Clone + Send + Sync + 'static> EngineApiServer for EngineApi<B> {
    async fn new_payload_v1(&self, payload: ExecutionPayloadV1) -> RpcResult<PayloadStatus> {
        trace!(target: "rpc::engine", "Serving engine_newPayloadV1");
        let data = ExecutionData {
            payload: ExecutionPayload::V1(payload),
            sidecar: ExecutionPayloadSidecar::none(),
        };
        Ok(self.dispatch_new_payload(EngineApiMessageVersion::V1, data).await?)
    }

    async fn new_payload_v2(&self, payload: ExecutionPayloadInputV2) -> RpcResult<PayloadStatus> {
        trace!(target: "rpc::engine", "Serving engine_newPayloadV2");
        let payload = payload.into_payload();
        let data = ExecutionData { payload, sidecar: ExecutionPayloadSidecar::none() };
        Ok(self.dispatch_new_payload(EngineApiMessageVersion::V2, data).await?)
    }

    async fn new_payload_v3(
        &self,
        payload: ExecutionPayloadV3,
        versioned_hashes: Vec<BlockHash>,
        parent_beacon_block_root: BlockHash,
    ) -> RpcResult<PayloadStatus> {
        trace!(target: "rpc::engine", "Serving engine_newPayloadV3");
        let data = ExecutionData {
            payload: ExecutionPayload::V3(payload),
            sidecar: ExecutionPayloadSidecar::v3(CancunPayloadFields {
                versioned_hashes,
                parent_beacon_block_root,
            }),
        };
        Ok(self.dispatch_new_payload(EngineApiMessageVersion::V3, data).await?)
    }

    async fn fork_choice_updated_v1(
        &self,
        fork_choice_state: ForkchoiceState,
        payload_attributes: Option<PayloadAttributes>,
    ) -> RpcResult<ForkchoiceUpdated> {
        trace!(target: "rpc::engine", "Serving engine_forkchoiceUpdatedV1");
        Ok(self
            .dispatch_forkchoice_updated(
                EngineApiMessageVersion::V1,
                fork_choice_state,
                payload_attributes,
            )
            .await?)
    }

    async fn fork_choice_updated_v2(
        &self,
        fork_choice_state: ForkchoiceState,
        payload_attributes: Option<PayloadAttributes>,
    ) -> RpcResult<ForkchoiceUpdated> {
        trace!(target: "rpc::engine", "Serving engine_forkchoiceUpdatedV2");
        Ok(self
            .dispatch_forkchoice_updated(
                EngineApiMessageVersion::V2,
                fork_choice_state,
                payload_attributes,
            )
            .await?)
    }

    async fn fork_choice_updated_v3(
        &self,
        fork_choice_state: ForkchoiceState,
        payload_attributes: Option<PayloadAttributes>,
    ) -> RpcResult<ForkchoiceUpdated> {
        trace!(target: "rpc::engine", "Serving engine_forkchoiceUpdatedV3");
        Ok(self
            .dispatch_forkchoice_updated(
                EngineApiMessageVersion::V3,
                fork_choice_state,
                payload_attributes,
            )
            .await?)
    }

    async fn get_payload_v1(&self, payload_id: PayloadId) -> RpcResult<ExecutionPayloadV1> {
        trace!(target: "rpc::engine", "Serving engine_getPayloadV1");
        let payload = self.dispatch_get_payload(payload_id).await?;
        Ok(into_v1(payload))
    }

    async fn get_payload_v2(&self, payload_id: PayloadId) -> RpcResult<ExecutionPayloadEnvelopeV2> {
        trace!(target: "rpc::engine", "Serving engine_getPayloadV2");
        let (payload, built) = self.dispatch_get_payload_with_value(payload_id).await?;
        Ok(ExecutionPayloadEnvelopeV2 {
            block_value: built.value,
            execution_payload: into_v2_field(payload),
        })
    }

    async fn get_payload_v3(&self, payload_id: PayloadId) -> RpcResult<ExecutionPayloadEnvelopeV3> {
        trace!(target: "rpc::engine", "Serving engine_getPayloadV3");
        let (payload, built) = self.dispatch_get_payload_with_value(payload_id).await?;
        let execution_payload = match payload {
            ExecutionPayload::V3(p) => p,
            _ => return Err(EngineApiError::PayloadVersionMismatch.into()),
        };
        Ok(ExecutionPayloadEnvelopeV3 {
            execution_payload,
            block_value: built.value,
            blobs_bundle: built.blobs_bundle.unwrap_or_default(),
            // The engine API spec allows any heuristic for this flag; lacking one, it defaults
            // to false.
            should_override_builder: false,
        })
    }

    async fn get_payload_bodies_by_hash_v1(
        &self,
        block_hashes: Vec<BlockHash>,
    ) -> RpcResult<Vec<Option<ExecutionPayloadBodyV1>>> {
        trace!(target: "rpc::engine", "Serving engine_getPayloadBodiesByHashV1");
        let start = Instant::now();
        let result = bodies::get_payload_bodies_by_hash(
            Arc::clone(&self.inner.bodies),
            Arc::clone(&self.inner.task_spawner),
            block_hashes,
        )
        .await?;
        self.inner.metrics.get_payload_bodies_by_hash_v1.record(start.elapsed().as_secs_f64());
        Ok(result)
    }

    async fn get_payload_bodies_by_range_v1(
        &self,
        start: alloy_primitives::U64,
        count: alloy_primitives::U64,
    ) -> RpcResult<Vec<Option<ExecutionPayloadBodyV1>>> {
        trace!(target: "rpc::engine", "Serving engine_getPayloadBodiesByRangeV1");
        let started = Instant::now();
        let result = bodies::get_payload_bodies_by_range(
            Arc::clone(&self.inner.bodies),
            Arc::clone(&self.inner.task_spawner),
            start.to::<u64>(),
            count.to::<u64>(),
        )
        .await?;
        self.inner.metrics.get_payload_bodies_by_range_v1.record(started.elapsed().as_secs_f64());
        Ok(result)
    }

    async fn exchange_transition_configuration_v1(
        &self,
        config: TransitionConfigurationV1,
    ) -> RpcResult<TransitionConfigurationV1> {
        trace!(target: "rpc::engine", "Serving engine_exchangeTransitionConfigurationV1");
        let our_ttd = self
            .inner
            .chain_spec
            .terminal_total_difficulty()
            .ok_or(EngineApiError::TtdNotConfigured)?;

        if our_ttd != config.terminal_total_difficulty {
            return Err(EngineApiError::TransitionConfigurationMismatch.into());
        }

        Ok(TransitionConfigurationV1 {
            terminal_total_difficulty: our_ttd,
            terminal_block_hash: config.terminal_block_hash,
            terminal_block_number: config.terminal_block_number,
        })
    }

    async fn exchange_capabilities(&self, capabilities: Vec<String>) -> RpcResult<Vec<String>> {
        trace!(target: "rpc::engine", "Serving engine_exchangeCapabilities");
        Ok(capabilities::exchange_capabilities(&capabilities))
    }
}

impl<B: ExecutionBlock + Clone + Send + Sync + 'static> IntoEngineApiRpcModule for EngineApi<B> {
    fn into_rpc_module(self) -> jsonrpsee::RpcModule<()> {
        self.into_rpc().remove_context()
    }
}

/// Folds `INVALID_BLOCK_HASH` down to a plain `INVALID` status for the V2/V3 surfaces (spec.md
/// §4.9). The validation error string is synthesized since the tree never attaches one to this
/// status variant.
fn fold_invalid_block_hash(status: PayloadStatus) -> PayloadStatus {
    if matches!(status.status, PayloadStatusEnum::InvalidBlockHash) {
        return PayloadStatus {
            status: PayloadStatusEnum::Invalid {
                validation_error: "invalid block hash".to_string(),
            },
            latest_valid_hash: status.latest_valid_hash,
        };
    }
    status
}

fn record_new_payload_latency(
    metrics: &EngineApiMetrics,
    version: EngineApiMessageVersion,
    elapsed: std::time::Duration,
) {
    let histogram = match version {
        EngineApiMessageVersion::V1 => &metrics.new_payload_v1,
        EngineApiMessageVersion::V2 => &metrics.new_payload_v2,
        EngineApiMessageVersion::V3 => &metrics.new_payload_v3,
    };
    histogram.record(elapsed.as_secs_f64());
}

fn record_forkchoice_latency(
    metrics: &EngineApiMetrics,
    version: EngineApiMessageVersion,
    elapsed: std::time::Duration,
) {
    let histogram = match version {
        EngineApiMessageVersion::V1 => &metrics.forkchoice_updated_v1,
        EngineApiMessageVersion::V2 => &metrics.forkchoice_updated_v2,
        EngineApiMessageVersion::V3 => &metrics.forkchoice_updated_v3,
    };
    histogram.record(elapsed.as_secs_f64());
}

/// Extracts the always-present V1 fields out of whichever [`ExecutionPayload`] variant the
/// encoder produced.
fn into_v1(payload: ExecutionPayload) -> ExecutionPayloadV1 {
    match payload {
        ExecutionPayload::V1(p) => p,
        ExecutionPayload::V2(p) => p.payload_inner,
        ExecutionPayload::V3(p) => p.payload_inner.payload_inner,
    }
}

/// Builds the `getPayloadV2` field out of whichever variant the encoder produced. A V3 payload
/// folds down to its V2-shaped prefix.
fn into_v2_field(payload: ExecutionPayload) -> ExecutionPayloadFieldV2 {
    match payload {
        ExecutionPayload::V1(p) => ExecutionPayloadFieldV2::V1(p),
        ExecutionPayload::V2(p) => ExecutionPayloadFieldV2::V2(p),
        ExecutionPayload::V3(p) => ExecutionPayloadFieldV2::V2(p.payload_inner),
    }
}
