//! JSON-RPC surface for the execution engine API (spec.md §6): version dispatch, the five
//! JSON-RPC error codes (spec.md §7), capability exchange, and body queries, all served over a
//! single [`engine_tree::handle::EngineHandle`].

mod bodies;
mod capabilities;
mod engine_api;
mod error;
mod metrics;
mod versioning;

pub use bodies::MAX_PAYLOAD_BODIES;
pub use capabilities::ENGINE_CAPABILITIES;
pub use engine_api::{EngineApi, EngineApiServer, IntoEngineApiRpcModule};
pub use error::{EngineApiError, EngineApiResult};
pub use metrics::EngineApiMetrics;
