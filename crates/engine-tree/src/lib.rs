//! The in-memory engine state machine: caches, ancestor/assembler/terminal-check helpers, and
//! the `newPayload`/`forkchoideUpdated`/`getPayload` core routines built on top of [`EngineTree`].
//!
//! `rpc-engine-api` never touches [`EngineTree`] directly; it talks to it through
//! [`handle::EngineHandle`], which owns the single task allowed to mutate it (spec.md §5).

pub mod ancestor;
pub mod assembler;
pub mod cache;
pub mod forkchoice;
pub mod handle;
pub mod metrics;
pub mod new_payload;
pub mod pending;
pub mod terminal;
pub mod tree;

pub use cache::{BlockBuffer, ExecutedBlock, RemoteCache, TreeState};
pub use handle::{EngineHandle, EngineMessage};
pub use metrics::TreeMetrics;
pub use tree::{
    EngineTree, EngineTreeCollaborators, ForkchoiceStateTracker, LastSeenHardforks,
    DEFAULT_MAX_ANCESTOR_DEPTH, DEFAULT_MAX_EXECUTE_PER_PAYLOAD,
};
