//! Metrics emitted by the tree's state machine, independent of the RPC-facing metrics in
//! `rpc-engine-api` (which time whole requests; these time what happens inside one).

use metrics::Counter;
use metrics_derive::Metrics;

/// Counters describing what the Execution Driver and Forkchoice Resolver actually did, as
/// opposed to what status they reported — useful for telling a genuinely idle chain apart from
/// one stuck re-executing the same blocks every payload.
#[derive(Metrics)]
#[metrics(scope = "engine_tree")]
pub struct TreeMetrics {
    /// Number of blocks executed by the Execution Driver.
    #[metric(describe = "Total blocks executed while walking ancestors in newPayload")]
    pub blocks_executed: Counter,
    /// Number of blocks skipped because they were already executed or canonical.
    #[metric(describe = "Total blocks skipped as already-executed during newPayload")]
    pub blocks_skipped: Counter,
    /// Number of `newPayload` calls short-circuited via the executed cache (spec.md §4.5 step 3).
    #[metric(describe = "Total newPayload calls short-circuited via the executed cache")]
    pub new_payload_cache_hits: Counter,
    /// Number of times the ancestor walker reported it could not extend the chain.
    #[metric(describe = "Total ancestor walks that exceeded the configured max depth")]
    pub ancestor_walk_overflows: Counter,
    /// Number of times a forkchoice update triggered a canonicalization (`setHead`).
    #[metric(describe = "Total forkchoice updates that moved the canonical head")]
    pub forkchoice_set_head: Counter,
    /// Number of pending payload builds started from a forkchoice update.
    #[metric(describe = "Total payload builds started from forkchoiceUpdated")]
    pub payload_builds_started: Counter,
    /// Number of best-effort cache prunes performed after a forkchoice update.
    #[metric(describe = "Total cache prune passes performed after forkchoiceUpdated")]
    pub cache_prunes: Counter,
}
