//! Terminal Block Check (spec.md §4.5.1): identifies the proof-of-work block the merge
//! transitioned from.

use alloy_primitives::U256;
use engine_primitives::ExecutionBlock;

/// Returns whether `block` is the terminal PoW block: its own total difficulty has reached the
/// configured TTD while its parent's had not (or, for genesis, its own already has).
///
/// `block_td` and `parent_td` are cumulative total difficulties, which this crate does not
/// compute itself (chain-wide difficulty accounting lives with the out-of-scope chain/VM
/// collaborators) — callers supply them alongside the block.
pub fn is_terminal_block(block_td: U256, parent_td: Option<U256>, ttd: U256) -> bool {
    match parent_td {
        Some(parent_td) => block_td >= ttd && parent_td < ttd,
        // Genesis has no parent; it is terminal if it already meets the threshold.
        None => block_td >= ttd,
    }
}

/// Returns whether `block` is itself pre-Paris, i.e. still proof-of-work, judged by the
/// difficulty field being non-zero (post-merge blocks fix difficulty at zero).
pub fn is_pre_merge<B: ExecutionBlock>(block: &B) -> bool {
    block.difficulty() > U256::ZERO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_with_td_at_least_ttd_is_terminal() {
        assert!(is_terminal_block(U256::from(100u64), None, U256::from(100u64)));
    }

    #[test]
    fn block_is_terminal_only_when_parent_is_below_ttd() {
        let ttd = U256::from(100u64);
        assert!(is_terminal_block(U256::from(120u64), Some(U256::from(90u64)), ttd));
        assert!(!is_terminal_block(U256::from(120u64), Some(U256::from(110u64)), ttd));
        assert!(!is_terminal_block(U256::from(80u64), Some(U256::from(60u64)), ttd));
    }
}
