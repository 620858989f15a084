use std::fmt;

/// Hardforks relevant to the engine API surface, in activation order.
///
/// Everything before [`Hardfork::Paris`] is proof-of-work and never reaches
/// the engine API; it exists only so a terminal-block check has a
/// pre-merge fork to compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Hardfork {
    /// Any fork before the Paris (merge) activation.
    PreMerge,
    /// The Paris / merge hardfork. Introduces the engine API.
    Paris,
    /// The Shanghai hardfork. Adds withdrawals.
    Shanghai,
    /// The Cancun hardfork. Adds blob transactions (EIP-4844).
    Cancun,
    /// The Prague hardfork. Adds execution layer requests (EIP-7685).
    Prague,
}

impl fmt::Display for Hardfork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreMerge => "pre-merge",
            Self::Paris => "paris",
            Self::Shanghai => "shanghai",
            Self::Cancun => "cancun",
            Self::Prague => "prague",
        };
        f.write_str(name)
    }
}

/// Chain configuration consumed by the engine: hardfork activation and the
/// terminal total difficulty used to identify the merge transition block.
///
/// This is the external collaborator spec.md calls "the hardfork
/// configuration table" — intentionally out of scope to implement, but
/// something the core must be generic over.
pub trait EngineChainSpec: Send + Sync + 'static {
    /// Returns the hardfork active at the given block timestamp.
    fn hardfork_at_timestamp(&self, timestamp: u64) -> Hardfork;

    /// Returns whether Shanghai (withdrawals) is active at the given timestamp.
    fn is_shanghai_active_at_timestamp(&self, timestamp: u64) -> bool {
        self.hardfork_at_timestamp(timestamp) >= Hardfork::Shanghai
    }

    /// Returns whether Cancun (blobs) is active at the given timestamp.
    fn is_cancun_active_at_timestamp(&self, timestamp: u64) -> bool {
        self.hardfork_at_timestamp(timestamp) >= Hardfork::Cancun
    }

    /// Returns whether Prague (requests) is active at the given timestamp.
    fn is_prague_active_at_timestamp(&self, timestamp: u64) -> bool {
        self.hardfork_at_timestamp(timestamp) >= Hardfork::Prague
    }

    /// The terminal total difficulty at which the merge activates, if configured.
    fn terminal_total_difficulty(&self) -> Option<alloy_primitives::U256>;
}
