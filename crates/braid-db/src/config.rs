//! Configuration for a shard db operator instance.
//!
//! All knobs are threaded explicitly through
//! [`ShardDb::new`](crate::operator::ShardDb::new); there is no ambient or
//! global state.

/// Configuration for one shard's persistence operator.
#[derive(Debug, Clone)]
pub struct ShardDbConfig {
    /// Gates all address-history writes and reads. When off, history
    /// writes are silent no-ops and queries return empty pages.
    pub enable_transaction_history: bool,
    /// Capacity of the root header pool; also bounds recovery.
    pub max_root_blocks_in_memory: usize,
    /// Capacity of the minor header/meta pools; also bounds recovery.
    pub max_minor_blocks_in_memory: usize,
    /// Root-chain height at which this shard's chain begins; the recovery
    /// walk does not descend below it.
    pub genesis_root_height: u32,
}

impl Default for ShardDbConfig {
    fn default() -> Self {
        Self {
            enable_transaction_history: false,
            max_root_blocks_in_memory: 256,
            max_minor_blocks_in_memory: 1024,
            genesis_root_height: 0,
        }
    }
}
