//! The per-shard persistence operator.
//!
//! [`ShardDb`] owns one shard's view of the ordered key-value store: it
//! persists root and minor blocks, maintains the derived indexes, and keeps
//! bounded header/meta pools warm. It assumes sequential invocation by a
//! single control task per shard and performs no internal locking.
//!
//! Crash-between-writes is not rolled back here: index writes are
//! idempotent, and callers re-run indexing after restart. On restart,
//! [`ShardDb::recover_state`] walks the canonical chains backward from the
//! given heads to reseed the pools, because only the path reachable from
//! the heads is guaranteed internally consistent; fork blocks stay in the
//! store but are not trusted as a contiguous chain.

use tracing::info;

use braid_core::error::{CodecError, ShardDbError};
use braid_core::kv::KvStore;
use braid_core::types::{
    Address, Branch, CrossShardDeposit, CrossShardDepositList, Hash256, MinorBlock,
    MinorBlockHeader, MinorBlockMeta, RootBlock, RootBlockHeader, Transaction, TransactionDetail,
};

use crate::cache::HeaderCache;
use crate::config::ShardDbConfig;
use crate::history::TransactionHistory;
use crate::keys;

pub(crate) fn encode<T: bincode::Encode>(value: &T) -> Result<Vec<u8>, ShardDbError> {
    bincode::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| CodecError::Serialization(e.to_string()).into())
}

pub(crate) fn decode<T: bincode::Decode<()>>(raw: &[u8]) -> Result<T, ShardDbError> {
    let (value, _) = bincode::decode_from_slice(raw, bincode::config::standard())
        .map_err(|e| CodecError::Deserialization(e.to_string()))?;
    Ok(value)
}

pub(crate) fn load_minor_block<S: KvStore>(
    store: &S,
    hash: &Hash256,
) -> Result<Option<MinorBlock>, ShardDbError> {
    match store.get(&keys::minor_block_key(hash))? {
        Some(raw) => Ok(Some(decode(&raw)?)),
        None => Ok(None),
    }
}

pub(crate) fn load_minor_block_by_height<S: KvStore>(
    store: &S,
    height: u32,
) -> Result<Option<MinorBlock>, ShardDbError> {
    let hash = match store.get(&keys::minor_block_index_key(height))? {
        Some(raw) if raw.len() == 32 => Hash256(raw.try_into().unwrap_or_default()),
        Some(raw) => {
            return Err(ShardDbError::CorruptRecord {
                key: format!("mi_{height}"),
                expected: 32,
                got: raw.len(),
            });
        }
        None => return Ok(None),
    };
    load_minor_block(store, &hash)
}

/// Persistence operator for one shard.
///
/// Owns the store handle, the bounded header/meta pools, and the
/// address-history sub-component. All `get_*` lookups are read-through:
/// pool first, store on miss, pool repopulated as a side effect.
pub struct ShardDb<S: KvStore> {
    store: S,
    branch: Branch,
    config: ShardDbConfig,
    cache: HeaderCache,
    history: TransactionHistory,
}

impl<S: KvStore> ShardDb<S> {
    pub fn new(store: S, branch: Branch, config: ShardDbConfig) -> Self {
        let cache = HeaderCache::new(
            config.max_root_blocks_in_memory,
            config.max_minor_blocks_in_memory,
        );
        let history = TransactionHistory::new(config.enable_transaction_history, branch);
        Self { store, branch, config, cache, history }
    }

    /// Rebuild the header/meta pools from the store after a restart.
    ///
    /// Walks the root chain backward from `r_header` until the pool holds
    /// `max_root_blocks_in_memory` headers or the walk reaches the shard's
    /// genesis root height, and the minor chain backward from `m_header`
    /// until `max_minor_blocks_in_memory` or height 0. A `prev` pointer
    /// referencing a block absent from the store is a fatal inconsistency.
    pub fn recover_state(
        &mut self,
        r_header: &RootBlockHeader,
        m_header: &MinorBlockHeader,
    ) -> Result<(), ShardDbError> {
        let mut r_hash = r_header.hash();
        while self.cache.root_header_count() < self.config.max_root_blocks_in_memory {
            let raw = self
                .store
                .get(&keys::root_block_key(&r_hash))?
                .ok_or(ShardDbError::MissingAncestor { hash: r_hash })?;
            let block: RootBlock = decode(&raw)?;
            let height = block.header.height;
            let prev = block.header.hash_prev_block;
            self.cache.put_root_header(r_hash, block.header);
            if height <= self.config.genesis_root_height {
                break;
            }
            r_hash = prev;
        }

        let mut m_hash = m_header.hash();
        while self.cache.minor_header_count() < self.config.max_minor_blocks_in_memory {
            let raw = self
                .store
                .get(&keys::minor_block_key(&m_hash))?
                .ok_or(ShardDbError::MissingAncestor { hash: m_hash })?;
            let block: MinorBlock = decode(&raw)?;
            let height = block.header.height;
            let prev = block.header.hash_prev_minor_block;
            self.cache.put_minor_meta(m_hash, block.meta);
            self.cache.put_minor_header(m_hash, block.header);
            if height == 0 {
                break;
            }
            m_hash = prev;
        }

        info!(
            shard = self.branch.full_shard_id(),
            minor_blocks = self.cache.minor_header_count(),
            root_blocks = self.cache.root_header_count(),
            "recovered chain state"
        );
        Ok(())
    }

    // --- Root block operations ---

    /// Persist a root block and record which minor header it confirms last
    /// (an empty marker when this shard had nothing confirmed).
    ///
    /// No validation happens here; `hash_override` lets callers store a
    /// block under a precomputed hash.
    pub fn put_root_block(
        &mut self,
        block: &RootBlock,
        last_confirmed_minor_header: Option<&MinorBlockHeader>,
        hash_override: Option<Hash256>,
    ) -> Result<(), ShardDbError> {
        let hash = hash_override.unwrap_or_else(|| block.header.hash());
        self.cache.put_root_header(hash, block.header.clone());
        self.store.put(&keys::root_block_key(&hash), &encode(block)?)?;
        let pointer = match last_confirmed_minor_header {
            Some(header) => header.hash().as_bytes().to_vec(),
            None => Vec::new(),
        };
        self.store.put(&keys::last_confirmed_minor_key(&hash), &pointer)?;
        Ok(())
    }

    pub fn get_root_block_by_hash(
        &mut self,
        hash: &Hash256,
    ) -> Result<Option<RootBlock>, ShardDbError> {
        let Some(raw) = self.store.get(&keys::root_block_key(hash))? else {
            return Ok(None);
        };
        let block: RootBlock = decode(&raw)?;
        self.cache.put_root_header(*hash, block.header.clone());
        Ok(Some(block))
    }

    pub fn get_root_block_header_by_hash(
        &mut self,
        hash: &Hash256,
    ) -> Result<Option<RootBlockHeader>, ShardDbError> {
        if let Some(header) = self.cache.root_header(hash) {
            return Ok(Some(header));
        }
        Ok(self.get_root_block_by_hash(hash)?.map(|block| block.header))
    }

    /// Header at `target_height` on the chain ending at `from_hash`.
    ///
    /// Walks `hash_prev_block` from the starting header; cost is
    /// proportional to the height difference. Returns `None` when
    /// `target_height` exceeds the starting header's height.
    pub fn get_root_block_header_by_height(
        &mut self,
        from_hash: &Hash256,
        target_height: u32,
    ) -> Result<Option<RootBlockHeader>, ShardDbError> {
        let Some(mut header) = self.get_root_block_header_by_hash(from_hash)? else {
            return Ok(None);
        };
        if target_height > header.height {
            return Ok(None);
        }
        while header.height != target_height {
            let prev = header.hash_prev_block;
            header = self
                .get_root_block_header_by_hash(&prev)?
                .ok_or(ShardDbError::MissingAncestor { hash: prev })?;
        }
        Ok(Some(header))
    }

    pub fn contain_root_block_by_hash(&self, hash: &Hash256) -> Result<bool, ShardDbError> {
        if self.cache.contains_root_header(hash) {
            return Ok(true);
        }
        Ok(self.store.contains(&keys::root_block_key(hash))?)
    }

    /// Resolve the last-confirmed-minor-header pointer written by
    /// [`put_root_block`](Self::put_root_block); `None` if absent or empty.
    pub fn get_last_confirmed_minor_block_header_at_root_block(
        &mut self,
        root_hash: &Hash256,
    ) -> Result<Option<MinorBlockHeader>, ShardDbError> {
        let Some(raw) = self.store.get(&keys::last_confirmed_minor_key(root_hash))? else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }
        if raw.len() != 32 {
            return Err(ShardDbError::CorruptRecord {
                key: format!("r_last_m{root_hash}"),
                expected: 32,
                got: raw.len(),
            });
        }
        let hash = Hash256(raw.try_into().unwrap_or_default());
        self.get_minor_block_header_by_hash(&hash)
    }

    pub fn put_genesis_block(
        &mut self,
        root_hash: &Hash256,
        genesis: &MinorBlock,
    ) -> Result<(), ShardDbError> {
        self.store.put(&keys::genesis_block_key(root_hash), &encode(genesis)?)?;
        Ok(())
    }

    pub fn get_genesis_block(
        &self,
        root_hash: &Hash256,
    ) -> Result<Option<MinorBlock>, ShardDbError> {
        match self.store.get(&keys::genesis_block_key(root_hash))? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    // --- Minor block operations ---

    /// Persist a minor block: block payload, cumulative tx count, pools,
    /// the height fork counter, and the confirmed deposit list consumed by
    /// the address-history query path.
    pub fn put_minor_block(
        &mut self,
        block: &MinorBlock,
        confirmed_deposits: &[CrossShardDeposit],
    ) -> Result<(), ShardDbError> {
        let hash = block.header.hash();
        self.store.put(&keys::minor_block_key(&hash), &encode(block)?)?;
        self.put_total_tx_count(block, &hash)?;

        self.cache.put_minor_header(hash, block.header.clone());
        self.cache.put_minor_meta(hash, block.meta);
        self.cache.record_minor_hash_at_height(block.header.height, hash);

        self.history.put_confirmed_deposit_list(&mut self.store, &hash, confirmed_deposits)?;
        Ok(())
    }

    // Blocks at height <= 2 are count-reset points: they are treated as
    // having no countable parent. Fixed protocol rule.
    fn put_total_tx_count(&mut self, block: &MinorBlock, hash: &Hash256) -> Result<(), ShardDbError> {
        let prev_count = if block.header.height > 2 {
            self.get_total_tx_count(&block.header.hash_prev_minor_block)?
        } else {
            0
        };
        let count = prev_count + block.tx_list.len() as u32;
        self.store.put(&keys::total_tx_count_key(hash), &keys::encode_tx_count(count))?;
        Ok(())
    }

    /// Cumulative transaction count at a minor block; 0 when absent.
    pub fn get_total_tx_count(&self, block_hash: &Hash256) -> Result<u32, ShardDbError> {
        match self.store.get(&keys::total_tx_count_key(block_hash))? {
            Some(raw) => keys::decode_tx_count(block_hash, &raw),
            None => Ok(0),
        }
    }

    pub fn get_minor_block_by_hash(
        &self,
        hash: &Hash256,
    ) -> Result<Option<MinorBlock>, ShardDbError> {
        load_minor_block(&self.store, hash)
    }

    pub fn get_minor_block_header_by_hash(
        &mut self,
        hash: &Hash256,
    ) -> Result<Option<MinorBlockHeader>, ShardDbError> {
        if let Some(header) = self.cache.minor_header(hash) {
            return Ok(Some(header));
        }
        let Some(block) = self.get_minor_block_by_hash(hash)? else {
            return Ok(None);
        };
        self.cache.put_minor_header(*hash, block.header.clone());
        Ok(Some(block.header))
    }

    pub fn get_minor_block_meta_by_hash(
        &mut self,
        hash: &Hash256,
    ) -> Result<Option<MinorBlockMeta>, ShardDbError> {
        if let Some(meta) = self.cache.minor_meta(hash) {
            return Ok(Some(meta));
        }
        let Some(block) = self.get_minor_block_by_hash(hash)? else {
            return Ok(None);
        };
        self.cache.put_minor_meta(*hash, block.meta);
        Ok(Some(block.meta))
    }

    /// EVM state root recorded in a minor block's metadata.
    pub fn get_minor_block_evm_root_hash_by_hash(
        &mut self,
        hash: &Hash256,
    ) -> Result<Option<Hash256>, ShardDbError> {
        Ok(self.get_minor_block_meta_by_hash(hash)?.map(|meta| meta.hash_evm_state_root))
    }

    pub fn contain_minor_block_by_hash(&self, hash: &Hash256) -> Result<bool, ShardDbError> {
        if self.cache.contains_minor_header(hash) {
            return Ok(true);
        }
        Ok(self.store.contains(&keys::minor_block_key(hash))?)
    }

    /// Point the positional height index at this block (the canonical
    /// block for its height). Distinct from the fork counter, which is
    /// untouched by index maintenance.
    pub fn put_minor_block_index(&mut self, block: &MinorBlock) -> Result<(), ShardDbError> {
        self.store.put(
            &keys::minor_block_index_key(block.header.height),
            block.header.hash().as_bytes(),
        )?;
        Ok(())
    }

    pub fn remove_minor_block_index(&mut self, block: &MinorBlock) -> Result<(), ShardDbError> {
        self.store.remove(&keys::minor_block_index_key(block.header.height))?;
        Ok(())
    }

    pub fn get_minor_block_by_height(
        &self,
        height: u32,
    ) -> Result<Option<MinorBlock>, ShardDbError> {
        load_minor_block_by_height(&self.store, height)
    }

    /// Number of minor blocks ever seen at `height`. This is a fork/waste
    /// metric, not a count of canonical blocks.
    pub fn get_block_count_by_height(&mut self, height: u32) -> usize {
        self.cache.block_count_at_height(height)
    }

    // --- Transaction index operations ---

    pub fn put_transaction_index(
        &mut self,
        tx: &Transaction,
        block_height: u32,
        index: u32,
    ) -> Result<(), ShardDbError> {
        let tx_hash = tx.hash()?;
        self.store.put(
            &keys::transaction_index_key(&tx_hash),
            &keys::encode_tx_location(block_height, index),
        )?;
        self.history.put_index(&mut self.store, tx, block_height, index)
    }

    pub fn remove_transaction_index(
        &mut self,
        tx: &Transaction,
        block_height: u32,
        index: u32,
    ) -> Result<(), ShardDbError> {
        let tx_hash = tx.hash()?;
        self.store.remove(&keys::transaction_index_key(&tx_hash))?;
        self.history.remove_index(&mut self.store, tx, block_height, index)
    }

    pub fn contain_transaction_hash(&self, tx_hash: &Hash256) -> Result<bool, ShardDbError> {
        Ok(self.store.contains(&keys::transaction_index_key(tx_hash))?)
    }

    /// Resolve a transaction hash to its containing block and in-block
    /// index via the positional height index.
    pub fn get_transaction_by_hash(
        &self,
        tx_hash: &Hash256,
    ) -> Result<Option<(MinorBlock, u32)>, ShardDbError> {
        let Some(raw) = self.store.get(&keys::transaction_index_key(tx_hash))? else {
            return Ok(None);
        };
        let (height, index) = keys::decode_tx_location(tx_hash, &raw)?;
        match self.get_minor_block_by_height(height)? {
            Some(block) => Ok(Some((block, index))),
            None => Ok(None),
        }
    }

    /// Index every transaction of a block in one pass (block-apply path).
    pub fn put_transaction_index_from_block(
        &mut self,
        block: &MinorBlock,
    ) -> Result<(), ShardDbError> {
        for (i, tx) in block.tx_list.iter().enumerate() {
            self.put_transaction_index(tx, block.header.height, i as u32)?;
        }
        self.history.put_index_from_block(&mut self.store, block)
    }

    /// De-index every transaction of a block in one pass (block-revert path).
    pub fn remove_transaction_index_from_block(
        &mut self,
        block: &MinorBlock,
    ) -> Result<(), ShardDbError> {
        for (i, tx) in block.tx_list.iter().enumerate() {
            self.remove_transaction_index(tx, block.header.height, i as u32)?;
        }
        self.history.remove_index_from_block(&mut self.store, block)
    }

    /// Paginated reverse-chronological transaction listing for an address.
    /// Empty page with an empty cursor when history is disabled.
    pub fn get_transactions_by_address(
        &self,
        address: &Address,
        start: Option<&[u8]>,
        limit: u32,
    ) -> Result<(Vec<TransactionDetail>, Vec<u8>), ShardDbError> {
        self.history.get_transactions_by_address(&self.store, address, start, limit)
    }

    // --- Cross-shard deposit operations ---

    /// Store the raw deposit list sent to this shard at a minor block,
    /// before confirmation.
    pub fn put_minor_block_xshard_tx_list(
        &mut self,
        minor_block_hash: &Hash256,
        tx_list: &CrossShardDepositList,
    ) -> Result<(), ShardDbError> {
        self.store.put(&keys::xshard_list_key(minor_block_hash), &encode(tx_list)?)?;
        Ok(())
    }

    pub fn get_minor_block_xshard_tx_list(
        &self,
        minor_block_hash: &Hash256,
    ) -> Result<Option<CrossShardDepositList>, ShardDbError> {
        match self.store.get(&keys::xshard_list_key(minor_block_hash))? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn contain_remote_minor_block_hash(
        &self,
        minor_block_hash: &Hash256,
    ) -> Result<bool, ShardDbError> {
        Ok(self.store.contains(&keys::xshard_list_key(minor_block_hash))?)
    }

    // --- Generic passthrough ---

    /// Store a miscellaneous value under a caller-owned key.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), ShardDbError> {
        self.store.put(key, value)?;
        Ok(())
    }

    /// Fetch a miscellaneous value; `None` when absent.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ShardDbError> {
        Ok(self.store.get(key)?)
    }
}
