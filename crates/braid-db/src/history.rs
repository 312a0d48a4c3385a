//! Address transaction-history index.
//!
//! A derived index over (address, height, cross-shard-flag, index) enabling
//! reverse-chronological, paginated transaction listing per address. Entry
//! keys carry no value; everything needed to rebuild a row lives in the key
//! and the referenced block.
//!
//! The whole index is feature-gated: when disabled, writes are silent
//! no-ops and queries return an empty page. The flag is injected at
//! construction, never read from ambient state.
//!
//! For each transaction an entry is written for the sender and, unless the
//! transaction deploys a contract (no recipient) or the recipient lives on
//! another shard, for the recipient. Confirmed cross-shard deposits get an
//! entry for their recipient with the cross-shard flag set; the all-zero
//! tx-hash coinbase marker is skipped.

use braid_core::error::ShardDbError;
use braid_core::kv::KvStore;
use braid_core::types::{
    Address, Branch, CrossShardDeposit, CrossShardDepositList, Hash256, MinorBlock, Transaction,
    TransactionDetail,
};

use crate::keys;
use crate::operator::{decode, encode, load_minor_block_by_height};

/// Suffix width below the address prefix: height(4) ‖ flag(1) ‖ index(4).
const HISTORY_KEY_SUFFIX_LEN: usize = 9;

pub(crate) struct TransactionHistory {
    enabled: bool,
    branch: Branch,
}

impl TransactionHistory {
    pub fn new(enabled: bool, branch: Branch) -> Self {
        Self { enabled, branch }
    }

    /// Persist the list of deposits confirmed at `block_hash`, consumed
    /// later by the cross-shard arm of the history query.
    pub fn put_confirmed_deposit_list<S: KvStore>(
        &self,
        store: &mut S,
        block_hash: &Hash256,
        deposits: &[CrossShardDeposit],
    ) -> Result<(), ShardDbError> {
        if !self.enabled {
            return Ok(());
        }
        let list = CrossShardDepositList::new(deposits.to_vec());
        store.put(&keys::confirmed_xshard_key(block_hash), &encode(&list)?)?;
        Ok(())
    }

    /// Deposits confirmed at `block_hash`; empty when absent.
    pub fn confirmed_deposit_list<S: KvStore>(
        &self,
        store: &S,
        block_hash: &Hash256,
    ) -> Result<Vec<CrossShardDeposit>, ShardDbError> {
        match store.get(&keys::confirmed_xshard_key(block_hash))? {
            Some(raw) if !raw.is_empty() => {
                let list: CrossShardDepositList = decode(&raw)?;
                Ok(list.deposits)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn entry_keys(&self, tx: &Transaction, height: u32, index: u32) -> Vec<Vec<u8>> {
        let mut out = vec![keys::address_history_key(&tx.from_address(), height, index, false)];
        // recipient is absent for contract deployment and skipped when it
        // lives on another shard
        if let Some(to) = tx.to_address() {
            if self.branch.is_in_branch(to.full_shard_key) {
                out.push(keys::address_history_key(&to, height, index, false));
            }
        }
        out
    }

    pub fn put_index<S: KvStore>(
        &self,
        store: &mut S,
        tx: &Transaction,
        height: u32,
        index: u32,
    ) -> Result<(), ShardDbError> {
        if !self.enabled {
            return Ok(());
        }
        for key in self.entry_keys(tx, height, index) {
            store.put(&key, b"")?;
        }
        Ok(())
    }

    /// Remove the exact keys [`put_index`](Self::put_index) wrote.
    pub fn remove_index<S: KvStore>(
        &self,
        store: &mut S,
        tx: &Transaction,
        height: u32,
        index: u32,
    ) -> Result<(), ShardDbError> {
        if !self.enabled {
            return Ok(());
        }
        for key in self.entry_keys(tx, height, index) {
            store.remove(&key)?;
        }
        Ok(())
    }

    pub fn put_index_from_block<S: KvStore>(
        &self,
        store: &mut S,
        block: &MinorBlock,
    ) -> Result<(), ShardDbError> {
        self.update_index_from_block(store, block, true)
    }

    pub fn remove_index_from_block<S: KvStore>(
        &self,
        store: &mut S,
        block: &MinorBlock,
    ) -> Result<(), ShardDbError> {
        self.update_index_from_block(store, block, false)
    }

    fn update_index_from_block<S: KvStore>(
        &self,
        store: &mut S,
        block: &MinorBlock,
        insert: bool,
    ) -> Result<(), ShardDbError> {
        if !self.enabled {
            return Ok(());
        }
        let deposits = self.confirmed_deposit_list(store, &block.header.hash())?;
        for (i, dep) in deposits.iter().enumerate() {
            if dep.is_root_coinbase() {
                continue;
            }
            let key =
                keys::address_history_key(&dep.to_address, block.header.height, i as u32, true);
            if insert {
                store.put(&key, b"")?;
            } else {
                store.remove(&key)?;
            }
        }
        Ok(())
    }

    /// Paginated reverse-chronological listing for one address.
    ///
    /// Scans the store descending from `start` (or from just above the
    /// address's key range when `start` is absent or out of range) down to
    /// the address prefix, resolving each key against the referenced block.
    /// Returns up to `limit` rows plus a continuation cursor that resumes
    /// strictly after the last returned row; resubmitting the cursor of an
    /// exhausted page yields an empty page.
    pub fn get_transactions_by_address<S: KvStore>(
        &self,
        store: &S,
        address: &Address,
        start: Option<&[u8]>,
        limit: u32,
    ) -> Result<(Vec<TransactionDetail>, Vec<u8>), ShardDbError> {
        if !self.enabled {
            return Ok((Vec::new(), Vec::new()));
        }

        let end = keys::address_history_prefix(address);
        // smallest key strictly above every real key for this address; an
        // all-ones prefix cannot be bumped, so fall back to the maximal
        // encodable suffix
        let original_start = match keys::be_add_one(&end) {
            Some(bumped) => bumped,
            None => {
                let mut max_key = end.clone();
                max_key.extend_from_slice(&[0xFF; HISTORY_KEY_SUFFIX_LEN]);
                max_key
            }
        };
        let cursor = match start {
            Some(s) if !s.is_empty() && s <= original_start.as_slice() => s.to_vec(),
            _ => original_start,
        };

        let mut details = Vec::new();
        let mut next = end.clone();
        for item in store.reversed_range_iter(&cursor, &end) {
            if details.len() as u32 >= limit {
                break;
            }
            let (key, _) = item?;
            let (height, cross_shard, index) = keys::decode_address_history_key(&key)?;
            let block = load_minor_block_by_height(store, height)?
                .ok_or(ShardDbError::MissingIndexedBlock { height })?;
            if cross_shard {
                let deposits = self.confirmed_deposit_list(store, &block.header.hash())?;
                let dep = deposits
                    .get(index as usize)
                    .ok_or(ShardDbError::HistoryEntryOutOfRange { height, index })?;
                details.push(TransactionDetail {
                    tx_hash: dep.tx_hash,
                    from_address: dep.from_address,
                    to_address: Some(dep.to_address),
                    value: dep.value,
                    block_height: height,
                    timestamp: block.header.create_time,
                    success: true,
                    gas_token_id: dep.gas_token_id,
                    transfer_token_id: dep.transfer_token_id,
                });
            } else {
                let tx = block
                    .tx_list
                    .get(index as usize)
                    .ok_or(ShardDbError::HistoryEntryOutOfRange { height, index })?;
                let receipt = block
                    .receipt(index as usize)
                    .ok_or(ShardDbError::HistoryEntryOutOfRange { height, index })?;
                details.push(TransactionDetail {
                    tx_hash: tx.hash()?,
                    from_address: tx.from_address(),
                    to_address: tx.to_address(),
                    value: tx.value,
                    block_height: height,
                    timestamp: block.header.create_time,
                    success: receipt.success,
                    gas_token_id: tx.gas_token_id,
                    transfer_token_id: tx.transfer_token_id,
                });
            }
            match keys::be_sub_one(&key) {
                Some(lowered) => next = lowered,
                // an all-zero key has nothing below it: end of range
                None => {
                    next = end.clone();
                    break;
                }
            }
        }

        Ok((details, next))
    }
}
