//! Fixed-layout byte-key schema for the shard store.
//!
//! Every key begins with an ASCII tag so namespaces never collide. The
//! address-history layout is chosen so lexicographic byte order equals
//! ascending (address, height, cross-shard-flag, index) order: a reverse
//! range scan yields one address's transactions newest-first, with
//! cross-shard entries (0x00) sorting before in-shard entries (0x01) at
//! equal height.
//!
//! Also home to the unsigned big-endian ±1 arithmetic used for pagination
//! cursors, with explicit handling of the all-zero and all-ones boundaries.

use braid_core::error::ShardDbError;
use braid_core::types::{Address, Hash256, ADDRESS_SERIALIZED_LEN};

const ROOT_BLOCK_PREFIX: &[u8] = b"rblock_";
const LAST_CONFIRMED_MINOR_PREFIX: &[u8] = b"r_last_m";
const GENESIS_PREFIX: &[u8] = b"genesis_";
const MINOR_BLOCK_PREFIX: &[u8] = b"mblock_";
const TX_COUNT_PREFIX: &[u8] = b"tx_count_";
const MINOR_INDEX_PREFIX: &[u8] = b"mi_";
const TX_INDEX_PREFIX: &[u8] = b"txindex_";
const XSHARD_LIST_PREFIX: &[u8] = b"xShard_";
const CONFIRMED_XSHARD_PREFIX: &[u8] = b"xr_";
const ADDRESS_HISTORY_PREFIX: &[u8] = b"addr_";

/// Flag byte for cross-shard history entries. Sorts before in-shard.
pub const CROSS_SHARD_FLAG: u8 = 0x00;
/// Flag byte for in-shard (local) history entries.
pub const IN_SHARD_FLAG: u8 = 0x01;

/// Total width of an address-history key:
/// `"addr_" ‖ address(24) ‖ height(4) ‖ flag(1) ‖ index(4)`.
pub const ADDRESS_HISTORY_KEY_LEN: usize =
    ADDRESS_HISTORY_PREFIX.len() + ADDRESS_SERIALIZED_LEN + 4 + 1 + 4;

/// Width of a transaction-location record: height(4) ‖ index(4).
pub const TX_LOCATION_LEN: usize = 8;

fn tagged(prefix: &[u8], hash: &Hash256) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 32);
    key.extend_from_slice(prefix);
    key.extend_from_slice(hash.as_bytes());
    key
}

/// `"rblock_" ‖ hash` → serialized root block.
pub fn root_block_key(hash: &Hash256) -> Vec<u8> {
    tagged(ROOT_BLOCK_PREFIX, hash)
}

/// `"r_last_m" ‖ rootHash` → minor header hash (empty if none confirmed).
pub fn last_confirmed_minor_key(root_hash: &Hash256) -> Vec<u8> {
    tagged(LAST_CONFIRMED_MINOR_PREFIX, root_hash)
}

/// `"genesis_" ‖ rootHash` → serialized genesis minor block.
pub fn genesis_block_key(root_hash: &Hash256) -> Vec<u8> {
    tagged(GENESIS_PREFIX, root_hash)
}

/// `"mblock_" ‖ hash` → serialized minor block.
pub fn minor_block_key(hash: &Hash256) -> Vec<u8> {
    tagged(MINOR_BLOCK_PREFIX, hash)
}

/// `"tx_count_" ‖ hash` → 4-byte big-endian cumulative tx count.
pub fn total_tx_count_key(hash: &Hash256) -> Vec<u8> {
    tagged(TX_COUNT_PREFIX, hash)
}

/// `"mi_" ‖ decimal-ASCII(height)` → canonical minor block hash.
pub fn minor_block_index_key(height: u32) -> Vec<u8> {
    format!("mi_{height}").into_bytes()
}

/// `"txindex_" ‖ txHash` → 8-byte location record.
pub fn transaction_index_key(tx_hash: &Hash256) -> Vec<u8> {
    tagged(TX_INDEX_PREFIX, tx_hash)
}

/// `"xShard_" ‖ minorBlockHash` → deposit list sent to this shard.
pub fn xshard_list_key(minor_block_hash: &Hash256) -> Vec<u8> {
    tagged(XSHARD_LIST_PREFIX, minor_block_hash)
}

/// `"xr_" ‖ minorBlockHash` → deposit list confirmed at this block.
pub fn confirmed_xshard_key(minor_block_hash: &Hash256) -> Vec<u8> {
    tagged(CONFIRMED_XSHARD_PREFIX, minor_block_hash)
}

/// `"addr_" ‖ address`, the prefix below every history key for `address`.
pub fn address_history_prefix(address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(ADDRESS_HISTORY_PREFIX.len() + ADDRESS_SERIALIZED_LEN);
    key.extend_from_slice(ADDRESS_HISTORY_PREFIX);
    key.extend_from_slice(&address.serialize());
    key
}

/// Full history key for one (address, height, index, cross-shard) entry.
pub fn address_history_key(address: &Address, height: u32, index: u32, cross_shard: bool) -> Vec<u8> {
    let mut key = address_history_prefix(address);
    key.extend_from_slice(&height.to_be_bytes());
    key.push(if cross_shard { CROSS_SHARD_FLAG } else { IN_SHARD_FLAG });
    key.extend_from_slice(&index.to_be_bytes());
    key
}

/// Decode `(height, cross_shard, index)` from a full history key.
///
/// A key of unexpected width signals store corruption, never a caller error.
pub fn decode_address_history_key(key: &[u8]) -> Result<(u32, bool, u32), ShardDbError> {
    if key.len() != ADDRESS_HISTORY_KEY_LEN {
        return Err(ShardDbError::CorruptRecord {
            key: String::from_utf8_lossy(&key[..key.len().min(8)]).into_owned(),
            expected: ADDRESS_HISTORY_KEY_LEN,
            got: key.len(),
        });
    }
    let base = ADDRESS_HISTORY_PREFIX.len() + ADDRESS_SERIALIZED_LEN;
    let height = u32::from_be_bytes(key[base..base + 4].try_into().unwrap_or_default());
    let cross_shard = key[base + 4] == CROSS_SHARD_FLAG;
    let index = u32::from_be_bytes(key[base + 5..].try_into().unwrap_or_default());
    Ok((height, cross_shard, index))
}

/// Encode a transaction location: height ‖ index, both 4-byte big-endian.
pub fn encode_tx_location(height: u32, index: u32) -> [u8; TX_LOCATION_LEN] {
    let mut out = [0u8; TX_LOCATION_LEN];
    out[0..4].copy_from_slice(&height.to_be_bytes());
    out[4..8].copy_from_slice(&index.to_be_bytes());
    out
}

/// Decode a transaction location record stored under `txindex_`.
///
/// A record that is not exactly 8 bytes means the store itself is
/// inconsistent and must not be silently tolerated.
pub fn decode_tx_location(tx_hash: &Hash256, raw: &[u8]) -> Result<(u32, u32), ShardDbError> {
    if raw.len() != TX_LOCATION_LEN {
        return Err(ShardDbError::CorruptRecord {
            key: format!("txindex_{tx_hash}"),
            expected: TX_LOCATION_LEN,
            got: raw.len(),
        });
    }
    let height = u32::from_be_bytes(raw[0..4].try_into().unwrap_or_default());
    let index = u32::from_be_bytes(raw[4..8].try_into().unwrap_or_default());
    Ok((height, index))
}

/// Encode a cumulative transaction count as 4-byte big-endian.
pub fn encode_tx_count(count: u32) -> [u8; 4] {
    count.to_be_bytes()
}

/// Decode a cumulative transaction count record.
pub fn decode_tx_count(block_hash: &Hash256, raw: &[u8]) -> Result<u32, ShardDbError> {
    if raw.len() != 4 {
        return Err(ShardDbError::CorruptRecord {
            key: format!("tx_count_{block_hash}"),
            expected: 4,
            got: raw.len(),
        });
    }
    Ok(u32::from_be_bytes(raw.try_into().unwrap_or_default()))
}

/// Treat `key` as an unsigned big-endian integer and add one, keeping the
/// width. Returns `None` on overflow (all-ones input).
pub fn be_add_one(key: &[u8]) -> Option<Vec<u8>> {
    let mut out = key.to_vec();
    for byte in out.iter_mut().rev() {
        let (next, carried) = byte.overflowing_add(1);
        *byte = next;
        if !carried {
            return Some(out);
        }
    }
    None
}

/// Treat `key` as an unsigned big-endian integer and subtract one, keeping
/// the width. Returns `None` on underflow (all-zero input).
pub fn be_sub_one(key: &[u8]) -> Option<Vec<u8>> {
    let mut out = key.to_vec();
    for byte in out.iter_mut().rev() {
        let (next, borrowed) = byte.overflowing_sub(1);
        *byte = next;
        if !borrowed {
            return Some(out);
        }
    }
    None
}
