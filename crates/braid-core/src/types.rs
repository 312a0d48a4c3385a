//! Core shard-chain types: headers, blocks, transactions, deposits.
//!
//! Two chains meet here: the root chain finalizes minor blocks across all
//! shards, and each shard maintains its own minor-block chain. Every stored
//! entity is identified by the content hash of its serialized form.
//! All numeric fields use fixed-width integers per protocol convention
//! (heights are u32, matching their 4-byte big-endian key encoding).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::CodecError;

/// A 32-byte hash value.
///
/// Used for block header hashes (double SHA-256 over a fixed layout),
/// transaction hashes (BLAKE3 over the canonical encoding), and state roots.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash (32 zero bytes). Marks root-chain coinbase deposits.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Serialized width of an [`Address`]: 20-byte recipient + 4-byte shard key.
pub const ADDRESS_SERIALIZED_LEN: usize = 24;

/// A shard-aware account address: recipient identity plus shard key.
///
/// Serializes to a fixed 24-byte string (recipient ‖ full_shard_key BE)
/// used as a key prefix by the address-history index.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct Address {
    /// 20-byte recipient identity.
    pub recipient: [u8; 20],
    /// Full shard key selecting the shard this address lives on.
    pub full_shard_key: u32,
}

impl Address {
    pub fn new(recipient: [u8; 20], full_shard_key: u32) -> Self {
        Self { recipient, full_shard_key }
    }

    /// Fixed-width byte form: recipient ‖ full_shard_key (big-endian).
    pub fn serialize(&self) -> [u8; ADDRESS_SERIALIZED_LEN] {
        let mut out = [0u8; ADDRESS_SERIALIZED_LEN];
        out[0..20].copy_from_slice(&self.recipient);
        out[20..24].copy_from_slice(&self.full_shard_key.to_be_bytes());
        out
    }
}

/// Identity of one shard: which slice of the shard-key space it owns.
///
/// `shard_size` must be a power of two; a shard key belongs to this branch
/// when its low bits (mod `shard_size`) equal `shard_id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Number of shards in this chain (power of two).
    pub shard_size: u32,
    /// This shard's index within `0..shard_size`.
    pub shard_id: u32,
}

impl Branch {
    pub fn new(shard_size: u32, shard_id: u32) -> Self {
        debug_assert!(shard_size.is_power_of_two());
        debug_assert!(shard_id < shard_size);
        Self { shard_size, shard_id }
    }

    /// Whether a full shard key routes to this shard.
    pub fn is_in_branch(&self, full_shard_key: u32) -> bool {
        full_shard_key & (self.shard_size - 1) == self.shard_id
    }

    /// Combined identifier used in logs and config lookups.
    pub fn full_shard_id(&self) -> u32 {
        self.shard_size | self.shard_id
    }
}

/// A value-transfer transaction executed on this shard.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    /// Sender recipient identity (20 bytes).
    pub sender: [u8; 20],
    /// Recipient identity. `None` for smart-contract deployment.
    pub to: Option<[u8; 20]>,
    /// Shard key of the sender.
    pub from_full_shard_key: u32,
    /// Shard key of the recipient.
    pub to_full_shard_key: u32,
    /// Transferred value.
    pub value: u64,
    /// Token paying for gas.
    pub gas_token_id: u64,
    /// Token being transferred.
    pub transfer_token_id: u64,
    /// Sender nonce.
    pub nonce: u64,
    /// Contract call data or deployment code.
    pub payload: Vec<u8>,
}

impl Transaction {
    /// Compute the transaction hash (BLAKE3 of the canonical encoding).
    pub fn hash(&self) -> Result<Hash256, CodecError> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CodecError::Serialization(e.to_string()))?;
        Ok(Hash256(blake3::hash(&encoded).into()))
    }

    /// Sender as a shard-aware address.
    pub fn from_address(&self) -> Address {
        Address::new(self.sender, self.from_full_shard_key)
    }

    /// Recipient as a shard-aware address, if any.
    pub fn to_address(&self) -> Option<Address> {
        self.to.map(|to| Address::new(to, self.to_full_shard_key))
    }
}

/// Execution outcome for one transaction, produced by the execution layer.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Receipt {
    /// Whether execution succeeded.
    pub success: bool,
    /// Gas consumed.
    pub gas_used: u64,
}

/// Header of a root-chain block.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct RootBlockHeader {
    /// Protocol version.
    pub version: u32,
    /// Root-chain height.
    pub height: u32,
    /// Unix timestamp in seconds.
    pub create_time: u64,
    /// Hash of the previous root block header.
    pub hash_prev_block: Hash256,
    /// Merkle root over the confirmed minor block headers.
    pub hash_merkle_root: Hash256,
}

impl RootBlockHeader {
    const HASH_SIZE: usize = 4 + 4 + 8 + 32 + 32;

    /// Compute the header hash (double SHA-256 over a fixed byte layout).
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(Self::HASH_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(&self.height.to_le_bytes());
        data.extend_from_slice(&self.create_time.to_le_bytes());
        data.extend_from_slice(self.hash_prev_block.as_bytes());
        data.extend_from_slice(self.hash_merkle_root.as_bytes());
        let first = Sha256::digest(&data);
        Hash256(Sha256::digest(first).into())
    }
}

/// A root-chain block: header plus the minor headers it confirms.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct RootBlock {
    pub header: RootBlockHeader,
    /// Minor block headers confirmed by this root block, across all shards.
    pub minor_block_headers: Vec<MinorBlockHeader>,
}

/// Header of a shard-chain (minor) block.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct MinorBlockHeader {
    /// Protocol version.
    pub version: u32,
    /// Shard-chain height.
    pub height: u32,
    /// Unix timestamp in seconds.
    pub create_time: u64,
    /// Hash of the previous minor block header.
    pub hash_prev_minor_block: Hash256,
    /// Merkle root over the block's transactions.
    pub hash_merkle_root: Hash256,
}

impl MinorBlockHeader {
    const HASH_SIZE: usize = 4 + 4 + 8 + 32 + 32;

    /// Compute the header hash (double SHA-256 over a fixed byte layout).
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(Self::HASH_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(&self.height.to_le_bytes());
        data.extend_from_slice(&self.create_time.to_le_bytes());
        data.extend_from_slice(self.hash_prev_minor_block.as_bytes());
        data.extend_from_slice(self.hash_merkle_root.as_bytes());
        let first = Sha256::digest(&data);
        Hash256(Sha256::digest(first).into())
    }
}

/// Per-block auxiliary metadata, keyed by the block's header hash.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct MinorBlockMeta {
    /// EVM state trie root after executing this block.
    pub hash_evm_state_root: Hash256,
    /// Receipt trie root for this block.
    pub hash_evm_receipt_root: Hash256,
}

/// A complete shard-chain block: header, metadata, transactions, receipts.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct MinorBlock {
    pub header: MinorBlockHeader,
    pub meta: MinorBlockMeta,
    /// Ordered transaction list.
    pub tx_list: Vec<Transaction>,
    /// Execution receipts, one per transaction, in tx order.
    pub receipts: Vec<Receipt>,
}

impl MinorBlock {
    /// Receipt for the transaction at `index`, if the block has one.
    pub fn receipt(&self, index: usize) -> Option<&Receipt> {
        self.receipts.get(index)
    }
}

/// One inbound value transfer from another shard, credited on this shard.
///
/// A `tx_hash` of all-zero bytes marks a root-chain coinbase credit, which
/// is excluded from address-history indexing.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct CrossShardDeposit {
    /// Hash of the originating transaction; zero for coinbase credits.
    pub tx_hash: Hash256,
    /// Sender on the originating shard.
    pub from_address: Address,
    /// Recipient on this shard.
    pub to_address: Address,
    /// Deposited value.
    pub value: u64,
    /// Token paying for gas.
    pub gas_token_id: u64,
    /// Token being transferred.
    pub transfer_token_id: u64,
}

impl CrossShardDeposit {
    /// Whether this deposit is the root-chain coinbase marker.
    pub fn is_root_coinbase(&self) -> bool {
        self.tx_hash.is_zero()
    }
}

/// Serialized list of cross-shard deposits for one minor block.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct CrossShardDepositList {
    pub deposits: Vec<CrossShardDeposit>,
}

impl CrossShardDepositList {
    pub fn new(deposits: Vec<CrossShardDeposit>) -> Self {
        Self { deposits }
    }
}

/// Read model assembled on address-history queries. Never persisted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TransactionDetail {
    pub tx_hash: Hash256,
    pub from_address: Address,
    /// `None` for smart-contract deployment.
    pub to_address: Option<Address>,
    pub value: u64,
    pub block_height: u32,
    pub timestamp: u64,
    pub success: bool,
    pub gas_token_id: u64,
    pub transfer_token_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            sender: [0x11; 20],
            to: Some([0x22; 20]),
            from_full_shard_key: 0,
            to_full_shard_key: 1,
            value: 1_000,
            gas_token_id: 0,
            transfer_token_id: 0,
            nonce: 7,
            payload: vec![],
        }
    }

    fn sample_minor_header() -> MinorBlockHeader {
        MinorBlockHeader {
            version: 1,
            height: 5,
            create_time: 1_700_000_000,
            hash_prev_minor_block: Hash256([0xAA; 32]),
            hash_merkle_root: Hash256::ZERO,
        }
    }

    // --- Hash256 ---

    #[test]
    fn hash256_zero_is_zero() {
        assert!(Hash256::ZERO.is_zero());
        assert_eq!(Hash256::ZERO, Hash256::default());
    }

    #[test]
    fn hash256_display_hex() {
        let s = format!("{}", Hash256([0xAB; 32]));
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(&s[0..2], "ab");
    }

    // --- Address ---

    #[test]
    fn address_serialized_width() {
        let addr = Address::new([0x01; 20], 0xDEADBEEF);
        let bytes = addr.serialize();
        assert_eq!(bytes.len(), ADDRESS_SERIALIZED_LEN);
        assert_eq!(&bytes[0..20], &[0x01; 20]);
        assert_eq!(&bytes[20..24], &0xDEADBEEFu32.to_be_bytes());
    }

    #[test]
    fn address_serialize_orders_by_recipient_first() {
        let a = Address::new([0x01; 20], u32::MAX).serialize();
        let b = Address::new([0x02; 20], 0).serialize();
        assert!(a < b);
    }

    // --- Branch ---

    #[test]
    fn branch_membership() {
        let branch = Branch::new(4, 1);
        assert!(branch.is_in_branch(1));
        assert!(branch.is_in_branch(5));
        assert!(branch.is_in_branch(0xFFFF_FFFD));
        assert!(!branch.is_in_branch(0));
        assert!(!branch.is_in_branch(2));
    }

    #[test]
    fn branch_full_shard_id() {
        assert_eq!(Branch::new(4, 1).full_shard_id(), 5);
        assert_eq!(Branch::new(1, 0).full_shard_id(), 1);
    }

    // --- Transaction ---

    #[test]
    fn tx_hash_deterministic() {
        let tx = sample_tx();
        assert_eq!(tx.hash().unwrap(), tx.hash().unwrap());
    }

    #[test]
    fn tx_hash_changes_with_data() {
        let tx1 = sample_tx();
        let mut tx2 = sample_tx();
        tx2.nonce += 1;
        assert_ne!(tx1.hash().unwrap(), tx2.hash().unwrap());
    }

    #[test]
    fn tx_addresses() {
        let tx = sample_tx();
        assert_eq!(tx.from_address(), Address::new([0x11; 20], 0));
        assert_eq!(tx.to_address(), Some(Address::new([0x22; 20], 1)));

        let mut deploy = sample_tx();
        deploy.to = None;
        assert_eq!(deploy.to_address(), None);
    }

    // --- Headers ---

    #[test]
    fn minor_header_hash_deterministic() {
        let h = sample_minor_header();
        assert_eq!(h.hash(), h.hash());
    }

    #[test]
    fn minor_header_hash_changes_with_height() {
        let h1 = sample_minor_header();
        let mut h2 = h1.clone();
        h2.height += 1;
        assert_ne!(h1.hash(), h2.hash());
    }

    #[test]
    fn root_header_hash_is_nonzero() {
        let h = RootBlockHeader {
            version: 1,
            height: 0,
            create_time: 0,
            hash_prev_block: Hash256::ZERO,
            hash_merkle_root: Hash256::ZERO,
        };
        assert!(!h.hash().is_zero());
    }

    // --- Deposits ---

    #[test]
    fn deposit_coinbase_marker() {
        let mut dep = CrossShardDeposit {
            tx_hash: Hash256::ZERO,
            from_address: Address::new([0; 20], 0),
            to_address: Address::new([1; 20], 0),
            value: 10,
            gas_token_id: 0,
            transfer_token_id: 0,
        };
        assert!(dep.is_root_coinbase());
        dep.tx_hash = Hash256([1; 32]);
        assert!(!dep.is_root_coinbase());
    }

    // --- Bincode round-trips ---

    #[test]
    fn bincode_round_trip_minor_block() {
        let block = MinorBlock {
            header: sample_minor_header(),
            meta: MinorBlockMeta {
                hash_evm_state_root: Hash256([0x33; 32]),
                hash_evm_receipt_root: Hash256([0x44; 32]),
            },
            tx_list: vec![sample_tx()],
            receipts: vec![Receipt { success: true, gas_used: 21_000 }],
        };
        let encoded = bincode::encode_to_vec(&block, bincode::config::standard()).unwrap();
        let (decoded, _): (MinorBlock, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn bincode_round_trip_deposit_list() {
        let list = CrossShardDepositList::new(vec![CrossShardDeposit {
            tx_hash: Hash256([9; 32]),
            from_address: Address::new([2; 20], 3),
            to_address: Address::new([4; 20], 5),
            value: 77,
            gas_token_id: 1,
            transfer_token_id: 2,
        }]);
        let encoded = bincode::encode_to_vec(&list, bincode::config::standard()).unwrap();
        let (decoded, _): (CrossShardDepositList, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(list, decoded);
    }
}
