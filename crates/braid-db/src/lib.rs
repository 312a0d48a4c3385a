//! # braid-db
//! Shard persistence and indexing engine.
//!
//! Sits directly on an ordered byte key-value store ([`braid_core::kv::KvStore`])
//! and records root-chain and shard-chain blocks, maintains derived indexes
//! (transaction-by-hash, transaction-by-address, cross-shard deposit lists,
//! cumulative transaction counts), and rebuilds a bounded in-memory header
//! window after restart:
//! - [`operator::ShardDb`]: the per-shard persistence operator
//! - [`rocks::RocksKv`]: production RocksDB store backend
//! - [`config::ShardDbConfig`]: cache bounds and feature gating
//! - [`keys`]: the fixed-layout byte-key schema

mod cache;
pub mod config;
mod history;
pub mod keys;
pub mod operator;
pub mod rocks;

pub use config::ShardDbConfig;
pub use operator::ShardDb;
pub use rocks::RocksKv;
