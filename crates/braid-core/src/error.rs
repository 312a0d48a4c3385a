//! Error types for the Braid shard persistence engine.
use thiserror::Error;

use crate::types::Hash256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("backend: {0}")] Backend(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("serialization: {0}")] Serialization(String),
    #[error("deserialization: {0}")] Deserialization(String),
}

/// Failures of the shard db operator.
///
/// Not-found conditions are never errors here; they surface as `None` or
/// empty results. These variants cover backend faults, codec faults, and
/// store inconsistencies that callers must not silently tolerate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShardDbError {
    #[error(transparent)] Store(#[from] StoreError),
    #[error(transparent)] Codec(#[from] CodecError),
    #[error("corrupt record under {key}: expected {expected} bytes, got {got}")]
    CorruptRecord { key: String, expected: usize, got: usize },
    #[error("missing ancestor block: {hash}")] MissingAncestor { hash: Hash256 },
    #[error("indexed block missing at height {height}")] MissingIndexedBlock { height: u32 },
    #[error("history entry {index} out of range for block at height {height}")]
    HistoryEntryOutOfRange { height: u32, index: u32 },
}

#[derive(Error, Debug)]
pub enum BraidError {
    #[error(transparent)] Store(#[from] StoreError),
    #[error(transparent)] Codec(#[from] CodecError),
    #[error(transparent)] ShardDb(#[from] ShardDbError),
}
