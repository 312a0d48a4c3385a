//! # braid-core
//! Foundation types, errors, and the ordered key-value store abstraction
//! for the Braid shard persistence engine.

pub mod error;
pub mod kv;
pub mod types;
