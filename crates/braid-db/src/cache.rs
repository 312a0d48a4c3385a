//! Bounded in-memory pools for headers and block metadata.
//!
//! The store is always the source of truth; these pools only accelerate
//! repeated lookups. Each pool is a fixed-capacity LRU sized from
//! [`ShardDbConfig`](crate::config::ShardDbConfig), so memory stays bounded
//! during ordinary operation, not just at recovery time.
//!
//! The height→hash-set map is deliberately unbounded and append-only: it
//! counts every minor block ever seen at a height (a fork/waste metric)
//! and is never pruned, even when a block's positional index is removed.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;

use lru::LruCache;

use braid_core::types::{Hash256, MinorBlockHeader, MinorBlockMeta, RootBlockHeader};

pub(crate) struct HeaderCache {
    minor_headers: LruCache<Hash256, MinorBlockHeader>,
    minor_metas: LruCache<Hash256, MinorBlockMeta>,
    root_headers: LruCache<Hash256, RootBlockHeader>,
    height_to_minor_hashes: HashMap<u32, HashSet<Hash256>>,
}

fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

impl HeaderCache {
    pub fn new(max_root_blocks: usize, max_minor_blocks: usize) -> Self {
        Self {
            minor_headers: LruCache::new(capacity(max_minor_blocks)),
            minor_metas: LruCache::new(capacity(max_minor_blocks)),
            root_headers: LruCache::new(capacity(max_root_blocks)),
            height_to_minor_hashes: HashMap::new(),
        }
    }

    pub fn put_root_header(&mut self, hash: Hash256, header: RootBlockHeader) {
        self.root_headers.put(hash, header);
    }

    pub fn root_header(&mut self, hash: &Hash256) -> Option<RootBlockHeader> {
        self.root_headers.get(hash).cloned()
    }

    pub fn contains_root_header(&self, hash: &Hash256) -> bool {
        self.root_headers.contains(hash)
    }

    pub fn root_header_count(&self) -> usize {
        self.root_headers.len()
    }

    pub fn put_minor_header(&mut self, hash: Hash256, header: MinorBlockHeader) {
        self.minor_headers.put(hash, header);
    }

    pub fn minor_header(&mut self, hash: &Hash256) -> Option<MinorBlockHeader> {
        self.minor_headers.get(hash).cloned()
    }

    pub fn contains_minor_header(&self, hash: &Hash256) -> bool {
        self.minor_headers.contains(hash)
    }

    pub fn minor_header_count(&self) -> usize {
        self.minor_headers.len()
    }

    pub fn put_minor_meta(&mut self, hash: Hash256, meta: MinorBlockMeta) {
        self.minor_metas.put(hash, meta);
    }

    pub fn minor_meta(&mut self, hash: &Hash256) -> Option<MinorBlockMeta> {
        self.minor_metas.get(hash).copied()
    }

    /// Record that a minor block was seen at `height`. Entries accumulate
    /// for the lifetime of the operator and are never removed.
    pub fn record_minor_hash_at_height(&mut self, height: u32, hash: Hash256) {
        self.height_to_minor_hashes.entry(height).or_default().insert(hash);
    }

    /// Number of distinct minor blocks ever seen at `height`.
    pub fn block_count_at_height(&mut self, height: u32) -> usize {
        self.height_to_minor_hashes.entry(height).or_default().len()
    }
}
