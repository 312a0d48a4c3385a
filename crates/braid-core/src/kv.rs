//! Ordered byte-string key-value store interface and in-memory implementation.
//!
//! Provides the [`KvStore`] trait consumed by the shard db operator. The
//! [`MemoryKv`] implementation is suitable for testing; the production
//! engine uses RocksDB (braid-db).
//!
//! Keys sort lexicographically as raw bytes. The shard db's key schema is
//! designed so that this order encodes chronological and per-address order,
//! which is why the trait exposes a descending range scan.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::StoreError;

/// One key/value pair yielded by a range scan.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Ordered byte-string store with point operations and reverse range scans.
///
/// Not thread-safe by contract — the shard db assumes a single logical
/// owner per shard (callers wrap in a lock if they must share).
pub trait KvStore: Send {
    /// Store `value` under `key`, replacing any existing value.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Look up `key`. Returns `None` if absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Delete `key`. Deleting an absent key is a no-op.
    fn remove(&mut self, key: &[u8]) -> Result<(), StoreError>;

    /// Check whether `key` is present.
    ///
    /// Default implementation delegates to [`get`](Self::get).
    fn contains(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Iterate keys in `(end, start]` in descending lexicographic order.
    ///
    /// `start` is the inclusive upper bound, `end` the exclusive lower
    /// bound. Yields nothing when `start < end`. The scan observes a
    /// consistent snapshot for its duration.
    fn reversed_range_iter<'a>(
        &'a self,
        start: &[u8],
        end: &[u8],
    ) -> Box<dyn Iterator<Item = Result<KvPair, StoreError>> + 'a>;
}

/// In-memory [`KvStore`] backed by a `BTreeMap`. For tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryKv {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl KvStore for MemoryKv {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.map.get(key).cloned())
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.map.remove(key);
        Ok(())
    }

    fn contains(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.map.contains_key(key))
    }

    fn reversed_range_iter<'a>(
        &'a self,
        start: &[u8],
        end: &[u8],
    ) -> Box<dyn Iterator<Item = Result<KvPair, StoreError>> + 'a> {
        if start < end {
            return Box::new(std::iter::empty());
        }
        let range = self
            .map
            .range::<[u8], _>((Bound::Excluded(end), Bound::Included(start)));
        Box::new(range.rev().map(|(k, v)| Ok((k.clone(), v.clone()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(store: &MemoryKv, start: &[u8], end: &[u8]) -> Vec<Vec<u8>> {
        store
            .reversed_range_iter(start, end)
            .map(|item| item.unwrap().0)
            .collect()
    }

    #[test]
    fn put_get_remove() {
        let mut kv = MemoryKv::new();
        kv.put(b"a", b"1").unwrap();
        assert_eq!(kv.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert!(kv.contains(b"a").unwrap());

        kv.put(b"a", b"2").unwrap();
        assert_eq!(kv.get(b"a").unwrap(), Some(b"2".to_vec()));

        kv.remove(b"a").unwrap();
        assert_eq!(kv.get(b"a").unwrap(), None);
        assert!(!kv.contains(b"a").unwrap());
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut kv = MemoryKv::new();
        kv.remove(b"missing").unwrap();
        assert!(kv.is_empty());
    }

    #[test]
    fn reversed_range_is_descending() {
        let mut kv = MemoryKv::new();
        for k in [b"k1", b"k2", b"k3", b"k4"] {
            kv.put(k, b"").unwrap();
        }
        let keys = collect(&kv, b"k9", b"k0");
        assert_eq!(keys, vec![b"k4".to_vec(), b"k3".to_vec(), b"k2".to_vec(), b"k1".to_vec()]);
    }

    #[test]
    fn reversed_range_bounds() {
        let mut kv = MemoryKv::new();
        for k in [b"k1", b"k2", b"k3"] {
            kv.put(k, b"").unwrap();
        }
        // start inclusive, end exclusive
        let keys = collect(&kv, b"k2", b"k1");
        assert_eq!(keys, vec![b"k2".to_vec()]);
    }

    #[test]
    fn reversed_range_inverted_is_empty() {
        let mut kv = MemoryKv::new();
        kv.put(b"k1", b"").unwrap();
        assert!(collect(&kv, b"a", b"z").is_empty());
    }

    #[test]
    fn reversed_range_equal_bounds_is_empty() {
        let mut kv = MemoryKv::new();
        kv.put(b"k1", b"").unwrap();
        assert!(collect(&kv, b"k1", b"k1").is_empty());
    }
}
