//! RocksDB-backed [`KvStore`] implementation.
//!
//! A single default column family is enough here: every key carries an
//! ASCII namespace tag, so the schema partitions itself. RocksDB's native
//! lexicographic byte order is exactly the order the key schema relies on,
//! which makes the descending range scan a plain reverse iterator.

use std::path::Path;

use rocksdb::{Direction, IteratorMode, Options, DB};

use braid_core::error::StoreError;
use braid_core::kv::{KvPair, KvStore};

/// RocksDB-backed ordered byte-string store.
pub struct RocksKv {
    db: DB,
}

impl RocksKv {
    /// Open or create a RocksDB database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path.as_ref()).map_err(backend)?;
        Ok(Self { db })
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush().map_err(backend)
    }
}

fn backend(e: rocksdb::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl KvStore for RocksKv {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.db.put(key, value).map_err(backend)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.db.get(key).map_err(backend)
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.db.delete(key).map_err(backend)
    }

    fn reversed_range_iter<'a>(
        &'a self,
        start: &[u8],
        end: &[u8],
    ) -> Box<dyn Iterator<Item = Result<KvPair, StoreError>> + 'a> {
        if start < end {
            return Box::new(std::iter::empty());
        }
        let end = end.to_vec();
        // From(start, Reverse) positions at the last key <= start
        let iter = self
            .db
            .iterator(IteratorMode::From(start, Direction::Reverse))
            .map(|item| {
                item.map(|(k, v)| (k.into_vec(), v.into_vec()))
                    .map_err(backend)
            })
            .take_while(move |item| match item {
                Ok((key, _)) => key.as_slice() > end.as_slice(),
                Err(_) => true,
            });
        Box::new(iter)
    }
}
