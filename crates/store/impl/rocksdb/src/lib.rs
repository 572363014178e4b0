//! RocksDB-backed implementation of [`perspectivedb_store::Database`].
//!
//! Grounded on the teacher's `calimero-store-rocksdb` crate and on
//! `calimero-store`'s own rocksdb test fixtures (`StoreConfig`, `open`,
//! the `get`/`put`/`has`/`iter` usage pattern). The tree layout carries
//! only one logical column, so this backend uses RocksDB's default column
//! family rather than standing up column-family machinery the spec has
//! no use for.

use camino::Utf8PathBuf;
use perspectivedb_store::{Batch, Column, Database, DbIterator, Operation, Slice, StoreError};
use rocksdb::{Direction, IteratorMode, WriteBatch, DB};

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: Utf8PathBuf,
}

pub struct RocksDb {
    db: DB,
}

impl RocksDb {
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let db = DB::open_default(config.path.as_str()).map_err(to_store_error)?;
        tracing::debug!(path = %config.path, "opened rocksdb store");
        Ok(Self { db })
    }
}

fn to_store_error(err: rocksdb::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

impl Database for RocksDb {
    type Iter<'a> = RocksIter<'a>;

    fn get(&self, _column: Column, key: Slice<'_>) -> Result<Option<Slice<'static>>, StoreError> {
        Ok(self
            .db
            .get(key.as_ref())
            .map_err(to_store_error)?
            .map(Slice::from))
    }

    fn apply(&self, batch: Batch) -> Result<(), StoreError> {
        let mut write_batch = WriteBatch::default();
        for op in batch.into_ops() {
            match op {
                Operation::Put { key, value, .. } => write_batch.put(key, value),
                Operation::Delete { key, .. } => write_batch.delete(key),
            }
        }
        self.db.write(write_batch).map_err(to_store_error)
    }

    fn iter(&self, _column: Column) -> Result<Self::Iter<'_>, StoreError> {
        Ok(RocksIter {
            db: &self.db,
            cursor: None,
        })
    }

    fn close(&self) -> Result<(), StoreError> {
        // RocksDB closes on drop; nothing to flush explicitly for this
        // subsystem's durability requirements (every write already goes
        // through a WAL-backed WriteBatch).
        Ok(())
    }
}

pub struct RocksIter<'a> {
    db: &'a DB,
    cursor: Option<Vec<u8>>,
}

impl DbIterator for RocksIter<'_> {
    fn seek(&mut self, key: Slice<'_>) -> Result<Option<Slice<'static>>, StoreError> {
        let mut iter = self
            .db
            .iterator(IteratorMode::From(key.as_ref(), Direction::Forward));
        match iter.next() {
            Some(Ok((k, _))) => {
                self.cursor = Some(k.to_vec());
                Ok(Some(Slice::from(k.to_vec())))
            }
            Some(Err(err)) => Err(to_store_error(err)),
            None => {
                self.cursor = None;
                Ok(None)
            }
        }
    }

    fn seek_for_prev(&mut self, key: Slice<'_>) -> Result<Option<Slice<'static>>, StoreError> {
        let mut iter = self
            .db
            .iterator(IteratorMode::From(key.as_ref(), Direction::Reverse));
        match iter.next() {
            Some(Ok((k, _))) => {
                self.cursor = Some(k.to_vec());
                Ok(Some(Slice::from(k.to_vec())))
            }
            Some(Err(err)) => Err(to_store_error(err)),
            None => {
                self.cursor = None;
                Ok(None)
            }
        }
    }

    fn read(&self) -> Result<Slice<'static>, StoreError> {
        let key = self.cursor.as_ref().ok_or(StoreError::IteratorNotPositioned)?;
        let value = self.db.get(key).map_err(to_store_error)?;
        value.map(Slice::from).ok_or(StoreError::IteratorNotPositioned)
    }

    fn advance(&mut self, reverse: bool) -> Result<Option<Slice<'static>>, StoreError> {
        let Some(cursor) = self.cursor.clone() else {
            let mode = if reverse {
                IteratorMode::End
            } else {
                IteratorMode::Start
            };
            let mut iter = self.db.iterator(mode);
            return match iter.next() {
                Some(Ok((k, _))) => {
                    self.cursor = Some(k.to_vec());
                    Ok(Some(Slice::from(k.to_vec())))
                }
                Some(Err(err)) => Err(to_store_error(err)),
                None => Ok(None),
            };
        };

        let direction = if reverse {
            Direction::Reverse
        } else {
            Direction::Forward
        };
        let mut iter = self.db.iterator(IteratorMode::From(&cursor, direction));
        // The first item `IteratorMode::From` yields is the cursor itself;
        // skip it to actually advance.
        let _current = iter.next();
        match iter.next() {
            Some(Ok((k, _))) => {
                self.cursor = Some(k.to_vec());
                Ok(Some(Slice::from(k.to_vec())))
            }
            Some(Err(err)) => Err(to_store_error(err)),
            None => {
                self.cursor = None;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, RocksDb) {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            path: Utf8PathBuf::from_path_buf(dir.path().to_owned()).unwrap(),
        };
        let db = RocksDb::open(&config).unwrap();
        (dir, db)
    }

    #[test]
    fn put_get_has_roundtrip() {
        let (_dir, db) = open_temp();
        let mut batch = Batch::new();
        batch.put(Column::Default, b"k".to_vec(), b"v".to_vec());
        db.apply(batch).unwrap();

        assert!(db.has(Column::Default, Slice::from(&b"k"[..])).unwrap());
        assert_eq!(
            db.get(Column::Default, Slice::from(&b"k"[..])).unwrap().unwrap(),
            Slice::from(&b"v"[..])
        );
    }

    #[test]
    fn iteration_matches_insertion_order() {
        let (_dir, db) = open_temp();
        let mut batch = Batch::new();
        for b1 in 0..3u8 {
            for b2 in 0..3u8 {
                batch.put(Column::Default, vec![b1, b2], vec![b1, b2]);
            }
        }
        db.apply(batch).unwrap();

        let mut iter = db.iter(Column::Default).unwrap();
        let first = iter.seek(Slice::from(&[][..])).unwrap().unwrap();
        assert_eq!(first.as_ref(), &[0, 0]);

        let rest: Vec<_> = perspectivedb_store::entries(iter, false)
            .map(|(k, _)| k.unwrap().into_vec())
            .collect();
        assert_eq!(rest.len(), 8);
        assert_eq!(rest.last().unwrap(), &vec![2, 2]);
    }
}
