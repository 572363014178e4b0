use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{Batch, Column, DbIterator, Operation, Slice, StoreError};

/// A `BTreeMap`-backed [`crate::Database`], used by every other crate's
/// test suite instead of standing up an on-disk backend.
#[derive(Default)]
pub struct InMemoryDb {
    inner: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryDb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl crate::Database for InMemoryDb {
    type Iter<'a> = MemoryIter;

    fn get(&self, _column: Column, key: Slice<'_>) -> Result<Option<Slice<'static>>, StoreError> {
        let guard = self.inner.lock().expect("in-memory store mutex poisoned");
        Ok(guard.get(key.as_ref()).cloned().map(Slice::from))
    }

    fn apply(&self, batch: Batch) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().expect("in-memory store mutex poisoned");
        for op in batch.into_ops() {
            match op {
                Operation::Put { key, value, .. } => {
                    let _ = guard.insert(key, value);
                }
                Operation::Delete { key, .. } => {
                    let _ = guard.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn iter(&self, _column: Column) -> Result<Self::Iter<'_>, StoreError> {
        let guard = self.inner.lock().expect("in-memory store mutex poisoned");
        let entries: Vec<(Vec<u8>, Vec<u8>)> =
            guard.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        Ok(MemoryIter { entries, pos: None })
    }
}

/// A snapshot-based cursor: the whole column is copied out at `iter()`
/// time so later writes never perturb an in-flight scan, matching the
/// isolation a real MVCC-backed store (RocksDB) gives for free.
pub struct MemoryIter {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: Option<usize>,
}

impl DbIterator for MemoryIter {
    fn seek(&mut self, key: Slice<'_>) -> Result<Option<Slice<'static>>, StoreError> {
        let target = key.as_ref();
        let idx = self.entries.partition_point(|(k, _)| k.as_slice() < target);
        if idx < self.entries.len() {
            self.pos = Some(idx);
            Ok(Some(Slice::from(self.entries[idx].0.clone())))
        } else {
            self.pos = None;
            Ok(None)
        }
    }

    fn seek_for_prev(&mut self, key: Slice<'_>) -> Result<Option<Slice<'static>>, StoreError> {
        let target = key.as_ref();
        let idx = self.entries.partition_point(|(k, _)| k.as_slice() <= target);
        if idx == 0 {
            self.pos = None;
            Ok(None)
        } else {
            self.pos = Some(idx - 1);
            Ok(Some(Slice::from(self.entries[idx - 1].0.clone())))
        }
    }

    fn read(&self) -> Result<Slice<'static>, StoreError> {
        let idx = self.pos.ok_or(StoreError::IteratorNotPositioned)?;
        Ok(Slice::from(self.entries[idx].1.clone()))
    }

    fn advance(&mut self, reverse: bool) -> Result<Option<Slice<'static>>, StoreError> {
        let next = match self.pos {
            None if reverse => self.entries.len().checked_sub(1),
            None => (!self.entries.is_empty()).then_some(0),
            Some(p) if reverse => p.checked_sub(1),
            Some(p) => {
                let n = p + 1;
                (n < self.entries.len()).then_some(n)
            }
        };
        self.pos = next;
        Ok(next.map(|p| Slice::from(self.entries[p].0.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[test]
    fn put_get_has_roundtrip() {
        let db = InMemoryDb::new();
        db.apply({
            let mut b = Batch::new();
            b.put(Column::Default, b"k".to_vec(), b"v".to_vec());
            b
        })
        .unwrap();

        assert!(db.has(Column::Default, Slice::from(&b"k"[..])).unwrap());
        assert_eq!(
            db.get(Column::Default, Slice::from(&b"k"[..])).unwrap().unwrap(),
            Slice::from(&b"v"[..])
        );
        assert!(db.get(Column::Default, Slice::from(&b"missing"[..])).unwrap().is_none());
    }

    #[test]
    fn iteration_is_ordered_and_entries_continue_from_seek() {
        let db = InMemoryDb::new();
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
        assert_eq!(iter.read().unwrap().as_ref(), &[0, 0]);

        let rest: Vec<_> = crate::entries(iter, false)
            .map(|(k, v)| (k.unwrap().into_vec(), v.unwrap().into_vec()))
            .collect();
        assert_eq!(rest.len(), 8);
        assert_eq!(rest[0].0, vec![0, 1]);
        assert_eq!(rest.last().unwrap().0, vec![2, 2]);
    }

    #[test]
    fn delete_removes_key() {
        let db = InMemoryDb::new();
        let mut batch = Batch::new();
        batch.put(Column::Default, b"k".to_vec(), b"v".to_vec());
        db.apply(batch).unwrap();

        let mut batch = Batch::new();
        batch.delete(Column::Default, b"k".to_vec());
        db.apply(batch).unwrap();

        assert!(!db.has(Column::Default, Slice::from(&b"k"[..])).unwrap());
    }
}
