//! The KV backing store abstraction (spec.md §6.1): an ordered key-value
//! store with atomic batch writes, range iteration, and point reads over
//! binary keys and binary values.
//!
//! This crate only defines the trait and an in-memory reference
//! implementation for tests; [`perspectivedb-store-rocksdb`] supplies the
//! on-disk backend.

mod batch;
mod error;
mod memory;
mod slice;

pub use batch::{Batch, Operation};
pub use error::StoreError;
pub use memory::InMemoryDb;
pub use slice::Slice;

/// A single logical keyspace. The teacher workspace's store crate carries
/// several column families; this subsystem persists everything in one
/// ordered store (spec.md §6.3: "Nothing else"), so there is exactly one
/// column — kept as an enum rather than removed entirely so a future
/// on-disk backend can still map it onto a real column family without a
/// signature change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Default,
}

/// The KV store contract every backend (in-memory, RocksDB, ...) must
/// satisfy. Generic code is parameterized over `D: Database` rather than
/// using a trait object, so each backend's iterator can be its own
/// zero-cost concrete type.
pub trait Database: Send + Sync {
    type Iter<'a>: DbIterator
    where
        Self: 'a;

    fn get(&self, column: Column, key: Slice<'_>) -> Result<Option<Slice<'static>>, StoreError>;

    fn has(&self, column: Column, key: Slice<'_>) -> Result<bool, StoreError> {
        Ok(self.get(column, key)?.is_some())
    }

    /// Applies every operation in `batch` as a single atomic unit (spec.md
    /// §4.1.2: "one atomic commit per version; no partial updates").
    fn apply(&self, batch: Batch) -> Result<(), StoreError>;

    fn iter(&self, column: Column) -> Result<Self::Iter<'_>, StoreError>;

    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A positionable cursor over one column's keyspace, ordered
/// lexicographically by key.
pub trait DbIterator {
    /// Positions the cursor at the first key `>= key`. Returns that key if
    /// found.
    fn seek(&mut self, key: Slice<'_>) -> Result<Option<Slice<'static>>, StoreError>;

    /// Positions the cursor at the last key `<= key`. Returns that key if
    /// found. Used for reverse scans and upper-bounded ranges.
    fn seek_for_prev(&mut self, key: Slice<'_>) -> Result<Option<Slice<'static>>, StoreError>;

    /// Reads the value at the current cursor position. Fails if the
    /// cursor is not positioned.
    fn read(&self) -> Result<Slice<'static>, StoreError>;

    /// Moves the cursor one step (forward unless `reverse`), returning the
    /// new key, or `None` once the keyspace is exhausted.
    fn advance(&mut self, reverse: bool) -> Result<Option<Slice<'static>>, StoreError>;
}

/// Turns a positioned iterator into a standard Rust iterator of
/// `(key, value)` pairs, advancing before each yield — mirroring the
/// teacher store's `DbIterator::entries()` helper, which the caller
/// typically combines with one manual `seek` to establish the starting
/// position.
pub fn entries<I: DbIterator>(
    mut iter: I,
    reverse: bool,
) -> impl Iterator<Item = (Result<Slice<'static>, StoreError>, Result<Slice<'static>, StoreError>)>
{
    std::iter::from_fn(move || match iter.advance(reverse) {
        Ok(Some(key)) => {
            let value = iter.read();
            Some((Ok(key), value))
        }
        Ok(None) => None,
        Err(err) => Some((Err(err), Err(StoreError::IteratorNotPositioned))),
    })
}
