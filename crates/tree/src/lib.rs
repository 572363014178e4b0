//! A single named DAG namespace inside a shared, ordered key-value store
//! (spec §4.1): key encoding, the append-only write contract, head
//! tracking, and lookups by identity, version, or insertion order.
//!
//! Grounded on `calimero-dag`'s head-tracking idiom (`DagStore` keeps a
//! `HashSet` of current heads and updates it on every insert) adapted to
//! a persisted, KV-store-backed DAG rather than an in-memory one, and on
//! `calimero-store`'s column/key-scan conventions for the index layout.

mod config;
mod error;
mod key;
mod tree;

pub use config::TreeConfig;
pub use error::TreeError;
pub use tree::{AncestorIter, HeadFilter, IterateOpts, Tree};
