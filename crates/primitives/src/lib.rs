//! Shared value, identity, and hashing primitives for PerspectiveDB's
//! MergeTree subsystem.
//!
//! This crate has no knowledge of storage or merge policy: it only defines
//! the wire-shape of a version (`Header`, `Version`), the opaque structured
//! body (`Value`), and the canonical binary encoding used to derive
//! content-addressed version identifiers.

mod canonical;
mod ids;
mod value;
mod version;

pub use canonical::{canonical_encode, content_hash};
pub use ids::{
    DocId, InsertionIndex, PerspectiveName, PrimitiveError, VersionId, LOCAL_TREE_NAME,
    STAGE_TREE_NAME,
};
pub use value::Value;
pub use version::{Header, Version};
