//! The MergeTree subsystem: composes one local Tree, one stage Tree, and
//! N perspective Trees over a shared KV store, and implements the local
//! and remote write pipelines, the staging step, the recursive three-way
//! merge dispatch, the merge/conflict handler contracts, the auto-merge
//! loop, and the filter/hook projection stream.
//!
//! Grounded throughout on `calimero-network-core`'s composing-struct and
//! capability-trait idioms: a central struct owns several store-backed
//! components and delegates policy decisions (here, conflict resolution
//! and durable commit) to host-supplied traits rather than baking them in.

mod ancestor;
mod config;
mod error;
mod exchange;
mod filter;
mod handlers;
mod hooks;
mod lock;
mod merge_tree;
mod projection;

pub use ancestor::StageOverLocal;
pub use config::MergeTreeConfig;
pub use error::MergeTreeError;
pub use exchange::{CodecError, ControlRequest, ControlResponse, DataRequest, VersionCodec};
pub use filter::BodyFilter;
pub use handlers::{ConflictHandler, DefaultConflictHandler, MergeHandler};
pub use hooks::{hide, run_chain, Hide, Hook, HookError};
pub use lock::IdLockTable;
pub use merge_tree::{AutoMergeCloseHandle, MergeTree, PerspectiveConfig};
pub use projection::{CloseHandle, ProjectionError, ProjectionOpts, ProjectionStream};
