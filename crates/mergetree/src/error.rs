use perspectivedb_primitives::PerspectiveName;
use perspectivedb_store::StoreError;
use perspectivedb_tree::TreeError;
use thiserror::Error;

use crate::hooks::HookError;

/// Errors raised across a `MergeTree`'s write paths (spec §7). This is the
/// single error type callers see regardless of which layer failed,
/// shallow-wrapping each layer's own error the same way `calimero_dag`'s
/// `DagError` wraps `ApplyError`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MergeTreeError {
    #[error("unknown perspective: {0}")]
    UnknownPerspective(PerspectiveName),

    #[error("perspective name collides with a reserved tree name: {0}")]
    NameCollision(PerspectiveName),

    #[error("local tree has more than one non-conflicting head for this id")]
    LocalForkDetected,

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Merge(#[from] perspectivedb_merge::MergeError<TreeError>),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
