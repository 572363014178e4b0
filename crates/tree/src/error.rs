use perspectivedb_primitives::{PrimitiveError, VersionId};
use perspectivedb_store::StoreError;
use thiserror::Error;

/// Errors a Tree's write or read contract can fail with (spec §4.1.2).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TreeError {
    #[error("header is missing a required field for this write path: {0}")]
    InvalidHeader(&'static str),

    #[error("parent version {0:?} does not exist in this tree")]
    MissingParent(VersionId),

    #[error("version {0:?} already exists in this tree")]
    DuplicateVersion(VersionId),

    #[error(transparent)]
    Size(#[from] PrimitiveError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}
