use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while constructing or validating the small fixed
/// identifiers used throughout a tree.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PrimitiveError {
    #[error("document id exceeds the 255-byte limit ({0} bytes)")]
    DocIdTooLong(usize),
    #[error("version size {0} is out of the supported range 1..=6")]
    SizeOutOfRange(usize),
    #[error("version id length {actual} does not match configured size {expected}")]
    VersionIdLengthMismatch { expected: usize, actual: usize },
}

/// Maximum byte length of a document identity (spec: "≤255 bytes").
pub const MAX_DOC_ID_LEN: usize = 255;

/// Maximum supported `vSize` / `iSize`.
pub const MAX_SIZE: usize = 6;

/// Opaque document identity. Treated as an unsigned byte sequence of at
/// most 255 bytes; never interpreted.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct DocId(Box<[u8]>);

impl DocId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, PrimitiveError> {
        let bytes = bytes.into();
        if bytes.len() > MAX_DOC_ID_LEN {
            return Err(PrimitiveError::DocIdTooLong(bytes.len()));
        }
        Ok(Self(bytes.into_boxed_slice()))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocId({})", hex::encode(&self.0))
    }
}

impl AsRef<[u8]> for DocId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A version identifier: exactly `vSize` bytes (1..=6), either random
/// (fresh local change) or content-derived (merges). Perspective versions
/// carry whatever the peer assigned verbatim.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct VersionId {
    bytes: [u8; MAX_SIZE],
    len: u8,
}

impl VersionId {
    pub fn from_slice(slice: &[u8]) -> Result<Self, PrimitiveError> {
        if slice.is_empty() || slice.len() > MAX_SIZE {
            return Err(PrimitiveError::SizeOutOfRange(slice.len()));
        }
        let mut bytes = [0_u8; MAX_SIZE];
        bytes[..slice.len()].copy_from_slice(slice);
        Ok(Self {
            bytes,
            len: slice.len() as u8,
        })
    }

    /// Generates a fresh random version id of the given size, for brand-new
    /// local changes (spec §3.2 invariant 4: "random" versions).
    #[must_use]
    pub fn random(v_size: usize) -> Self {
        let mut bytes = [0_u8; MAX_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes[..v_size]);
        Self {
            bytes,
            len: v_size as u8,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn check_size(&self, v_size: usize) -> Result<(), PrimitiveError> {
        if self.len() != v_size {
            return Err(PrimitiveError::VersionIdLengthMismatch {
                expected: v_size,
                actual: self.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionId({})", hex::encode(self.as_bytes()))
    }
}

impl AsRef<[u8]> for VersionId {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// The name of a perspective (peer). Interned as a plain owned string; the
/// local and stage trees use the reserved names `"local"`/`"stage"` and
/// reject a perspective registering under either (spec §4.2.2
/// `NameCollision`).
pub type PerspectiveName = String;

pub const LOCAL_TREE_NAME: &str = "local";
pub const STAGE_TREE_NAME: &str = "stage";

/// Monotonic insertion index, always serialized as exactly `iSize`
/// big-endian bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct InsertionIndex(pub u64);

impl InsertionIndex {
    #[must_use]
    pub fn to_be_bytes(self, i_size: usize) -> Vec<u8> {
        let full = self.0.to_be_bytes();
        full[full.len() - i_size..].to_vec()
    }

    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        let mut full = [0_u8; 8];
        full[8 - bytes.len()..].copy_from_slice(bytes);
        Self(u64::from_be_bytes(full))
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}
