use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::ids::{DocId, InsertionIndex, PerspectiveName, VersionId};
use crate::value::Value;

/// A version's header (spec.md §3.1). Fields are `Option` to reflect that
/// different write paths populate different subsets: a fresh local write
/// supplies none of `v`/`pa`/`i`, a perspective write must supply `v`/`pa`,
/// and `i` is assigned by the Tree on every path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Header {
    pub id: DocId,
    pub v: Option<VersionId>,
    pub pa: Vec<VersionId>,
    pub pe: Option<PerspectiveName>,
    pub i: Option<InsertionIndex>,
    pub d: Option<bool>,
    pub c: Option<bool>,
}

impl Header {
    #[must_use]
    pub fn new(id: DocId) -> Self {
        Self {
            id,
            v: None,
            pa: Vec::new(),
            pe: None,
            i: None,
            d: None,
            c: None,
        }
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.d.unwrap_or(false)
    }

    #[must_use]
    pub fn is_conflicting(&self) -> bool {
        self.c.unwrap_or(false)
    }
}

/// A version: `{h, m?, b?}` (spec.md §3.1). `b` is absent on tombstones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Version {
    pub h: Header,
    pub m: Option<Value>,
    pub b: Option<Value>,
}

impl Version {
    #[must_use]
    pub fn new(h: Header, m: Option<Value>, b: Option<Value>) -> Self {
        Self { h, m, b }
    }
}
