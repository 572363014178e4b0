//! Binary key layout for one named Tree (spec §4.1.1).
//!
//! Every key is `name ‖ discriminator-byte ‖ ...`, length-prefixing `name`
//! itself so a tree name can never be confused with another tree's prefix,
//! and length-prefixing `id` wherever an id precedes a `v` so a scan never
//! runs past an id boundary into the next one's keys.

use perspectivedb_primitives::{DocId, InsertionIndex, PerspectiveName, VersionId};

const DS_DISCRIMINANT: u8 = 0x01;
const IK_DISCRIMINANT: u8 = 0x02;
const V_DISCRIMINANT: u8 = 0x03;
const HEAD_DISCRIMINANT: u8 = 0x04;
const US_DISCRIMINANT: u8 = 0x05;
const COUNTER_DISCRIMINANT: u8 = 0x00;

fn prefixed(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + name.len() + 1);
    out.extend_from_slice(&(name.len() as u32).to_be_bytes());
    out.extend_from_slice(name.as_bytes());
    out
}

fn with_id(mut key: Vec<u8>, id: &DocId) -> Vec<u8> {
    key.push(id.as_bytes().len() as u8);
    key.extend_from_slice(id.as_bytes());
    key
}

/// `T ‖ 0x00` — persists the insertion counter across restarts.
pub fn counter_key(name: &str) -> Vec<u8> {
    let mut key = prefixed(name);
    key.push(COUNTER_DISCRIMINANT);
    key
}

/// `T ‖ 0x01 ‖ i` — the canonical record, keyed by insertion order.
pub fn ds_key(name: &str, i: InsertionIndex, i_size: usize) -> Vec<u8> {
    let mut key = prefixed(name);
    key.push(DS_DISCRIMINANT);
    key.extend(i.to_be_bytes(i_size));
    key
}

/// `T ‖ 0x02 ‖ len(id) ‖ id ‖ v` → `i`. Lets a scan enumerate every version
/// of one id without touching `headKey`.
pub fn ik_key(name: &str, id: &DocId, v: &VersionId) -> Vec<u8> {
    let mut key = prefixed(name);
    key.push(IK_DISCRIMINANT);
    let mut key = with_id(key, id);
    key.extend_from_slice(v.as_bytes());
    key
}

/// `T ‖ 0x03 ‖ v` → `i`.
pub fn v_key(name: &str, v: &VersionId) -> Vec<u8> {
    let mut key = prefixed(name);
    key.push(V_DISCRIMINANT);
    key.extend_from_slice(v.as_bytes());
    key
}

/// `T ‖ 0x04 ‖ len(id) ‖ id ‖ v` → flags byte (bit0 = conflict, bit1 = delete).
pub fn head_key(name: &str, id: &DocId, v: &VersionId) -> Vec<u8> {
    let mut key = prefixed(name);
    key.push(HEAD_DISCRIMINANT);
    let mut key = with_id(key, id);
    key.extend_from_slice(v.as_bytes());
    key
}

/// The common prefix of every `headKey` for one id, used as the lower
/// bound of a range scan over that id's heads.
pub fn head_prefix(name: &str, id: &DocId) -> Vec<u8> {
    let mut key = prefixed(name);
    key.push(HEAD_DISCRIMINANT);
    with_id(key, id)
}

/// `T ‖ 0x05 ‖ pe_name` → last `v` seen from that perspective.
pub fn us_key(name: &str, pe: &PerspectiveName) -> Vec<u8> {
    let mut key = prefixed(name);
    key.push(US_DISCRIMINANT);
    key.extend_from_slice(pe.as_bytes());
    key
}

/// The common prefix of every `dsKey`, the lower bound for a full scan of
/// a tree's insertion-order index.
pub fn ds_prefix(name: &str) -> Vec<u8> {
    let mut key = prefixed(name);
    key.push(DS_DISCRIMINANT);
    key
}

/// Flags byte encoding for `headKey` values: bit0 = conflict, bit1 = delete.
pub const FLAG_CONFLICT: u8 = 0b01;
pub const FLAG_DELETE: u8 = 0b10;

pub fn encode_flags(conflict: bool, delete: bool) -> u8 {
    let mut flags = 0;
    if conflict {
        flags |= FLAG_CONFLICT;
    }
    if delete {
        flags |= FLAG_DELETE;
    }
    flags
}

pub fn flags_conflict(flags: u8) -> bool {
    flags & FLAG_CONFLICT != 0
}

pub fn flags_delete(flags: u8) -> bool {
    flags & FLAG_DELETE != 0
}
