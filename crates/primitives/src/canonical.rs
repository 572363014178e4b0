use sha2::{Digest, Sha256};

use crate::ids::{DocId, VersionId};
use crate::value::Value;

fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(0),
        Value::Bool(b) => {
            out.push(1);
            out.push(u8::from(*b));
        }
        Value::Int(i) => {
            out.push(2);
            out.extend_from_slice(&i.to_be_bytes());
        }
        Value::Float(f) => {
            out.push(3);
            out.extend_from_slice(&f.to_bits().to_be_bytes());
        }
        Value::Str(s) => {
            out.push(4);
            encode_bytes(s.as_bytes(), out);
        }
        Value::Bytes(b) => {
            out.push(5);
            encode_bytes(b, out);
        }
        Value::Array(items) => {
            out.push(6);
            out.extend_from_slice(&(items.len() as u32).to_be_bytes());
            for item in items {
                encode_value(item, out);
            }
        }
        Value::Map(entries) => {
            out.push(7);
            out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
            // `Value::map` already sorts by key; encode in that order so
            // the hash never depends on an ad-hoc representation's own
            // iteration order.
            for (k, v) in entries {
                encode_bytes(k.as_bytes(), out);
                encode_value(v, out);
            }
        }
    }
}

/// The canonical binary encoding of a structured value: sorted map keys,
/// length-prefixed strings/bytes, fixed-width explicitly-typed scalars.
/// This is the only encoding ever fed into [`content_hash`] — never a
/// `serde_json`/`borsh` encoding of the same value (spec.md §9).
#[must_use]
pub fn canonical_encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_value(value, &mut out);
    out
}

/// Computes a content-derived version id: the first `v_size` bytes of
/// SHA-256 over the canonical encoding of `{id, pa (sorted), d?, b}`
/// (spec.md §3.2 invariant 4). `v_size` must be in `1..=6`.
///
/// Parents are sorted here — callers must never hash before sorting, per
/// spec.md's "sort-first-hash-last" resolution of the source's historical
/// ambiguity.
#[must_use]
pub fn content_hash(
    id: &DocId,
    pa: &[VersionId],
    d: Option<bool>,
    b: Option<&Value>,
    v_size: usize,
) -> VersionId {
    let mut buf = Vec::new();
    encode_bytes(id.as_bytes(), &mut buf);

    let mut sorted_pa: Vec<&VersionId> = pa.iter().collect();
    sorted_pa.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
    buf.extend_from_slice(&(sorted_pa.len() as u32).to_be_bytes());
    for p in sorted_pa {
        encode_bytes(p.as_bytes(), &mut buf);
    }

    buf.push(match d {
        Some(true) => 1,
        Some(false) => 0,
        None => 2,
    });

    match b {
        Some(v) => {
            buf.push(1);
            buf.extend_from_slice(&canonical_encode(v));
        }
        None => buf.push(0),
    }

    let digest = Sha256::digest(&buf);
    VersionId::from_slice(&digest[..v_size]).expect("v_size is validated to be in 1..=6")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(bytes: &[u8]) -> DocId {
        DocId::new(bytes.to_vec()).unwrap()
    }

    fn vid(b: u8) -> VersionId {
        VersionId::from_slice(&[b]).unwrap()
    }

    #[test]
    fn deterministic_across_parent_order() {
        let id = doc(b"x");
        let b = Value::Int(1);
        let h1 = content_hash(&id, &[vid(1), vid(2)], None, Some(&b), 6);
        let h2 = content_hash(&id, &[vid(2), vid(1)], None, Some(&b), 6);
        assert_eq!(h1, h2, "content hash must not depend on caller-supplied parent order");
    }

    #[test]
    fn differs_on_body_change() {
        let id = doc(b"x");
        let h1 = content_hash(&id, &[], None, Some(&Value::Int(1)), 6);
        let h2 = content_hash(&id, &[], None, Some(&Value::Int(2)), 6);
        assert_ne!(h1, h2);
    }

    #[test]
    fn map_key_order_does_not_affect_hash() {
        let id = doc(b"x");
        let a = Value::map([("a".into(), Value::Int(1)), ("b".into(), Value::Int(2))]);
        let b = Value::map([("b".into(), Value::Int(2)), ("a".into(), Value::Int(1))]);
        let h1 = content_hash(&id, &[], None, Some(&a), 6);
        let h2 = content_hash(&id, &[], None, Some(&b), 6);
        assert_eq!(h1, h2);
    }
}
