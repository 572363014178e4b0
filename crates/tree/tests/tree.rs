//! Integration tests for `perspectivedb-tree`'s write contract, head
//! tracking, and insertion-order iteration (spec §4.1), exercised purely
//! through the crate's public API.

use std::sync::Arc;

use perspectivedb_primitives::{DocId, Header, InsertionIndex, Value, Version, VersionId};
use perspectivedb_store::InMemoryDb;
use perspectivedb_tree::{HeadFilter, IterateOpts, Tree, TreeError, TreeConfig};

fn doc(b: &[u8]) -> DocId {
    DocId::new(b.to_vec()).unwrap()
}

fn vid(b: u8) -> VersionId {
    VersionId::from_slice(&[b]).unwrap()
}

fn tree() -> Tree<InMemoryDb> {
    Tree::new(Arc::new(InMemoryDb::new()), "local", TreeConfig::default())
}

fn version(id: DocId, v: VersionId, pa: Vec<VersionId>) -> Version {
    let mut h = Header::new(id);
    h.v = Some(v);
    h.pa = pa;
    Version::new(h, None, Some(Value::map([("a".into(), Value::Int(1))])))
}

#[test]
fn write_assigns_insertion_index_and_is_readable() {
    let t = tree();
    let written = t.write(version(doc(b"d"), vid(1), vec![])).unwrap();
    assert_eq!(written.h.i, Some(InsertionIndex(0)));

    let fetched = t.get_by_version(&vid(1)).unwrap().unwrap();
    assert_eq!(fetched.h.v, Some(vid(1)));
}

#[test]
fn missing_parent_is_rejected() {
    let t = tree();
    let err = t
        .write(version(doc(b"d"), vid(2), vec![vid(1)]))
        .unwrap_err();
    assert!(matches!(err, TreeError::MissingParent(p) if p == vid(1)));
}

#[test]
fn duplicate_version_is_rejected() {
    let t = tree();
    t.write(version(doc(b"d"), vid(1), vec![])).unwrap();
    let err = t.write(version(doc(b"d"), vid(1), vec![])).unwrap_err();
    assert!(matches!(err, TreeError::DuplicateVersion(v) if v == vid(1)));
}

#[test]
fn writing_a_child_retires_the_parent_head() {
    let t = tree();
    t.write(version(doc(b"d"), vid(1), vec![])).unwrap();
    t.write(version(doc(b"d"), vid(2), vec![vid(1)])).unwrap();

    let heads = t.get_heads(&doc(b"d"), HeadFilter::default()).unwrap();
    assert_eq!(heads, vec![vid(2)]);
}

#[test]
fn insertion_order_is_a_linear_extension() {
    let t = tree();
    t.write(version(doc(b"d"), vid(1), vec![])).unwrap();
    t.write(version(doc(b"d"), vid(2), vec![vid(1)])).unwrap();
    t.write(version(doc(b"d"), vid(3), vec![vid(2)])).unwrap();

    let all = t.iterate_insertion_order(IterateOpts::default()).unwrap();
    let order: Vec<_> = all.iter().map(|v| v.h.v.unwrap()).collect();
    assert_eq!(order, vec![vid(1), vid(2), vid(3)]);
}

#[test]
fn set_conflict_flips_head_flag_and_persists_on_header() {
    let t = tree();
    t.write(version(doc(b"d"), vid(1), vec![])).unwrap();
    t.set_conflict_by_version(&vid(1)).unwrap();

    let heads = t
        .get_heads(&doc(b"d"), HeadFilter { skip_conflicts: true, skip_deletes: false })
        .unwrap();
    assert!(heads.is_empty());

    let fetched = t.get_by_version(&vid(1)).unwrap().unwrap();
    assert_eq!(fetched.h.c, Some(true));
}

#[test]
fn concurrent_writes_for_different_ids_never_collide_on_insertion_index() {
    // Spec §5 lets writes to different ids on the same Tree interleave
    // freely; only same-id writes are serialized by `IdLockTable`
    // upstream. Ten threads writing ten distinct ids must still land on
    // ten distinct insertion indexes.
    let t = Arc::new(tree());
    let handles: Vec<_> = (0..10u8)
        .map(|n| {
            let t = t.clone();
            std::thread::spawn(move || {
                t.write(version(doc(&[n]), vid(n), vec![])).unwrap().h.i.unwrap()
            })
        })
        .collect();

    let mut indexes: Vec<InsertionIndex> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    indexes.sort();
    indexes.dedup();
    assert_eq!(indexes.len(), 10);
}

#[test]
fn ancestors_walk_reaches_every_predecessor() {
    let t = tree();
    t.write(version(doc(b"d"), vid(1), vec![])).unwrap();
    t.write(version(doc(b"d"), vid(2), vec![vid(1)])).unwrap();
    t.write(version(doc(b"d"), vid(3), vec![vid(1)])).unwrap();
    t.write(version(doc(b"d"), vid(4), vec![vid(2), vid(3)])).unwrap();

    let mut seen: Vec<VersionId> = t.ancestors(&vid(4)).map(|n| n.unwrap().v).collect();
    seen.sort();
    assert_eq!(seen, vec![vid(1), vid(2), vid(3), vid(4)]);
}
