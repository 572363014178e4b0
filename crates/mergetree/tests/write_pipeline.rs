//! Integration tests for `MergeTree`'s local/remote write pipelines and
//! the merge dispatch (spec §4.2, §5).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use perspectivedb_mergetree::{
    DefaultConflictHandler, MergeHandler, MergeTree, MergeTreeConfig, MergeTreeError,
    PerspectiveConfig,
};
use perspectivedb_primitives::{DocId, Header, PerspectiveName, Value, Version, VersionId};
use perspectivedb_store::InMemoryDb;

struct RecordingMergeHandler {
    merges: Mutex<Vec<Version>>,
}

impl RecordingMergeHandler {
    fn new() -> Self {
        Self { merges: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl MergeHandler for RecordingMergeHandler {
    async fn on_merge(&self, merged: &Version, _local_head: Option<&Version>) {
        self.merges.lock().unwrap().push(merged.clone());
    }
}

fn doc() -> DocId {
    DocId::new(b"d".to_vec()).unwrap()
}

fn build(db: Arc<InMemoryDb>) -> (MergeTree<InMemoryDb>, Arc<RecordingMergeHandler>) {
    let handler = Arc::new(RecordingMergeHandler::new());
    let tree = MergeTree::new(
        db,
        MergeTreeConfig::default(),
        handler.clone(),
        Arc::new(DefaultConflictHandler),
    );
    (tree, handler)
}

#[tokio::test]
async fn fresh_local_write_becomes_a_root_with_no_parents() {
    let (mt, _) = build(Arc::new(InMemoryDb::new()));
    let mut h = Header::new(doc());
    h.v = None;
    let written = mt
        .local_write(h, None, Some(Value::map([("a".into(), Value::Int(1))])))
        .await
        .unwrap();
    assert!(written.h.pa.is_empty());
}

#[tokio::test]
async fn second_local_write_chains_onto_the_existing_head() {
    let (mt, _) = build(Arc::new(InMemoryDb::new()));
    let first = mt
        .local_write(Header::new(doc()), None, Some(Value::map([])))
        .await
        .unwrap();
    let second = mt
        .local_write(Header::new(doc()), None, Some(Value::map([])))
        .await
        .unwrap();
    assert_eq!(second.h.pa, vec![first.h.v.unwrap()]);
}

#[tokio::test]
async fn remote_write_to_unknown_perspective_is_rejected() {
    let (mt, _) = build(Arc::new(InMemoryDb::new()));
    let mut h = Header::new(doc());
    h.v = Some(VersionId::random(6));
    let version = Version::new(h, None, Some(Value::map([])));
    let err = mt.remote_write(&"peer-1".to_string(), version).unwrap_err();
    assert!(matches!(err, MergeTreeError::UnknownPerspective(_)));
}

#[tokio::test]
async fn fast_forward_merge_requires_no_conflict_handler_call() {
    let db = Arc::new(InMemoryDb::new());
    let (mt, handler) = build(db);
    let pe: PerspectiveName = "peer-1".to_string();
    mt.register_perspective(pe.clone(), PerspectiveConfig::default()).unwrap();

    let local_root = mt
        .local_write(Header::new(doc()), None, Some(Value::map([("a".into(), Value::Int(1))])))
        .await
        .unwrap();

    let mut h = Header::new(doc());
    h.v = Some(local_root.h.v.unwrap());
    h.pa = vec![];
    let root_version = Version::new(h, None, Some(Value::map([("a".into(), Value::Int(1))])));
    mt.remote_write(&pe, root_version).unwrap();

    let mut h2 = Header::new(doc());
    h2.v = Some(VersionId::from_slice(&[9, 9, 9, 9, 9, 9]).unwrap());
    h2.pa = vec![local_root.h.v.unwrap()];
    let child = Version::new(h2, None, Some(Value::map([("a".into(), Value::Int(2))])));
    mt.remote_write(&pe, child).unwrap();

    mt.copy_missing_to_stage(&pe).unwrap();
    mt.merge_stage_with_local(&pe).await.unwrap();

    assert_eq!(handler.merges.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn independently_created_roots_merge_without_a_conflict_handler_call() {
    // spec.md §8.4 S2: a perspective root with no shared history with the
    // local head still merges cleanly instead of erroring.
    let db = Arc::new(InMemoryDb::new());
    let (mt, handler) = build(db);
    let pe: PerspectiveName = "peer-1".to_string();
    mt.register_perspective(pe.clone(), PerspectiveConfig::default()).unwrap();

    mt.local_write(
        Header::new(doc()),
        None,
        Some(Value::map([("a".into(), Value::Int(1)), ("b".into(), Value::Int(1))])),
    )
    .await
    .unwrap();

    let mut h = Header::new(doc());
    h.v = Some(VersionId::from_slice(&[0x11, 0, 0, 0, 0, 0]).unwrap());
    h.pa = vec![];
    let incoming_root = Version::new(
        h,
        None,
        Some(Value::map([("a".into(), Value::Int(1)), ("b".into(), Value::Int(2))])),
    );
    mt.remote_write(&pe, incoming_root).unwrap();

    mt.copy_missing_to_stage(&pe).unwrap();
    mt.merge_stage_with_local(&pe).await.unwrap();

    let merges = handler.merges.lock().unwrap();
    assert_eq!(merges.len(), 1);
    let body = merges[0].b.as_ref().unwrap();
    assert_eq!(body.get("a"), Some(&Value::Int(1)));
    assert_eq!(body.get("b"), Some(&Value::Int(2)));
    assert_eq!(merges[0].h.pa.len(), 2);
}
