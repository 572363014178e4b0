//! Integration tests for `ProjectionStream`'s filter/hook projection and
//! parent-link rewriting, including tailing (spec §4.4).

use std::sync::Arc;
use std::time::Duration;

use perspectivedb_mergetree::{BodyFilter, ProjectionOpts, ProjectionStream};
use perspectivedb_primitives::{DocId, Header, Value, Version, VersionId};
use perspectivedb_store::InMemoryDb;
use perspectivedb_tree::{Tree, TreeConfig};

fn doc() -> DocId {
    DocId::new(b"d".to_vec()).unwrap()
}

fn vid(b: u8) -> VersionId {
    VersionId::from_slice(&[b]).unwrap()
}

fn version(v: VersionId, pa: Vec<VersionId>, body: Value) -> Version {
    let mut h = Header::new(doc());
    h.v = Some(v);
    h.pa = pa;
    Version::new(h, None, Some(body))
}

#[tokio::test]
async fn filtered_out_middle_version_is_bridged() {
    let tree = Tree::new(Arc::new(InMemoryDb::new()), "local", TreeConfig::default());
    tree.write(version(vid(1), vec![], Value::map([("keep".into(), Value::Bool(true))])))
        .unwrap();
    tree.write(version(vid(2), vec![vid(1)], Value::map([("keep".into(), Value::Bool(false))])))
        .unwrap();
    tree.write(version(vid(3), vec![vid(2)], Value::map([("keep".into(), Value::Bool(true))])))
        .unwrap();

    let opts = ProjectionOpts {
        filter: BodyFilter::new().eq("keep", Value::Bool(true)),
        ..ProjectionOpts::default()
    };
    let mut stream = ProjectionStream::new(&tree, opts);

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.h.v, Some(vid(1)));
    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(second.h.v, Some(vid(3)));
    assert_eq!(second.h.pa, vec![vid(1)]);
    assert!(stream.next().await.unwrap().is_none());
}

#[tokio::test]
async fn close_handle_unblocks_a_tailing_stream() {
    let tree = Tree::new(Arc::new(InMemoryDb::new()), "local", TreeConfig::default());
    let opts = ProjectionOpts {
        tail: true,
        tail_retry: Duration::from_millis(5),
        ..ProjectionOpts::default()
    };
    let mut stream = ProjectionStream::new(&tree, opts);
    let handle = stream.close_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.close();
    });
    let result = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("close() must unblock the tail within a bounded time");
    assert!(result.unwrap().is_none());
}
