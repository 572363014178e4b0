//! Integration tests for the exchange-protocol message shapes and the
//! length-prefixed `VersionCodec` (spec §6.2).

use bytes::BytesMut;
use perspectivedb_mergetree::{ControlRequest, DataRequest, VersionCodec};
use perspectivedb_primitives::{DocId, Header, Value, Version, VersionId};
use tokio_util::codec::{Decoder, Encoder};

#[test]
fn codec_roundtrips_one_frame_split_across_reads() {
    let mut h = Header::new(DocId::new(b"d".to_vec()).unwrap());
    h.v = Some(VersionId::from_slice(&[1]).unwrap());
    let version = Version::new(h, None, Some(Value::map([("a".into(), Value::Int(1))])));

    let mut codec = VersionCodec::default();
    let mut buf = BytesMut::new();
    codec.encode(version.clone(), &mut buf).unwrap();

    let mut partial = buf.split_to(2);
    assert!(codec.decode(&mut partial).unwrap().is_none());
    partial.unsplit(buf);
    let decoded = codec.decode(&mut partial).unwrap().unwrap();
    assert_eq!(decoded, version);
}

#[test]
fn data_request_start_after_roundtrips_through_json() {
    let req = DataRequest::resume_after(&VersionId::from_slice(&[7, 7]).unwrap());
    let json = serde_json::to_string(&req).unwrap();
    let back: DataRequest = serde_json::from_str(&json).unwrap();
    assert!(matches!(back, DataRequest::StartAfter { v } if v == vec![7, 7]));
}

#[test]
fn control_request_latest_roundtrips_an_upstream_id_through_json() {
    let req = ControlRequest::Latest { id: Some(vec![1, 0x01, 2, 3]) };
    let json = serde_json::to_string(&req).unwrap();
    let back: ControlRequest = serde_json::from_str(&json).unwrap();
    assert!(matches!(back, ControlRequest::Latest { id: Some(id) } if id == vec![1, 0x01, 2, 3]));
}

#[test]
fn control_request_latest_roundtrips_none() {
    let req = ControlRequest::Latest { id: None };
    let json = serde_json::to_string(&req).unwrap();
    let back: ControlRequest = serde_json::from_str(&json).unwrap();
    assert!(matches!(back, ControlRequest::Latest { id: None }));
}
