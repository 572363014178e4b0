//! Integration tests for the hook chain and the built-in `hide` hook
//! (spec §4.6).

use perspectivedb_mergetree::{hide, Hide, Hook, HookError};
use perspectivedb_primitives::{DocId, Header, Value, Version};

fn version_with_body(body: Value) -> Version {
    Version::new(Header::new(DocId::new(b"d".to_vec()).unwrap()), None, Some(body))
}

#[test]
fn hide_strips_named_attributes() {
    let body = Value::map([
        ("public".into(), Value::Int(1)),
        ("secret".into(), Value::Int(2)),
    ]);
    let hook = Hide::new(["secret"]);
    let result = hook.apply(version_with_body(body)).unwrap().unwrap();
    assert_eq!(result.b.unwrap().keys(), vec!["public"]);
}

#[test]
fn chain_short_circuits_on_drop() {
    struct DropAll;
    impl Hook for DropAll {
        fn apply(&self, _version: Version) -> Result<Option<Version>, HookError> {
            Ok(None)
        }
    }
    let hooks: Vec<Box<dyn Hook>> = vec![Box::new(DropAll), hide(["secret"])];
    let result = perspectivedb_mergetree::run_chain(&hooks, version_with_body(Value::map([]))).unwrap();
    assert!(result.is_none());
}
