use perspectivedb_primitives::{Value, Version};

/// Invoked once per newly created merged version, fast-forward or
/// three-way (spec §4.5). The host is expected to eventually call
/// [`crate::MergeTree::local_write`] with a header carrying `merged.h.v`
/// once it has durably committed the merged body elsewhere; the
/// `MergeTree` tolerates arbitrary delay and may call this again with the
/// same version after a restart if no acknowledgment landed.
///
/// Grounded on `calimero-dag`'s `DeltaApplier` capability-trait pattern:
/// the DAG doesn't know how to apply a delta, it delegates to a trait the
/// host implements. Here the `MergeTree` doesn't know how to durably
/// commit a merged body into the user-visible store, so it delegates too.
#[async_trait::async_trait]
pub trait MergeHandler: Send + Sync {
    async fn on_merge(&self, merged: &Version, local_head: Option<&Version>);
}

/// Invoked synchronously during stage-to-local merge when the engine
/// reports `Conflict` (spec §4.5). Returns a resolved body, or `None` to
/// mark the staged item conflicting.
#[async_trait::async_trait]
pub trait ConflictHandler: Send + Sync {
    async fn on_conflict(
        &self,
        attrs: &[String],
        side_body: Option<&Value>,
        local_body: Option<&Value>,
    ) -> Option<Value>;
}

/// The default conflict handler: always marks the item conflicting rather
/// than attempting automatic resolution (spec §4.5: "Default
/// implementation returns `null`").
pub struct DefaultConflictHandler;

#[async_trait::async_trait]
impl ConflictHandler for DefaultConflictHandler {
    async fn on_conflict(
        &self,
        _attrs: &[String],
        _side_body: Option<&Value>,
        _local_body: Option<&Value>,
    ) -> Option<Value> {
        None
    }
}
