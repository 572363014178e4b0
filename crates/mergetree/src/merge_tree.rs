use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use perspectivedb_merge::{MergeOutcome, Side};
use perspectivedb_primitives::{
    content_hash, DocId, Header, PerspectiveName, Value, Version, VersionId, LOCAL_TREE_NAME,
    STAGE_TREE_NAME,
};
use perspectivedb_store::{Batch, Database};
use perspectivedb_tree::{HeadFilter, IterateOpts, Tree};

use crate::ancestor::StageOverLocal;
use crate::config::MergeTreeConfig;
use crate::error::MergeTreeError;
use crate::filter::BodyFilter;
use crate::handlers::{ConflictHandler, MergeHandler};
use crate::hooks::{self, Hook};
use crate::lock::IdLockTable;

/// Per-perspective pipeline installed at [`MergeTree::register_perspective`]
/// time: the body filter and hook chain the remote write path runs (spec
/// §4.2.2), and the transform the copy-missing-to-stage step applies
/// (spec §4.2.3). The transform must leave `h.pa`, `h.v`, and `h.id`
/// unchanged — copy-missing-to-stage preserves them verbatim regardless
/// of what the transform does to the rest of the version.
pub struct PerspectiveConfig {
    pub filter: BodyFilter,
    pub hooks: Vec<Box<dyn Hook>>,
    pub transform: Box<dyn Fn(Version) -> Option<Version> + Send + Sync>,
}

impl Default for PerspectiveConfig {
    fn default() -> Self {
        Self {
            filter: BodyFilter::default(),
            hooks: Vec::new(),
            transform: Box::new(Some),
        }
    }
}

struct Perspective<D> {
    tree: Tree<D>,
    config: PerspectiveConfig,
}

/// Composes one local Tree, one stage Tree, and N perspective Trees over a
/// single shared `Database` handle (spec §3.1 "MergeTree"). Grounded on
/// `calimero-dag`'s `Dag` struct, which plays the same composing role
/// over its own store-backed components.
pub struct MergeTree<D> {
    db: Arc<D>,
    config: MergeTreeConfig,
    local: Tree<D>,
    stage: Tree<D>,
    perspectives: Mutex<HashMap<PerspectiveName, Perspective<D>>>,
    updated: Mutex<HashSet<PerspectiveName>>,
    locks: IdLockTable,
    merge_handler: Arc<dyn MergeHandler>,
    conflict_handler: Arc<dyn ConflictHandler>,
    closed: Arc<AtomicBool>,
}

impl<D: Database> MergeTree<D> {
    pub fn new(
        db: Arc<D>,
        config: MergeTreeConfig,
        merge_handler: Arc<dyn MergeHandler>,
        conflict_handler: Arc<dyn ConflictHandler>,
    ) -> Self {
        let local = Tree::new(db.clone(), LOCAL_TREE_NAME, config.tree);
        let stage = Tree::new(db.clone(), STAGE_TREE_NAME, config.tree);
        Self {
            db,
            config,
            local,
            stage,
            perspectives: Mutex::new(HashMap::new()),
            updated: Mutex::new(HashSet::new()),
            locks: IdLockTable::new(),
            merge_handler,
            conflict_handler,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn local(&self) -> &Tree<D> {
        &self.local
    }

    pub fn register_perspective(
        &self,
        name: PerspectiveName,
        config: PerspectiveConfig,
    ) -> Result<(), MergeTreeError> {
        if name == LOCAL_TREE_NAME || name == STAGE_TREE_NAME {
            return Err(MergeTreeError::NameCollision(name));
        }
        let tree = Tree::new(self.db.clone(), name.clone(), self.config.tree);
        self.perspectives
            .lock()
            .expect("perspective table poisoned")
            .insert(name, Perspective { tree, config });
        Ok(())
    }

    fn mark_updated(&self, pe: &PerspectiveName) {
        self.updated
            .lock()
            .expect("updated-perspectives set poisoned")
            .insert(pe.clone());
    }

    fn take_updated(&self) -> Vec<PerspectiveName> {
        std::mem::take(&mut *self.updated.lock().expect("updated-perspectives set poisoned"))
            .into_iter()
            .collect()
    }

    /// Signals either a brand-new user change or the acknowledgment of a
    /// previously staged merge (spec §4.2.1). `header.pa` must be empty —
    /// parents are always derived, never supplied by the caller.
    pub async fn local_write(
        &self,
        mut header: Header,
        m: Option<Value>,
        b: Option<Value>,
    ) -> Result<Version, MergeTreeError> {
        if !header.pa.is_empty() {
            return Err(
                perspectivedb_tree::TreeError::InvalidHeader("pa must be absent on a local write")
                    .into(),
            );
        }
        let _guard = self.locks.lock(&header.id).await;

        if let Some(v) = header.v {
            if let Some(staged) = self.stage.get_by_version(&v)? {
                if staged.b == b {
                    return self.commit_staged_transfer(staged, m, b);
                }
            }
        }

        let lheads = self
            .local
            .get_heads(&header.id, HeadFilter { skip_conflicts: true, skip_deletes: false })?;
        if lheads.len() > 1 {
            return Err(MergeTreeError::LocalForkDetected);
        }
        header.pa = lheads;
        let v = header.v.unwrap_or_else(|| VersionId::random(self.config.tree.v_size));
        header.v = Some(v);
        let version = Version::new(header, m, b);
        Ok(self.local.write(version)?)
    }

    /// Moves a staged merge and every still-staged ancestor of it into
    /// local, in insertion order, one atomic local-write/stage-delete pair
    /// at a time (spec §4.2.1 step 1b).
    fn commit_staged_transfer(
        &self,
        staged: Version,
        m: Option<Value>,
        b: Option<Value>,
    ) -> Result<Version, MergeTreeError> {
        let target_v = staged.h.v.expect("staged version carries v");
        let id = staged.h.id.clone();
        let items = self.stage.iterate_insertion_order(IterateOpts {
            id: Some(id),
            last: Some(target_v),
            ..IterateOpts::default()
        })?;

        let mut committed = None;
        for item in items {
            let item_v = item.h.v.expect("staged version carries v");
            let is_target = item_v == target_v;
            let version = if is_target {
                Version::new(item.h.clone(), m.clone(), b.clone())
            } else {
                item.clone()
            };

            let mut batch = Batch::new();
            let written = self.local.write_batched(version, &mut batch)?;
            self.stage.remove_batched(&item_v, &mut batch)?;
            self.db.apply(batch)?;

            if is_target {
                committed = Some(written);
            }
        }

        let result = committed.expect("target version is always within its own staged range");
        tracing::debug!(id = ?result.h.id, v = ?result.h.v, "committed staged merge to local");
        Ok(result)
    }

    /// Runs one version from a named perspective through its filter and
    /// hook chain and into that perspective's tree (spec §4.2.2). Returns
    /// `None` if the filter or a hook dropped it.
    pub fn remote_write(
        &self,
        pe: &PerspectiveName,
        mut version: Version,
    ) -> Result<Option<Version>, MergeTreeError> {
        version.h.pe = Some(pe.clone());

        let perspectives = self.perspectives.lock().expect("perspective table poisoned");
        let Some(entry) = perspectives.get(pe) else {
            return Err(MergeTreeError::UnknownPerspective(pe.clone()));
        };
        if !entry.config.filter.matches(version.b.as_ref()) {
            return Ok(None);
        }
        let Some(version) = hooks::run_chain(&entry.config.hooks, version)? else {
            return Ok(None);
        };
        let written = entry.tree.write(version)?;
        drop(perspectives);

        self.mark_updated(pe);
        Ok(Some(written))
    }

    /// Copies every version of `pe` not yet staged into the stage tree,
    /// preserving `pa`/`v`/`id` (spec §4.2.3).
    pub fn copy_missing_to_stage(&self, pe: &PerspectiveName) -> Result<(), MergeTreeError> {
        let perspectives = self.perspectives.lock().expect("perspective table poisoned");
        let Some(entry) = perspectives.get(pe) else {
            return Err(MergeTreeError::UnknownPerspective(pe.clone()));
        };

        let last = self.local.last_by_perspective(pe)?;
        let items = entry.tree.iterate_insertion_order(IterateOpts {
            first: last,
            exclude_first: true,
            ..IterateOpts::default()
        })?;

        for item in items {
            let v = item.h.v.expect("perspective version always carries v");
            if self.stage.get_by_version(&v)?.is_some() {
                continue;
            }
            let Some(mut transformed) = (entry.config.transform)(item) else {
                continue;
            };
            transformed.h.pe = Some(pe.clone());
            self.stage.write(transformed)?;
        }
        Ok(())
    }

    /// Runs the merge engine over every stage head belonging to `pe`
    /// against its corresponding local head (spec §4.2.4).
    pub async fn merge_stage_with_local(&self, pe: &PerspectiveName) -> Result<(), MergeTreeError> {
        let items = self.stage.iterate_insertion_order(IterateOpts::default())?;
        for sitem in items {
            if sitem.h.pe.as_ref() != Some(pe) {
                continue;
            }
            self.merge_one_staged_item(pe, sitem).await?;
        }
        Ok(())
    }

    async fn merge_one_staged_item(
        &self,
        pe: &PerspectiveName,
        sitem: Version,
    ) -> Result<(), MergeTreeError> {
        let id = sitem.h.id.clone();
        let sv = sitem.h.v.expect("staged version carries v");

        let _guard = self.locks.lock(&id).await;

        let stage_heads = self
            .stage
            .get_heads(&id, HeadFilter { skip_conflicts: true, skip_deletes: false })?;
        if !stage_heads.contains(&sv) {
            return Ok(());
        }

        let lheads = self
            .local
            .get_heads(&id, HeadFilter { skip_conflicts: true, skip_deletes: false })?;
        if lheads.len() > 1 {
            return Err(MergeTreeError::LocalForkDetected);
        }

        let Some(lhead) = lheads.first().copied() else {
            self.merge_handler.on_merge(&sitem, None).await;
            return Ok(());
        };

        let source = StageOverLocal::new(&self.stage, &self.local);
        let outcome = perspectivedb_merge::merge(&source, sv, lhead)?;

        match outcome {
            MergeOutcome::Equal(_) => {}
            MergeOutcome::FastForward { winner: Side::Y, .. } => {}
            MergeOutcome::FastForward { winner: Side::X, .. } => {
                let local_head = self.local.get_by_version(&lhead)?;
                self.merge_handler.on_merge(&sitem, local_head.as_ref()).await;
            }
            MergeOutcome::Merge(body) => {
                let local_head = self.local.get_by_version(&lhead)?;
                let written = self.write_merge_result(&id, sv, lhead, body)?;
                self.merge_handler.on_merge(&written, local_head.as_ref()).await;
            }
            MergeOutcome::Conflict(attrs) => {
                let local_body = self.local.body_of(&lhead)?;
                let resolved = self
                    .conflict_handler
                    .on_conflict(&attrs, sitem.b.as_ref(), local_body.as_ref())
                    .await;
                match resolved {
                    Some(body) => {
                        self.write_merge_result(&id, sv, lhead, body)?;
                        self.mark_updated(pe);
                    }
                    None => {
                        self.stage.set_conflict_by_version(&sv)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Constructs and writes the merged version `w` to stage with
    /// `pa = sort([sv, lhead])`, `v = contentHash(w)` (spec §4.3.4,
    /// §4.2.4.d/e). `lhead` lives only in local, so the parent-existence
    /// check is relaxed for it.
    fn write_merge_result(
        &self,
        id: &DocId,
        sv: VersionId,
        lhead: VersionId,
        body: Value,
    ) -> Result<Version, MergeTreeError> {
        let mut pa = vec![sv, lhead];
        pa.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
        let v = content_hash(id, &pa, None, Some(&body), self.config.tree.v_size);

        let mut h = Header::new(id.clone());
        h.v = Some(v);
        h.pa = pa;
        let w = Version::new(h, None, Some(body));

        let mut batch = Batch::new();
        let written = self.stage.write_batched_allowing(w, &mut batch, &[lhead])?;
        self.db.apply(batch)?;
        Ok(written)
    }

    /// One tick of the auto-merge loop (spec §5): for every perspective
    /// flagged `updatedPerspectives[pe] == true`, runs copy-missing-to-stage
    /// then merge-stage-with-local, then clears the flag. A failing
    /// perspective is logged and skipped; it does not block the others.
    pub async fn run_merge_tick(&self) {
        for pe in self.take_updated() {
            if let Err(err) = self.copy_missing_to_stage(&pe) {
                tracing::error!(perspective = %pe, error = %err, "copy-missing-to-stage failed");
                continue;
            }
            if let Err(err) = self.merge_stage_with_local(&pe).await {
                tracing::error!(perspective = %pe, error = %err, "merge-stage-with-local failed");
            }
        }
    }

    #[must_use]
    pub fn close_handle(&self) -> AutoMergeCloseHandle {
        AutoMergeCloseHandle(self.closed.clone())
    }

    /// Runs [`MergeTree::run_merge_tick`] on a fixed interval until closed
    /// (spec §5 "auto-merge loop"). Intended to be spawned onto its own
    /// task; `self` is shared behind an `Arc` so the loop and the write
    /// paths can run concurrently.
    pub async fn run_auto_merge_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.merge_interval);
        loop {
            interval.tick().await;
            if self.closed.load(Ordering::SeqCst) {
                break;
            }
            self.run_merge_tick().await;
        }
    }
}

/// Cancels a running [`MergeTree::run_auto_merge_loop`] at its next tick
/// boundary (spec §5 "`close()` sets a stop flag and waits until the
/// current tick drains").
#[derive(Clone)]
pub struct AutoMergeCloseHandle(Arc<AtomicBool>);

impl AutoMergeCloseHandle {
    pub fn close(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}
