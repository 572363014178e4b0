use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use borsh::BorshDeserialize;
use perspectivedb_merge::AncestorNode;
use perspectivedb_primitives::{DocId, InsertionIndex, PerspectiveName, Value, Version, VersionId};
use perspectivedb_store::{Batch, Column, Database, DbIterator, Slice};

use crate::config::TreeConfig;
use crate::error::TreeError;
use crate::key;

/// One named DAG namespace inside a shared KV store (spec §4.1). A
/// `MergeTree` instantiates one `Tree` for `local`, one for `stage`, and
/// one per perspective, all sharing the same backing `Database` handle —
/// the name is the only thing that keeps their key ranges apart.
pub struct Tree<D> {
    db: Arc<D>,
    name: String,
    config: TreeConfig,
    /// In-process cache of the next unassigned [`InsertionIndex`], guarded
    /// by a short-held `std::sync::Mutex` so two concurrent writes for
    /// *different* ids (spec §5 permits these to interleave freely) can
    /// never read the same on-disk counter value before either one's
    /// batch commits. The DB-backed `counter_key` entry `next_index`
    /// schedules into the batch stays the durable source of truth across
    /// restarts; this cache only closes the read-then-deferred-write gap
    /// within one process's lifetime.
    next_index: std::sync::Mutex<Option<InsertionIndex>>,
}

/// Filters applied to [`Tree::get_heads`] (spec §3.2 invariant 7).
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadFilter {
    pub skip_conflicts: bool,
    pub skip_deletes: bool,
}

/// Bounds and ordering for [`Tree::iterate_insertion_order`] (spec
/// §4.1.3).
#[derive(Debug, Clone, Default)]
pub struct IterateOpts {
    pub id: Option<DocId>,
    pub first: Option<VersionId>,
    pub last: Option<VersionId>,
    pub exclude_first: bool,
    pub exclude_last: bool,
    pub reverse: bool,
}

impl<D: Database> Tree<D> {
    pub fn new(db: Arc<D>, name: impl Into<String>, config: TreeConfig) -> Self {
        Self {
            db,
            name: name.into(),
            config,
            next_index: std::sync::Mutex::new(None),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> TreeConfig {
        self.config
    }

    fn has_version(&self, v: &VersionId) -> Result<bool, TreeError> {
        Ok(self
            .db
            .has(Column::Default, Slice::from(key::v_key(&self.name, v)))?)
    }

    fn index_of(&self, v: &VersionId) -> Result<Option<InsertionIndex>, TreeError> {
        let bytes = self
            .db
            .get(Column::Default, Slice::from(key::v_key(&self.name, v)))?;
        Ok(bytes.map(|b| InsertionIndex::from_be_bytes(b.as_ref())))
    }

    /// Reserves the next insertion index and schedules the counter update
    /// into `batch`. Holds `next_index` only long enough to read-and-bump
    /// the in-process cache, never across the caller's eventual
    /// `Database::apply` — two different ids' writes on this Tree can
    /// still commit in either order, but neither can observe the same
    /// unreserved index the other already claimed.
    fn next_index(&self, batch: &mut Batch) -> Result<InsertionIndex, TreeError> {
        let mut cached = self.next_index.lock().expect("counter cache poisoned");
        let next = match *cached {
            Some(next) => next,
            None => {
                let counter_key = key::counter_key(&self.name);
                match self.db.get(Column::Default, Slice::from(counter_key))? {
                    Some(bytes) => InsertionIndex::from_be_bytes(bytes.as_ref()).next(),
                    None => InsertionIndex(0),
                }
            }
        };
        *cached = Some(next.next());
        batch.put(
            Column::Default,
            key::counter_key(&self.name),
            next.to_be_bytes(self.config.i_size),
        );
        Ok(next)
    }

    fn read_record(&self, i: InsertionIndex) -> Result<Option<Version>, TreeError> {
        let record = self.db.get(
            Column::Default,
            Slice::from(key::ds_key(&self.name, i, self.config.i_size)),
        )?;
        let Some(record) = record else {
            return Ok(None);
        };
        let version = Version::try_from_slice(record.as_ref())
            .map_err(|e| TreeError::Corrupt(e.to_string()))?;
        Ok(Some(version))
    }

    /// Writes one version (spec §4.1.2). `h.v` must already be set by the
    /// caller — a Tree never mints version ids, only assigns `i` and
    /// updates its indexes. Commits in its own atomic batch; see
    /// [`Tree::write_batched`] to fold this into a larger atomic commit
    /// spanning more than one tree (e.g. stage-removal + local-write).
    pub fn write(&self, version: Version) -> Result<Version, TreeError> {
        let mut batch = Batch::new();
        let stored = self.write_batched(version, &mut batch)?;
        self.db.apply(batch)?;
        tracing::debug!(tree = %self.name, id = ?stored.h.id, v = ?stored.h.v, "wrote version");
        Ok(stored)
    }

    /// Same effects as [`Tree::write`] but appends to a caller-owned batch
    /// instead of committing it, so several Trees sharing one `Database`
    /// can be updated atomically together.
    pub fn write_batched(&self, version: Version, batch: &mut Batch) -> Result<Version, TreeError> {
        self.write_batched_allowing(version, batch, &[])
    }

    /// Same as [`Tree::write_batched`], except parents listed in
    /// `known_elsewhere` are accepted without a local existence check.
    /// Used when writing a merged version to stage whose `pa` includes a
    /// local-only head (spec §4.2.4.e): the parent is real, it just lives
    /// in a different Tree sharing this Database.
    pub fn write_batched_allowing(
        &self,
        version: Version,
        batch: &mut Batch,
        known_elsewhere: &[VersionId],
    ) -> Result<Version, TreeError> {
        let Version { mut h, m, b } = version;
        let v = h.v.ok_or(TreeError::InvalidHeader("v"))?;
        v.check_size(self.config.v_size)?;
        for p in &h.pa {
            p.check_size(self.config.v_size)?;
        }

        for p in &h.pa {
            if !known_elsewhere.contains(p) && !self.has_version(p)? {
                return Err(TreeError::MissingParent(*p));
            }
        }
        if self.has_version(&v)? {
            return Err(TreeError::DuplicateVersion(v));
        }

        let i = self.next_index(batch)?;
        h.i = Some(i);

        let stored = Version { h: h.clone(), m, b };
        let bytes =
            borsh::to_vec(&stored).map_err(|e| TreeError::Corrupt(e.to_string()))?;

        batch.put(
            Column::Default,
            key::ds_key(&self.name, i, self.config.i_size),
            bytes,
        );
        let i_bytes = i.to_be_bytes(self.config.i_size);
        batch.put(
            Column::Default,
            key::ik_key(&self.name, &h.id, &v),
            i_bytes.clone(),
        );
        batch.put(Column::Default, key::v_key(&self.name, &v), i_bytes);

        let flags = key::encode_flags(h.is_conflicting(), h.is_tombstone());
        batch.put(Column::Default, key::head_key(&self.name, &h.id, &v), vec![flags]);
        for p in &h.pa {
            batch.delete(Column::Default, key::head_key(&self.name, &h.id, p));
        }

        if let Some(pe) = &h.pe {
            if self.name == perspectivedb_primitives::LOCAL_TREE_NAME {
                batch.put(
                    Column::Default,
                    key::us_key(&self.name, pe),
                    v.as_bytes().to_vec(),
                );
            }
        }

        Ok(stored)
    }

    /// Removes a stored version entirely. Only ever used to drop a version
    /// from stage once it has been durably migrated into local (spec
    /// §3.3: "deleted only when a staged version is moved into local").
    pub fn remove(&self, v: &VersionId) -> Result<(), TreeError> {
        let mut batch = Batch::new();
        self.remove_batched(v, &mut batch)?;
        self.db.apply(batch)?;
        Ok(())
    }

    /// Same effects as [`Tree::remove`] but appends to a caller-owned
    /// batch instead of committing it.
    pub fn remove_batched(&self, v: &VersionId, batch: &mut Batch) -> Result<(), TreeError> {
        let Some(version) = self.get_by_version(v)? else {
            return Ok(());
        };
        let i = version.h.i.expect("stored version always carries i");
        batch.delete(Column::Default, key::ds_key(&self.name, i, self.config.i_size));
        batch.delete(Column::Default, key::ik_key(&self.name, &version.h.id, v));
        batch.delete(Column::Default, key::v_key(&self.name, v));
        batch.delete(Column::Default, key::head_key(&self.name, &version.h.id, v));
        tracing::debug!(tree = %self.name, v = ?v, "removed version");
        Ok(())
    }

    pub fn get_by_version(&self, v: &VersionId) -> Result<Option<Version>, TreeError> {
        let Some(i) = self.index_of(v)? else {
            return Ok(None);
        };
        self.read_record(i)
    }

    pub fn get_heads(&self, id: &DocId, filter: HeadFilter) -> Result<Vec<VersionId>, TreeError> {
        let prefix = key::head_prefix(&self.name, id);
        let mut heads = Vec::new();
        let mut iter = self.db.iter(Column::Default)?;
        let Some(mut current_key) = iter.seek(Slice::from(prefix.clone()))? else {
            return Ok(heads);
        };
        loop {
            if !current_key.starts_with(&prefix[..]) {
                break;
            }
            let value = iter.read()?;
            if let Some(v) = decode_head(&prefix, &current_key, &value, filter) {
                heads.push(v);
            }
            match iter.advance(false)? {
                Some(next_key) => current_key = next_key,
                None => break,
            }
        }
        Ok(heads)
    }

    pub fn iterate_insertion_order(
        &self,
        opts: IterateOpts,
    ) -> Result<Vec<Version>, TreeError> {
        let lower_i = opts.first.as_ref().map(|v| self.index_of(v)).transpose()?.flatten();
        let upper_i = opts.last.as_ref().map(|v| self.index_of(v)).transpose()?.flatten();

        let prefix = key::ds_prefix(&self.name);
        let start_key = match lower_i {
            Some(i) => key::ds_key(&self.name, i, self.config.i_size),
            None => prefix.clone(),
        };

        let mut out = Vec::new();
        let mut iter = self.db.iter(Column::Default)?;
        let Some(mut current_key) = iter.seek(Slice::from(start_key))? else {
            return Ok(out);
        };
        loop {
            if !current_key.starts_with(&prefix[..]) {
                break;
            }
            let value = iter.read()?;
            let version = Version::try_from_slice(value.as_ref())
                .map_err(|e| TreeError::Corrupt(e.to_string()))?;
            let this_i = version.h.i.expect("stored version always carries i");

            if let Some(upper) = upper_i {
                if this_i > upper {
                    break;
                }
            }

            let skip_first = opts.exclude_first && Some(this_i) == lower_i;
            let skip_last = opts.exclude_last && Some(this_i) == upper_i;
            let matches_id = opts.id.as_ref().map_or(true, |id| id == &version.h.id);
            if !skip_first && !skip_last && matches_id {
                out.push(version);
            }

            match iter.advance(false)? {
                Some(next_key) => current_key = next_key,
                None => break,
            }
        }

        if opts.reverse {
            out.reverse();
        }
        Ok(out)
    }

    pub fn last_by_perspective(
        &self,
        pe: &PerspectiveName,
    ) -> Result<Option<VersionId>, TreeError> {
        let bytes = self
            .db
            .get(Column::Default, Slice::from(key::us_key(&self.name, pe)))?;
        bytes
            .map(|b| VersionId::from_slice(b.as_ref()).map_err(TreeError::from))
            .transpose()
    }

    /// Flips `headKey`'s conflict bit for `v` if it is still a head, and
    /// records the flag on the stored header — the sole in-place mutation
    /// a version ever undergoes (spec §3.3).
    pub fn set_conflict_by_version(&self, v: &VersionId) -> Result<(), TreeError> {
        let Some(mut version) = self.get_by_version(v)? else {
            return Ok(());
        };
        let head_key = key::head_key(&self.name, &version.h.id, v);
        let Some(flags) = self.db.get(Column::Default, Slice::from(head_key.clone()))? else {
            return Ok(());
        };
        let delete_flag = key::flags_delete(flags.first().copied().unwrap_or(0));
        let new_flags = key::encode_flags(true, delete_flag);

        version.h.c = Some(true);
        let i = version.h.i.expect("stored version always carries i");
        let bytes = borsh::to_vec(&version).map_err(|e| TreeError::Corrupt(e.to_string()))?;

        let mut batch = Batch::new();
        batch.put(Column::Default, head_key, vec![new_flags]);
        batch.put(
            Column::Default,
            key::ds_key(&self.name, i, self.config.i_size),
            bytes,
        );
        self.db.apply(batch)?;
        tracing::debug!(tree = %self.name, v = ?v, "marked version conflicting");
        Ok(())
    }

    /// Walks the ancestor chain of `v`, child-to-root, breadth-first. Used
    /// directly by `perspectivedb-mergetree`'s merge-engine adapter to
    /// build the `AncestorSource` streams §4.3.1 describes.
    pub fn ancestors(&self, v: &VersionId) -> AncestorIter<'_, D> {
        let mut frontier = VecDeque::new();
        frontier.push_back(*v);
        AncestorIter {
            tree: self,
            frontier,
            seen: HashSet::new(),
        }
    }

    pub fn body_of(&self, v: &VersionId) -> Result<Option<Value>, TreeError> {
        Ok(self.get_by_version(v)?.and_then(|version| version.b))
    }
}

fn decode_head(
    prefix: &[u8],
    key: &Slice<'_>,
    value: &Slice<'_>,
    filter: HeadFilter,
) -> Option<VersionId> {
    let v_bytes = &key[prefix.len()..];
    let flags = value.first().copied().unwrap_or(0);
    if filter.skip_conflicts && key::flags_conflict(flags) {
        return None;
    }
    if filter.skip_deletes && key::flags_delete(flags) {
        return None;
    }
    VersionId::from_slice(v_bytes).ok()
}

/// Lazy breadth-first ancestor walk over one Tree's DAG.
pub struct AncestorIter<'a, D> {
    tree: &'a Tree<D>,
    frontier: VecDeque<VersionId>,
    seen: HashSet<VersionId>,
}

impl<D: Database> Iterator for AncestorIter<'_, D> {
    type Item = Result<AncestorNode, TreeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let v = self.frontier.pop_front()?;
            if !self.seen.insert(v) {
                continue;
            }
            return Some(match self.tree.get_by_version(&v) {
                Ok(Some(version)) => {
                    self.frontier.extend(version.h.pa.iter().copied());
                    Ok(AncestorNode {
                        v,
                        pa: version.h.pa,
                    })
                }
                Ok(None) => Ok(AncestorNode { v, pa: vec![] }),
                Err(err) => Err(err),
            });
        }
    }
}

