use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use perspectivedb_primitives::{Version, VersionId};
use perspectivedb_store::Database;
use perspectivedb_tree::{IterateOpts, Tree, TreeError};
use thiserror::Error;

use crate::filter::BodyFilter;
use crate::hooks::{self, Hook, HookError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProjectionError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Hook(#[from] HookError),
}

/// Options for a [`ProjectionStream`] (spec §4.4.1).
pub struct ProjectionOpts {
    pub iter: IterateOpts,
    pub filter: BodyFilter,
    pub hooks: Vec<Box<dyn Hook>>,
    pub tail: bool,
    pub tail_retry: Duration,
}

impl Default for ProjectionOpts {
    fn default() -> Self {
        Self {
            iter: IterateOpts::default(),
            filter: BodyFilter::default(),
            hooks: Vec::new(),
            tail: false,
            tail_retry: Duration::from_millis(200),
        }
    }
}

/// A shared flag letting a caller cancel a tailing [`ProjectionStream`]
/// from another task (spec §4.4.2: "`close()` must terminate any pending
/// wait").
#[derive(Clone, Default)]
pub struct CloseHandle(Arc<AtomicBool>);

impl CloseHandle {
    pub fn close(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A stream over a Tree that yields versions with parents rewritten to
/// the nearest ancestors still satisfying the filter + hook chain (spec
/// §4.4). Grounded on `calimero-dag`'s delta-stream reader, generalized
/// with a filter/hook projection stage and an optional tailing mode.
pub struct ProjectionStream<'a, D> {
    tree: &'a Tree<D>,
    opts: ProjectionOpts,
    cursor: Option<VersionId>,
    buffer: VecDeque<Version>,
    transformed: HashMap<VersionId, Option<Version>>,
    connected: HashMap<VersionId, Vec<VersionId>>,
    close: CloseHandle,
    exhausted_once: bool,
}

impl<'a, D: Database> ProjectionStream<'a, D> {
    pub fn new(tree: &'a Tree<D>, opts: ProjectionOpts) -> Self {
        Self {
            tree,
            opts,
            cursor: None,
            buffer: VecDeque::new(),
            transformed: HashMap::new(),
            connected: HashMap::new(),
            close: CloseHandle::default(),
            exhausted_once: false,
        }
    }

    #[must_use]
    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    /// Pulls the next projected version, or `None` at end of stream.
    /// Suspends (and may sleep) only when tailing an exhausted range.
    pub async fn next(&mut self) -> Result<Option<Version>, ProjectionError> {
        loop {
            if let Some(candidate) = self.buffer.pop_front() {
                let v = candidate.h.v.expect("stored version always carries v");
                self.cursor = Some(v);
                let Some(mut emitted) = self.evaluate(v)? else {
                    continue;
                };
                let pa = self.connected_parents(&candidate.h.pa)?;
                emitted.h.pa = pa;
                emitted.h.pe = None;
                emitted.h.i = None;
                emitted.m = None;
                return Ok(Some(emitted));
            }

            self.refill()?;
            if !self.buffer.is_empty() {
                continue;
            }

            if !self.opts.tail {
                return Ok(None);
            }
            if self.close.is_closed() {
                return Ok(None);
            }
            self.exhausted_once = true;
            tokio::time::sleep(self.opts.tail_retry).await;
            if self.close.is_closed() {
                return Ok(None);
            }
        }
    }

    fn refill(&mut self) -> Result<(), ProjectionError> {
        let mut bounds = self.opts.iter.clone();
        if let Some(cursor) = self.cursor {
            bounds.first = Some(cursor);
            bounds.exclude_first = true;
        }
        let items = self.tree.iterate_insertion_order(bounds)?;
        self.buffer.extend(items);
        Ok(())
    }

    fn evaluate(&mut self, v: VersionId) -> Result<Option<Version>, ProjectionError> {
        if let Some(cached) = self.transformed.get(&v) {
            return Ok(cached.clone());
        }
        let result = match self.tree.get_by_version(&v)? {
            None => None,
            Some(version) => {
                if !self.opts.filter.matches(version.b.as_ref()) {
                    None
                } else {
                    hooks::run_chain(&self.opts.hooks, version)?
                }
            }
        };
        self.transformed.insert(v, result.clone());
        Ok(result)
    }

    /// Recursively resolves `pa` to the nearest ancestors that pass the
    /// filter + hook chain, memoized per `v` inside this stream (spec
    /// §4.4.1 step 3).
    fn connected_parents(&mut self, pa: &[VersionId]) -> Result<Vec<VersionId>, ProjectionError> {
        let mut out = Vec::new();
        for &p in pa {
            out.extend(self.resolve_one(p)?);
        }
        out.sort();
        out.dedup();
        Ok(out)
    }

    fn resolve_one(&mut self, v: VersionId) -> Result<Vec<VersionId>, ProjectionError> {
        if let Some(cached) = self.connected.get(&v) {
            return Ok(cached.clone());
        }
        let resolved = if self.evaluate(v)?.is_some() {
            vec![v]
        } else {
            match self.tree.get_by_version(&v)? {
                Some(version) => self.connected_parents(&version.h.pa)?,
                None => Vec::new(),
            }
        };
        self.connected.insert(v, resolved.clone());
        Ok(resolved)
    }
}
