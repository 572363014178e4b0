use std::collections::{HashSet, VecDeque};

use perspectivedb_merge::AncestorNode;
use perspectivedb_primitives::{Value, VersionId};
use perspectivedb_store::Database;
use perspectivedb_tree::{Tree, TreeError};

/// Realizes the merge engine's ancestor stream as a single lookup-fallback
/// chain over two Trees (spec §4.3.1: `stage.ancestors(v) ++
/// local.ancestors(...)`). Rather than literally concatenating two
/// iterators, each node lookup tries `stage` first and falls back to
/// `local` — since every staged version's parent chain eventually bottoms
/// out in a version local already has, this produces the same walk
/// without ever yielding a version twice.
pub struct StageOverLocal<'a, D> {
    stage: &'a Tree<D>,
    local: &'a Tree<D>,
}

impl<'a, D: Database> StageOverLocal<'a, D> {
    pub fn new(stage: &'a Tree<D>, local: &'a Tree<D>) -> Self {
        Self { stage, local }
    }

    fn lookup(&self, v: &VersionId) -> Result<Option<(Vec<VersionId>, Option<Value>)>, TreeError> {
        if let Some(version) = self.stage.get_by_version(v)? {
            return Ok(Some((version.h.pa, version.b)));
        }
        if let Some(version) = self.local.get_by_version(v)? {
            return Ok(Some((version.h.pa, version.b)));
        }
        Ok(None)
    }
}

impl<'a, D: Database> perspectivedb_merge::AncestorSource for StageOverLocal<'a, D> {
    type Error = TreeError;
    type Ancestors<'b>
        = StageOverLocalIter<'b, D>
    where
        Self: 'b;

    fn ancestors(&self, v: &VersionId) -> Self::Ancestors<'_> {
        let mut frontier = VecDeque::new();
        frontier.push_back(*v);
        StageOverLocalIter {
            source: self,
            frontier,
            seen: HashSet::new(),
        }
    }

    fn body(&self, v: &VersionId) -> Result<Option<Value>, Self::Error> {
        Ok(self.lookup(v)?.and_then(|(_, body)| body))
    }
}

pub struct StageOverLocalIter<'a, D> {
    source: &'a StageOverLocal<'a, D>,
    frontier: VecDeque<VersionId>,
    seen: HashSet<VersionId>,
}

impl<D: Database> Iterator for StageOverLocalIter<'_, D> {
    type Item = Result<AncestorNode, TreeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let v = self.frontier.pop_front()?;
            if !self.seen.insert(v) {
                continue;
            }
            return Some(match self.source.lookup(&v) {
                Ok(Some((pa, _))) => {
                    self.frontier.extend(pa.iter().copied());
                    Ok(AncestorNode { v, pa })
                }
                Ok(None) => Ok(AncestorNode { v, pa: vec![] }),
                Err(err) => Err(err),
            });
        }
    }
}
