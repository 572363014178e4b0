use std::collections::{HashMap, HashSet};

use perspectivedb_primitives::VersionId;

use crate::MergeError;

/// One node of an ancestor walk: a version id and its direct parents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AncestorNode {
    pub v: VersionId,
    pub pa: Vec<VersionId>,
}

/// Finds the lowest common ancestor set of two versions (spec §4.3.1).
///
/// `x` and `y` are lazy sequences ordered child-to-root (leaf-first); each
/// item exposes `{v, pa[]}`. The two are pulled round-robin and folded into
/// two growing parent maps; a version seen in both maps is a candidate LCA.
/// After both sequences are exhausted, candidates that are a strict
/// ancestor of another candidate (in either graph) are demoted, leaving
/// only the maximal elements of the intersection.
pub fn find_lcas<E, IX, IY>(x: IX, y: IY) -> Result<Vec<VersionId>, MergeError<E>>
where
    E: std::error::Error + 'static,
    IX: Iterator<Item = Result<AncestorNode, E>>,
    IY: Iterator<Item = Result<AncestorNode, E>>,
{
    let mut vx: HashMap<VersionId, Vec<VersionId>> = HashMap::new();
    let mut vy: HashMap<VersionId, Vec<VersionId>> = HashMap::new();
    let mut candidates: Vec<VersionId> = Vec::new();
    let mut seen_candidates: HashSet<VersionId> = HashSet::new();

    let mut x = x;
    let mut y = y;
    let mut x_done = false;
    let mut y_done = false;

    while !x_done || !y_done {
        if !x_done {
            match x.next() {
                Some(item) => {
                    let node = item?;
                    vx.insert(node.v, node.pa);
                    if vy.contains_key(&node.v) && seen_candidates.insert(node.v) {
                        candidates.push(node.v);
                    }
                }
                None => x_done = true,
            }
        }
        if !y_done {
            match y.next() {
                Some(item) => {
                    let node = item?;
                    vy.insert(node.v, node.pa);
                    if vx.contains_key(&node.v) && seen_candidates.insert(node.v) {
                        candidates.push(node.v);
                    }
                }
                None => y_done = true,
            }
        }
    }

    let combined: HashMap<VersionId, Vec<VersionId>> =
        vx.into_iter().chain(vy).collect();

    let maximal: Vec<VersionId> = candidates
        .iter()
        .copied()
        .filter(|candidate| {
            !candidates
                .iter()
                .any(|other| other != candidate && is_strict_ancestor(&combined, candidate, other))
        })
        .collect();

    Ok(maximal)
}

/// Is `ancestor` reachable from `of` by following parent links (strictly,
/// `ancestor != of`)?
fn is_strict_ancestor(
    graph: &HashMap<VersionId, Vec<VersionId>>,
    ancestor: &VersionId,
    of: &VersionId,
) -> bool {
    let mut stack: Vec<VersionId> = graph.get(of).cloned().unwrap_or_default();
    let mut seen = HashSet::new();
    while let Some(v) = stack.pop() {
        if &v == ancestor {
            return true;
        }
        if !seen.insert(v) {
            continue;
        }
        if let Some(parents) = graph.get(&v) {
            stack.extend(parents.iter().copied());
        }
    }
    false
}
