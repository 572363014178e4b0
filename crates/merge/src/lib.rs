//! Pure merge algorithm: lowest-common-ancestor search over two ancestor
//! streams plus three-way body merge, with no I/O or storage dependency.
//!
//! Grounded on `calimero-dag`'s head-tracking/apply-in-order idiom (a
//! `thiserror` error enum shallow-wrapping one cause, deterministic output
//! given deterministic input) and on its `tests_convergence.rs` fixture
//! style for the test suite below. Unlike `calimero-dag` this crate never
//! touches a store: callers supply ancestor streams and bodies through
//! [`AncestorSource`], keeping the algorithm testable against plain
//! in-memory fixtures.

mod lca;
mod outcome;
mod three_way;

pub use lca::{find_lcas, AncestorNode};
pub use outcome::{MergeOutcome, Side};
pub use three_way::{three_way_merge, ThreeWayResult};

use perspectivedb_primitives::{Value, VersionId};
use thiserror::Error;

/// Errors the merge engine can report. `Source` wraps whatever the caller's
/// [`AncestorSource`] failed with, the same shallow-wrap `calimero_dag`'s
/// `DagError` does over its backing store's `ApplyError`.
#[derive(Debug, Error)]
pub enum MergeError<E>
where
    E: std::error::Error + 'static,
{
    #[error("no common ancestor between the two heads")]
    NoCommonAncestor,
    #[error(transparent)]
    Source(#[from] E),
}

/// The capability a caller must provide so the merge engine never reaches
/// into a store directly: given a version id, produce its ancestor chain
/// (child-to-root, starting with the version itself) and its body.
pub trait AncestorSource {
    type Error: std::error::Error + 'static;
    type Ancestors<'a>: Iterator<Item = Result<AncestorNode, Self::Error>>
    where
        Self: 'a;

    fn ancestors(&self, v: &VersionId) -> Self::Ancestors<'_>;

    fn body(&self, v: &VersionId) -> Result<Option<Value>, Self::Error>;
}

/// Runs the merge engine (spec §4.3) over two heads known to a single
/// [`AncestorSource`]. This is the entry point `MergeTree` calls with
/// `streamX = stage.ancestors(sitem.v) ++ local.ancestors(lhead.v)` and
/// `streamY = local.ancestors(lhead.v)` collapsed into one combined source.
pub fn merge<S: AncestorSource>(
    source: &S,
    x_head: VersionId,
    y_head: VersionId,
) -> Result<MergeOutcome, MergeError<S::Error>> {
    if x_head == y_head {
        return Ok(MergeOutcome::Equal(x_head));
    }

    let lcas = find_lcas(source.ancestors(&x_head), source.ancestors(&y_head))?;
    if lcas.is_empty() {
        // Two roots of the same document created independently (spec
        // §8.4 S2) share no ancestor at all — there is no real base to
        // diff against. Resolve it by using `y`'s own body as the
        // synthetic base: every key where `x` differs from `y` trivially
        // satisfies "y equals base", so `x`'s value wins; keys neither
        // side touched relative to each other pass through unchanged.
        // This can never produce a conflict (the `y == base` branch of
        // `three_way_merge` always applies), which matches S2's outcome
        // of a clean, non-conflicting merge.
        let x_body = source.body(&x_head)?.unwrap_or_else(|| Value::map(std::iter::empty()));
        let y_body = source.body(&y_head)?.unwrap_or_else(|| Value::map(std::iter::empty()));
        return match three_way_merge(&y_body, &x_body, &y_body) {
            ThreeWayResult::Merged(body) => Ok(MergeOutcome::Merge(body)),
            ThreeWayResult::Conflict(attrs) => Ok(MergeOutcome::Conflict(attrs)),
        };
    }

    if lcas.len() == 1 {
        if lcas[0] == x_head {
            return Ok(MergeOutcome::FastForward {
                winner: Side::Y,
                head: y_head,
            });
        }
        if lcas[0] == y_head {
            return Ok(MergeOutcome::FastForward {
                winner: Side::X,
                head: x_head,
            });
        }
    }

    let base_body = reduce_lcas(source, lcas)?;
    let x_body = source.body(&x_head)?.unwrap_or_else(|| Value::map(std::iter::empty()));
    let y_body = source.body(&y_head)?.unwrap_or_else(|| Value::map(std::iter::empty()));

    match three_way_merge(&base_body, &x_body, &y_body) {
        ThreeWayResult::Merged(body) => Ok(MergeOutcome::Merge(body)),
        ThreeWayResult::Conflict(attrs) => Ok(MergeOutcome::Conflict(attrs)),
    }
}

/// Folds a set of lowest common ancestors into a single synthetic base
/// body (spec §4.3.3). Each LCA pair is reduced by finding its own LCA set
/// and recursing; the LCA set strictly shrinks at each step (it drops from
/// the pair down to the LCA of the pair), so this always terminates.
///
/// Open question the spec leaves unresolved: what happens when folding
/// itself produces a `Conflict`. This implementation resolves it by
/// keeping the accumulator body unchanged (first-LCA-wins) rather than
/// failing the whole merge — documented in DESIGN.md.
fn reduce_lcas<S: AncestorSource>(
    source: &S,
    mut lcas: Vec<VersionId>,
) -> Result<Value, MergeError<S::Error>> {
    lcas.sort();
    let mut iter = lcas.into_iter();
    let first = iter.next().ok_or(MergeError::NoCommonAncestor)?;
    let mut acc_id = first;
    let mut acc_body = source.body(&acc_id)?.unwrap_or_else(|| Value::map(std::iter::empty()));

    for next_id in iter {
        let next_body = source.body(&next_id)?.unwrap_or_else(|| Value::map(std::iter::empty()));

        if acc_id == next_id {
            continue;
        }

        let pair_lcas = find_lcas(source.ancestors(&acc_id), source.ancestors(&next_id))?;
        let synthetic_base = if pair_lcas.len() == 1 && pair_lcas[0] == acc_id {
            acc_body.clone()
        } else if pair_lcas.len() == 1 && pair_lcas[0] == next_id {
            next_body.clone()
        } else {
            reduce_lcas(source, pair_lcas)?
        };

        acc_body = match three_way_merge(&synthetic_base, &acc_body, &next_body) {
            ThreeWayResult::Merged(body) => body,
            ThreeWayResult::Conflict(_) => acc_body,
        };
        acc_id = next_id;
    }

    Ok(acc_body)
}
