use perspectivedb_primitives::{Value, VersionId};

/// Which of the two inputs was behind (and is now advanced) in a
/// `FastForward` outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    X,
    Y,
}

/// What the merge engine produces for a pair of heads (spec §4.3.4).
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Both heads already agree.
    Equal(VersionId),
    /// The LCA equals one head; `winner` names the side whose head was
    /// ahead, `head` is that head (the fast-forward result).
    FastForward { winner: Side, head: VersionId },
    /// A genuine three-way merge produced this body. The caller builds the
    /// merged header with `pa = sort([x_head, y_head])`.
    Merge(Value),
    /// These attribute paths conflict and need a conflict handler.
    Conflict(Vec<String>),
}
