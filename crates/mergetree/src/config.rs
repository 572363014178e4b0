use std::time::Duration;

use perspectivedb_tree::TreeConfig;

/// Ambient configuration for a `MergeTree` instance: per-tree sizing plus
/// the auto-merge loop's tick interval (spec §5: "configurable interval,
/// default 1000-5000 ms"). No file or environment parsing lives here —
/// hosts construct this directly, config-file plumbing being out of
/// scope (spec.md §1).
#[derive(Debug, Clone, Copy)]
pub struct MergeTreeConfig {
    pub tree: TreeConfig,
    pub merge_interval: Duration,
}

impl Default for MergeTreeConfig {
    fn default() -> Self {
        Self {
            tree: TreeConfig::default(),
            merge_interval: Duration::from_secs(2),
        }
    }
}
