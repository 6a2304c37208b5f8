//! Matrix synchronization policies.
//!
//! Every matrix accessor on the graph runs the installed policy before
//! handing out the matrix. The policy is swapped atomically, so changing
//! it never requires holding a lock; it is set at most once per logical
//! batch (query start, bulk-load start, teardown).

use serde::{Deserialize, Serialize};

/// What a matrix access does before returning the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    /// Resize to the required dimension and flush pending deltas once
    /// they cross the threshold. The default query-time behavior.
    FlushResize,
    /// Resize to the current node capacity without flushing. Bulk-load
    /// behavior.
    ResizeOnly,
    /// Leave matrices untouched. Teardown and internal deletion phases.
    Nop,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy::FlushResize
    }
}
