//! Bulk deletion paths.
//!
//! Node deletion runs in two phases to avoid repeated flushes of the
//! node-labels matrix:
//!
//! 1. For each deleted node, walk its node-labels row, clear the entry in
//!    every applicable label matrix, and collect the visited `(node,
//!    label)` coordinates into a temporary mask.
//! 2. Apply the mask to the node-labels matrix in a single pass.
//!
//! The sync policy is parked at `Nop` for the duration so matrix accesses
//! inside the procedure neither flush nor resize mid-deletion.
//!
//! Both procedures poll an optional cancellation token once per batch of
//! entities. A tripped token stops the deletion at the batch boundary
//! with the work so far applied (phase two still runs for the processed
//! nodes, keeping the matrices consistent) and the counts reported; there
//! is no rollback.

use crate::error::GraphResult;
use crate::execution::{CancelToken, DEFAULT_BATCH_SIZE};
use crate::graph::{Direction, Graph, SyncPolicy};
use crate::ids::{EdgeId, NodeId, NO_RELATION};
use crate::sparse::SparseMatrix;
use tracing::debug;

fn tripped(cancel: Option<&CancelToken>, i: usize) -> bool {
    cancel.is_some_and(|t| t.check_batch(i, DEFAULT_BATCH_SIZE).is_err())
}

impl Graph {
    /// Delete detached nodes in bulk (two-phase).
    ///
    /// Nodes are assumed to have no incoming or outgoing edges; use
    /// [`Graph::bulk_delete`] for the general case.
    pub fn delete_nodes(
        &mut self,
        node_ids: &[NodeId],
        cancel: Option<&CancelToken>,
    ) -> GraphResult<u64> {
        if node_ids.is_empty() {
            return Ok(0);
        }

        let prev_policy = self.matrix_policy();
        self.set_matrix_policy(SyncPolicy::Nop);

        let dim = self.required_matrix_dim();
        let mut mask: SparseMatrix<bool> = SparseMatrix::new(dim, dim);
        let mut deleted = 0;

        // phase one: clear label matrices, collect the mask
        for (i, &n) in node_ids.iter().enumerate() {
            if tripped(cancel, i) {
                break;
            }
            if !self.nodes.contains(n) {
                continue;
            }

            for l in self.labels_of(n) {
                let idx = l as usize;
                mask.set(n, l as u64, true)?;
                // per-cell misses are counted, not fatal
                let _ = self.labels[idx].write().remove(n, n);
                self.stats.dec_node_count(idx, 1);
            }

            self.nodes.delete(n);
            deleted += 1;
        }

        // phase two: strike the collected coordinates out of the
        // node-labels matrix in one masked pass
        self.node_labels.write().remove_masked(&mask);

        self.set_matrix_policy(prev_policy);
        debug!(deleted, "bulk node deletion complete");
        Ok(deleted)
    }

    /// Remove nodes and edges in bulk. Inputs are deduplicated; edges
    /// incident to deleted nodes are removed implicitly and dropped from
    /// the explicit edge list. Returns `(nodes_deleted, edges_deleted)`.
    pub fn bulk_delete(
        &mut self,
        nodes: &[NodeId],
        edges: &[EdgeId],
        cancel: Option<&CancelToken>,
    ) -> GraphResult<(u64, u64)> {
        let mut nodes_deleted = 0;
        let mut edges_deleted = 0;

        //----------------------------------------------------------------------
        // nodes, with their incident edges
        //----------------------------------------------------------------------

        let mut distinct_nodes: Vec<NodeId> = nodes
            .iter()
            .copied()
            .filter(|&n| self.nodes.contains(n))
            .collect();
        distinct_nodes.sort_unstable();
        distinct_nodes.dedup();

        if !distinct_nodes.is_empty() {
            // collect every edge touching a doomed node
            let mut incident = Vec::new();
            for &n in &distinct_nodes {
                incident.extend(self.node_edges(n, Direction::Both, NO_RELATION)?);
            }
            incident.sort_unstable_by_key(|e| e.id);
            incident.dedup_by_key(|e| e.id);

            // drop the whole cell in both the adjacency and the relation
            // matrix: every edge between the pair is incident to the
            // deleted endpoint and dies with it
            for (i, e) in incident.iter().enumerate() {
                if tripped(cancel, i) {
                    break;
                }
                let _ = self.adjacency.write().remove(e.src, e.dest);
                let _ = self.relations[e.relation as usize]
                    .write()
                    .remove(e.src, e.dest);
                if self.edges.delete(e.id).is_some() {
                    self.stats.dec_edge_count(e.relation as usize, 1);
                    edges_deleted += 1;
                }
            }

            nodes_deleted = self.delete_nodes(&distinct_nodes, cancel)?;
        }

        //----------------------------------------------------------------------
        // explicit edges that survived the node phase
        //----------------------------------------------------------------------

        let mut remaining: Vec<EdgeId> = edges
            .iter()
            .copied()
            .filter(|&e| self.edges.contains(e))
            .collect();
        remaining.sort_unstable();
        remaining.dedup();

        for (i, e) in remaining.into_iter().enumerate() {
            if tripped(cancel, i) {
                break;
            }
            if self.delete_edge(e).is_ok() {
                edges_deleted += 1;
            }
        }

        Ok((nodes_deleted, edges_deleted))
    }
}
