//! Depth-bounded neighbor enumeration.
//!
//! Yields every node reachable from the source within `[min_len,
//! max_len]` hops over a flat connection matrix, walking depth-first.
//! The current DFS branch is tracked so a node is not expanded through
//! twice on one branch; a node reachable along several branches is
//! yielded once per branch.

use crate::execution::{CancelToken, DEFAULT_BATCH_SIZE};
use crate::ids::NodeId;
use crate::sparse::SparseMatrix;

/// External iterator over reachable neighbors.
pub struct AllNeighborsCtx {
    m: SparseMatrix<bool>,
    min_len: u32,
    max_len: u32,
    /// Pending neighbors per depth; `levels[i]` holds nodes at i+1 hops
    levels: Vec<Vec<NodeId>>,
    /// Nodes on the current DFS branch, source first
    branch: Vec<NodeId>,
    cancel: Option<CancelToken>,
    batch_size: usize,
    steps: usize,
}

impl AllNeighborsCtx {
    /// `m` is a flat connection matrix (typically an exported adjacency
    /// or relation pattern); bounds are hop counts.
    pub fn new(src: NodeId, m: SparseMatrix<bool>, min_len: u32, max_len: u32) -> Self {
        let mut ctx = AllNeighborsCtx {
            m,
            min_len,
            max_len,
            levels: Vec::new(),
            branch: vec![src],
            cancel: None,
            batch_size: DEFAULT_BATCH_SIZE,
            steps: 0,
        };
        ctx.collect_neighbors(src);
        ctx
    }

    /// Arm cooperative cancellation, polled every `batch_size` steps.
    pub fn with_cancellation(mut self, token: &CancelToken, batch_size: usize) -> Self {
        self.cancel = Some(token.clone());
        self.batch_size = batch_size.max(1);
        self
    }

    fn collect_neighbors(&mut self, node: NodeId) {
        let next: Vec<NodeId> = self.m.row_iter(node).map(|(j, _)| j).collect();
        self.levels.push(next);
    }

    /// The next neighbor id, or `None` when the traversal is exhausted
    /// or its cancellation token tripped at a batch boundary.
    pub fn next_neighbor(&mut self) -> Option<NodeId> {
        loop {
            if let Some(token) = &self.cancel {
                if token.check_batch(self.steps, self.batch_size).is_err() {
                    return None;
                }
            }
            self.steps += 1;

            let level = self.levels.last_mut()?;
            let Some(dest) = level.pop() else {
                // branch exhausted, roll back
                self.levels.pop();
                self.branch.pop();
                continue;
            };

            // replace the branch frontier with the current node
            self.branch.truncate(self.levels.len());
            self.branch.push(dest);
            let depth = self.levels.len() as u32;

            if depth < self.min_len {
                // keep descending without yielding
                self.collect_neighbors(dest);
                continue;
            }

            if depth < self.max_len && !self.branch[..self.branch.len() - 1].contains(&dest) {
                self.collect_neighbors(dest);
            }

            return Some(dest);
        }
    }
}
