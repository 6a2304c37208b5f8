//! All-paths depth-first enumeration.
//!
//! State machine: a stack of per-depth frontier lists (`levels`), the
//! current path, and the traversal bounds. `next` pops a frontier node,
//! extends the path, expands neighbors when the depth and cycle rules
//! allow, and yields whenever the path lands inside the length window.
//!
//! Cycle rule: a path may close a cycle (a node can appear twice) but a
//! node already on the path is never expanded through, so no node
//! appears a third time.

use crate::error::{GraphError, GraphResult};
use crate::execution::{CancelToken, DEFAULT_BATCH_SIZE};
use crate::graph::{Direction, Edge, Graph};
use crate::ids::{NodeId, RelationId, NO_RELATION};
use crate::traverse::{EdgeFilter, Path};

/// One frontier entry: a node plus the edge that led to it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LevelConnection {
    pub(crate) node: NodeId,
    pub(crate) edge: Option<Edge>,
}

/// External iterator over every admissible path from a source node.
pub struct AllPathsCtx<'a> {
    pub(crate) graph: &'a Graph,
    pub(crate) levels: Vec<Vec<LevelConnection>>,
    pub(crate) path: Path,
    pub(crate) neighbors: Vec<Edge>,
    pub(crate) dir: Direction,
    pub(crate) relations: Vec<RelationId>,
    /// Minimum path length in nodes (requested edge count + 1)
    pub(crate) min_len: u64,
    /// Maximum path length in nodes, saturated for unbounded traversals
    pub(crate) max_len: u64,
    pub(crate) dst: Option<NodeId>,
    pub(crate) filter: Option<&'a EdgeFilter>,
    pub(crate) cancel: Option<CancelToken>,
    pub(crate) batch_size: usize,
    pub(crate) steps: usize,
}

impl<'a> AllPathsCtx<'a> {
    /// Build a traversal from `src`. `min_len`/`max_len` bound the EDGE
    /// count; `max_len = None` is unbounded. An empty relation list
    /// traverses every relation type.
    pub fn new(
        graph: &'a Graph,
        src: NodeId,
        dst: Option<NodeId>,
        relations: &[RelationId],
        dir: Direction,
        min_len: u32,
        max_len: Option<u32>,
        filter: Option<&'a EdgeFilter>,
    ) -> GraphResult<Self> {
        if graph.get_node(src).is_none() {
            return Err(GraphError::NotFound);
        }
        for &r in relations {
            if r != NO_RELATION && usize::try_from(r).is_err() {
                return Err(GraphError::invalid(format!("invalid relation id {r}")));
            }
        }

        let relations = if relations.is_empty() {
            vec![NO_RELATION]
        } else {
            relations.to_vec()
        };

        // the path is stored as nodes, so a traversal of min..max edges
        // holds min+1..max+1 nodes
        let mut ctx = AllPathsCtx {
            graph,
            levels: Vec::new(),
            path: Path::new(),
            neighbors: Vec::new(),
            dir,
            relations,
            min_len: u64::from(min_len) + 1,
            max_len: max_len.map_or(u64::MAX, |m| u64::from(m) + 1),
            dst,
            filter,
            cancel: None,
            batch_size: DEFAULT_BATCH_SIZE,
            steps: 0,
        };
        ctx.add_connection(0, src, None);
        Ok(ctx)
    }

    /// Arm cooperative cancellation: the traversal polls the token every
    /// `batch_size` expansion steps and stops yielding once it trips.
    pub fn with_cancellation(mut self, token: &CancelToken, batch_size: usize) -> Self {
        self.cancel = Some(token.clone());
        self.batch_size = batch_size.max(1);
        self
    }

    /// Batch-bounded poll; `true` once the token has tripped.
    pub(crate) fn cancelled(&mut self) -> bool {
        let Some(token) = &self.cancel else {
            return false;
        };
        let tripped = token.check_batch(self.steps, self.batch_size).is_err();
        self.steps += 1;
        tripped
    }

    pub(crate) fn add_connection(&mut self, level: usize, node: NodeId, edge: Option<Edge>) {
        while self.levels.len() <= level {
            self.levels.push(Vec::new());
        }
        self.levels[level].push(LevelConnection { node, edge });
    }

    pub(crate) fn level_not_empty(&self, level: usize) -> bool {
        self.levels.get(level).is_some_and(|l| !l.is_empty())
    }

    /// Expand `frontier` in one concrete direction, appending unfiltered
    /// neighbors to `depth`'s frontier list.
    pub(crate) fn add_neighbors(
        &mut self,
        frontier: LevelConnection,
        depth: usize,
        dir: Direction,
    ) {
        debug_assert!(dir != Direction::Both);

        // don't follow the edge that brought us here back again
        let frontier_edge = if depth > 1 {
            frontier.edge.map(|e| e.id)
        } else {
            None
        };

        let mut neighbors = std::mem::take(&mut self.neighbors);
        for &r in &self.relations {
            neighbors.extend(
                self.graph
                    .node_edges(frontier.node, dir, r)
                    .unwrap_or_default(),
            );
        }

        if let Some(filter) = self.filter {
            neighbors.retain(|e| filter(e));
        }

        for e in neighbors.drain(..) {
            if Some(e.id) == frontier_edge {
                continue;
            }
            let neighbor = match dir {
                Direction::Outgoing => e.dest,
                Direction::Incoming => e.src,
                Direction::Both => unreachable!("bidirectional expansion is decomposed"),
            };
            self.add_connection(depth, neighbor, Some(e));
        }
        self.neighbors = neighbors;
    }

    /// The next admissible path, or `None` when the traversal is
    /// exhausted or its cancellation token tripped at a batch boundary.
    /// The returned path is aliased and only lives until the next call.
    pub fn next(&mut self) -> Option<&Path> {
        while !self.path.is_empty() || self.level_not_empty(0) {
            if self.cancelled() {
                return None;
            }

            let depth = self.path.node_count();

            if !self.level_not_empty(depth) {
                // no way to advance, backtrack
                self.path.pop_node();
                if self.path.edge_count() > 0 {
                    self.path.pop_edge();
                }
                continue;
            }

            let Some(frontier) = self.levels[depth].pop() else {
                continue;
            };

            // a cycle may be closed once, but a node already on the path
            // is not expanded through
            let frontier_already_on_path = self.path.contains_node(frontier.node);

            self.path.append_node(frontier.node);
            if depth > 0 {
                if let Some(e) = frontier.edge {
                    self.path.append_edge(e);
                }
            }
            let depth = depth + 1;

            if (depth as u64) < self.max_len && !frontier_already_on_path {
                let mut dir = self.dir;
                if dir == Direction::Both {
                    // bidirectional expansion collects incoming first,
                    // then falls through to outgoing
                    self.add_neighbors(frontier, depth, Direction::Incoming);
                    dir = Direction::Outgoing;
                }
                self.add_neighbors(frontier, depth, dir);
            }

            if (depth as u64) >= self.min_len && (depth as u64) <= self.max_len {
                if let Some(dst) = self.dst {
                    // a destination-constrained traversal yields real
                    // paths, not the bare source
                    if self.path.edge_count() == 0 || self.path.head() != Some(dst) {
                        continue;
                    }
                }
                return Some(&self.path);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0 -> 1, 0 -> 2, 1 -> 0, 1 -> 2, 2 -> 1, 2 -> 3, 3 -> 0
    fn diamond() -> Graph {
        let mut g = Graph::new("paths");
        let r = g.add_relation("R");
        for _ in 0..4 {
            g.create_node(&[]).unwrap();
        }
        for (s, d) in [(0, 1), (0, 2), (1, 0), (1, 2), (2, 1), (2, 3), (3, 0)] {
            g.create_edge(s, d, r).unwrap();
        }
        g
    }

    fn collect_paths(ctx: &mut AllPathsCtx<'_>) -> Vec<Vec<NodeId>> {
        let mut out = Vec::new();
        while let Some(p) = ctx.next() {
            out.push(p.nodes().to_vec());
        }
        out
    }

    #[test]
    fn test_up_to_three_legs() {
        let g = diamond();
        let mut ctx =
            AllPathsCtx::new(&g, 0, None, &[], Direction::Outgoing, 0, Some(3), None).unwrap();
        let mut paths = collect_paths(&mut ctx);
        paths.sort();

        let mut expected: Vec<Vec<NodeId>> = vec![
            vec![0],
            vec![0, 1],
            vec![0, 2],
            vec![0, 1, 0],
            vec![0, 1, 2],
            vec![0, 2, 1],
            vec![0, 2, 3],
            vec![0, 1, 2, 1],
            vec![0, 1, 2, 3],
            vec![0, 2, 1, 0],
            vec![0, 2, 1, 2],
            vec![0, 2, 3, 0],
        ];
        expected.sort();
        assert_eq!(paths, expected);
    }

    #[test]
    fn test_destination_constrained_unbounded() {
        let g = diamond();
        let mut ctx =
            AllPathsCtx::new(&g, 0, Some(0), &[], Direction::Outgoing, 0, None, None).unwrap();
        let mut paths = collect_paths(&mut ctx);
        paths.sort();

        let mut expected: Vec<Vec<NodeId>> = vec![
            vec![0, 1, 0],
            vec![0, 1, 2, 3, 0],
            vec![0, 2, 1, 0],
            vec![0, 2, 3, 0],
        ];
        expected.sort();
        assert_eq!(paths, expected);
    }

    #[test]
    fn test_length_window_and_cycle_rule() {
        let g = diamond();
        let mut ctx =
            AllPathsCtx::new(&g, 0, None, &[], Direction::Outgoing, 1, Some(6), None).unwrap();
        while let Some(p) = ctx.next() {
            assert!(p.edge_count() >= 1 && p.edge_count() <= 6);
            for &n in p.nodes() {
                assert!(p.node_occurrences(n) <= 2, "node {n} appears 3+ times");
            }
        }
    }

    #[test]
    fn test_tripped_token_stops_enumeration() {
        let g = diamond();
        let token = CancelToken::infinite();
        token.cancel();
        let mut ctx =
            AllPathsCtx::new(&g, 0, None, &[], Direction::Outgoing, 0, Some(3), None)
                .unwrap()
                .with_cancellation(&token, 1);
        assert!(ctx.next().is_none());
    }

    #[test]
    fn test_edge_filter_prunes_frontiers() {
        let g = diamond();
        // forbid walking through 2 -> 3
        let filter = |e: &Edge| !(e.src == 2 && e.dest == 3);
        let mut ctx = AllPathsCtx::new(
            &g,
            0,
            None,
            &[],
            Direction::Outgoing,
            0,
            Some(3),
            Some(&filter),
        )
        .unwrap();
        while let Some(p) = ctx.next() {
            assert!(!p.edges().iter().any(|e| e.src == 2 && e.dest == 3));
        }
    }
}
