//! All shortest paths between two nodes.
//!
//! Phase A: forward BFS from the source until the destination is visited
//! or the depth bound is exceeded, recording expanded nodes in a boolean
//! reachability vector.
//!
//! Phase B: reverse depth-first enumeration from the destination,
//! constrained to visited nodes and to the minimum length found, yielding
//! each shortest path. The traversal direction is flipped for every
//! expansion since the walk runs destination to source.

use crate::error::GraphResult;
use crate::execution::CancelToken;
use crate::graph::{Direction, Graph};
use crate::ids::{NodeId, RelationId};
use crate::traverse::all_paths::AllPathsCtx;
use crate::traverse::{EdgeFilter, Path};

/// External iterator over every minimum-length path `src -> dest`.
pub struct AllShortestPathsCtx<'a> {
    ctx: AllPathsCtx<'a>,
    visited: Vec<bool>,
    src: NodeId,
}

impl<'a> AllShortestPathsCtx<'a> {
    /// Probe the minimum length and prepare the reverse enumeration.
    /// Returns `None` when `dest` is unreachable from `src` within
    /// `max_len` edges, or when `cancel` trips during the forward probe.
    pub fn new(
        graph: &'a Graph,
        src: NodeId,
        dest: NodeId,
        relations: &[RelationId],
        dir: Direction,
        max_len: u32,
        filter: Option<&'a EdgeFilter>,
        cancel: Option<&CancelToken>,
    ) -> GraphResult<Option<Self>> {
        let mut ctx = AllPathsCtx::new(
            graph,
            src,
            Some(dest),
            relations,
            dir,
            1,
            Some(max_len),
            filter,
        )?;
        if let Some(token) = cancel {
            let batch = ctx.batch_size;
            ctx = ctx.with_cancellation(token, batch);
        }

        let mut visited = vec![false; graph.required_matrix_dim() as usize];
        let min_nodes = Self::find_minimum_length(&mut ctx, dest, &mut visited);
        if min_nodes == 0 {
            return Ok(None);
        }

        // phase B walks backwards from the destination, pinned to the
        // discovered length
        ctx.levels.clear();
        ctx.path.clear();
        ctx.add_connection(0, dest, None);
        ctx.min_len = u64::from(min_nodes);
        ctx.max_len = u64::from(min_nodes);
        ctx.dst = Some(src);

        Ok(Some(AllShortestPathsCtx { ctx, visited, src }))
    }

    /// Forward BFS until `dest` is reached; marks expanded nodes (and the
    /// destination level's remainder) visited. Returns the shortest path
    /// length in NODES, zero when unreachable.
    fn find_minimum_length(ctx: &mut AllPathsCtx<'_>, dest: NodeId, visited: &mut [bool]) -> u32 {
        let mut depth = 0usize;

        loop {
            if ctx.cancelled() {
                return 0;
            }

            while !ctx.level_not_empty(depth) {
                depth += 1;
                if depth as u64 >= ctx.max_len || depth >= ctx.levels.len() {
                    return 0;
                }
            }

            let Some(frontier) = ctx.levels[depth].pop() else {
                continue;
            };

            if frontier.node == dest && depth > 0 {
                // every node queued at this level sits at the same
                // shortest distance
                visited[dest as usize] = true;
                for peer in &ctx.levels[depth] {
                    visited[peer.node as usize] = true;
                }
                ctx.levels[depth].clear();
                if depth + 1 < ctx.levels.len() {
                    ctx.levels[depth + 1].clear();
                }
                return (depth + 1) as u32;
            }

            if (depth as u64) < ctx.max_len - 1 && !visited[frontier.node as usize] {
                visited[frontier.node as usize] = true;
                let mut dir = ctx.dir;
                if dir == Direction::Both {
                    ctx.add_neighbors(frontier, depth + 1, Direction::Incoming);
                    dir = Direction::Outgoing;
                }
                ctx.add_neighbors(frontier, depth + 1, dir);
            }
        }
    }

    /// Shortest path length in edges.
    pub fn path_len(&self) -> u32 {
        (self.ctx.min_len - 1) as u32
    }

    /// The next shortest path, in source-to-destination order.
    pub fn next_path(&mut self) -> Option<Path> {
        let max_len = self.ctx.max_len;
        let mut depth = self.ctx.path.node_count();

        if depth > 0 {
            // backtrack off the previously yielded path
            self.ctx.path.pop_node();
            if self.ctx.path.edge_count() > 0 {
                self.ctx.path.pop_edge();
            }
            depth -= 1;
        }

        while (depth as u64) < max_len {
            if self.ctx.cancelled() {
                return None;
            }

            if self.ctx.level_not_empty(depth) {
                let Some(frontier) = self.ctx.levels[depth].pop() else {
                    continue;
                };

                // walk only through nodes the forward probe reached
                if !self.visited[frontier.node as usize] {
                    continue;
                }
                // the final position must land back on the source
                if depth as u64 == max_len - 1 && frontier.node != self.src {
                    continue;
                }

                self.ctx.path.append_node(frontier.node);
                if depth > 0 {
                    if let Some(e) = frontier.edge {
                        self.ctx.path.append_edge(e);
                    }
                }
                depth += 1;

                if (depth as u64) < max_len {
                    // expansion runs against the traversal direction
                    match self.ctx.dir {
                        Direction::Both => {
                            self.ctx.add_neighbors(frontier, depth, Direction::Incoming);
                            self.ctx.add_neighbors(frontier, depth, Direction::Outgoing);
                        }
                        Direction::Incoming => {
                            self.ctx.add_neighbors(frontier, depth, Direction::Outgoing);
                        }
                        Direction::Outgoing => {
                            self.ctx.add_neighbors(frontier, depth, Direction::Incoming);
                        }
                    }
                }
            } else if depth == 0 {
                return None;
            } else {
                self.ctx.path.pop_node();
                if self.ctx.path.edge_count() > 0 {
                    self.ctx.path.pop_edge();
                }
                depth -= 1;
            }
        }

        // path runs dest -> src; yield it the right way around
        let mut out = self.ctx.path.clone();
        out.reverse();
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two parallel shortest routes 0 -> 3 of length 2, plus a longer one.
    fn braid() -> Graph {
        let mut g = Graph::new("braid");
        let r = g.add_relation("R");
        for _ in 0..5 {
            g.create_node(&[]).unwrap();
        }
        for (s, d) in [(0, 1), (0, 2), (1, 3), (2, 3), (0, 4), (4, 1)] {
            g.create_edge(s, d, r).unwrap();
        }
        g
    }

    #[test]
    fn test_finds_all_minimum_length_paths() {
        let g = braid();
        let mut ctx = AllShortestPathsCtx::new(&g, 0, 3, &[], Direction::Outgoing, 8, None, None)
            .unwrap()
            .expect("3 is reachable");
        assert_eq!(ctx.path_len(), 2);

        let mut paths = Vec::new();
        while let Some(p) = ctx.next_path() {
            assert_eq!(p.edge_count(), 2);
            assert_eq!(p.nodes()[0], 0);
            assert_eq!(p.head(), Some(3));
            paths.push(p.nodes().to_vec());
        }
        paths.sort();
        assert_eq!(paths, vec![vec![0, 1, 3], vec![0, 2, 3]]);
    }

    #[test]
    fn test_unreachable_destination() {
        let mut g = Graph::new("disconnected");
        let r = g.add_relation("R");
        for _ in 0..3 {
            g.create_node(&[]).unwrap();
        }
        g.create_edge(0, 1, r).unwrap();
        let ctx =
            AllShortestPathsCtx::new(&g, 0, 2, &[], Direction::Outgoing, 4, None, None).unwrap();
        assert!(ctx.is_none());
    }

    #[test]
    fn test_cancelled_probe_finds_nothing() {
        let g = braid();
        let token = CancelToken::infinite();
        token.cancel();
        let ctx =
            AllShortestPathsCtx::new(&g, 0, 3, &[], Direction::Outgoing, 8, None, Some(&token))
                .unwrap();
        assert!(ctx.is_none());
    }
}
