//! Single-source BFS reachability.
//!
//! Used by the procedure-call layer: produces the reachable node ids and,
//! on request, a parent vector for path reconstruction. Flat matrices are
//! extracted from the chosen relation's delta matrix (and its transpose)
//! once, for the duration of the call; results beyond the depth bound are
//! clipped.

use crate::error::GraphResult;
use crate::execution::{CancelToken, DEFAULT_BATCH_SIZE};
use crate::graph::{Direction, Graph};
use crate::ids::{NodeId, RelationId, INVALID_ID, NO_RELATION};
use crate::sparse::SparseMatrix;

/// Output of a [`bfs`] call.
#[derive(Debug, Clone)]
pub struct BfsResult {
    /// Reachable node ids, in discovery order; includes the source
    pub nodes: Vec<NodeId>,
    /// `parents[n]` is the node `n` was discovered from (`INVALID_ID`
    /// for the source and unreached nodes); present when requested
    pub parents: Option<Vec<NodeId>>,
}

/// Breadth-first search from `src` along `relation` (or every relation
/// via the adjacency matrix), clipped at `max_depth` edges. A tripped
/// cancellation token clips the result at the next batch boundary, the
/// same way the depth bound does.
pub fn bfs(
    graph: &Graph,
    src: NodeId,
    relation: RelationId,
    dir: Direction,
    max_depth: u32,
    track_parents: bool,
    cancel: Option<&CancelToken>,
) -> GraphResult<BfsResult> {
    // extract flat views once; the traversal never touches the live
    // delta matrices after this point
    let (flat, flat_t): (SparseMatrix<bool>, SparseMatrix<bool>) = if relation == NO_RELATION {
        let adj = graph.adjacency_matrix();
        let fwd = adj.export();
        let bwd = adj.transposed().map_or_else(|| fwd.transpose(), |t| t.export());
        (fwd, bwd)
    } else {
        let m = graph.relation_matrix(relation)?;
        let fwd = m.export().to_pattern();
        let bwd = m
            .transposed()
            .map_or_else(|| fwd.transpose(), |t| t.export().to_pattern());
        (fwd, bwd)
    };

    if graph.get_node(src).is_none() {
        return Err(crate::error::GraphError::NotFound);
    }

    let dim = graph.required_matrix_dim() as usize;
    let mut seen = vec![false; dim];
    let mut parents = track_parents.then(|| vec![INVALID_ID; dim]);

    let mut nodes = Vec::new();
    let mut frontier = vec![src];
    seen[src as usize] = true;
    nodes.push(src);

    let forward = matches!(dir, Direction::Outgoing | Direction::Both);
    let backward = matches!(dir, Direction::Incoming | Direction::Both);

    let mut depth = 0;
    let mut visited_count = 0usize;
    'levels: while !frontier.is_empty() && depth < max_depth {
        let mut next = Vec::new();
        for &n in &frontier {
            if let Some(token) = cancel {
                if token.check_batch(visited_count, DEFAULT_BATCH_SIZE).is_err() {
                    break 'levels;
                }
            }
            visited_count += 1;

            let neighbors = flat
                .row_iter(n)
                .filter(|_| forward)
                .map(|(j, _)| j)
                .chain(flat_t.row_iter(n).filter(|_| backward).map(|(j, _)| j));
            for j in neighbors {
                if seen[j as usize] {
                    continue;
                }
                seen[j as usize] = true;
                if let Some(p) = parents.as_mut() {
                    p[j as usize] = n;
                }
                nodes.push(j);
                next.push(j);
            }
        }
        frontier = next;
        depth += 1;
    }

    Ok(BfsResult { nodes, parents })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Graph {
        let mut g = Graph::new("line");
        let r = g.add_relation("R");
        for _ in 0..5 {
            g.create_node(&[]).unwrap();
        }
        for (s, d) in [(0, 1), (1, 2), (2, 3), (3, 4)] {
            g.create_edge(s, d, r).unwrap();
        }
        g
    }

    #[test]
    fn test_depth_clipping() {
        let g = line();
        let res = bfs(&g, 0, 0, Direction::Outgoing, 2, false, None).unwrap();
        assert_eq!(res.nodes, vec![0, 1, 2]);
        assert!(res.parents.is_none());
    }

    #[test]
    fn test_parent_vector() {
        let g = line();
        let res = bfs(&g, 0, 0, Direction::Outgoing, 10, true, None).unwrap();
        let parents = res.parents.expect("requested");
        assert_eq!(parents[0], INVALID_ID);
        assert_eq!(parents[1], 0);
        assert_eq!(parents[4], 3);
    }

    #[test]
    fn test_incoming_direction() {
        let g = line();
        let res = bfs(&g, 4, 0, Direction::Incoming, 10, false, None).unwrap();
        assert_eq!(res.nodes, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_sees_unflushed_edges() {
        let mut g = line();
        g.create_edge(4, 0, 0).unwrap();
        // no flush; the exported view still carries the pending addition
        let res = bfs(&g, 4, 0, Direction::Outgoing, 3, false, None).unwrap();
        assert!(res.nodes.contains(&0));
    }
}
