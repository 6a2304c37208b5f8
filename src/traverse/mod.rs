//! # Traversal Engine
//!
//! Path-shaped query operators: depth-first all-paths enumeration with
//! cycle rules and length bounds, all-shortest-paths (forward BFS probe
//! plus constrained reverse DFS), single-source BFS reachability, and
//! depth-bounded neighbor enumeration. All of them consume the graph
//! store through matrix iterators.
//!
//! Traversals are external iterators: a context object with a `next`
//! method and no heap-allocated continuation. The path handed out by
//! `next` is aliased; callers clone it before the next call if they need
//! to keep it.

pub mod all_neighbors;
pub mod all_paths;
pub mod all_shortest;
pub mod bfs;
pub mod path;

pub use all_neighbors::AllNeighborsCtx;
pub use all_paths::AllPathsCtx;
pub use all_shortest::AllShortestPathsCtx;
pub use bfs::{bfs, BfsResult};
pub use path::Path;

use crate::graph::Edge;

/// Edge predicate the host distils from its filter tree; every candidate
/// edge must pass before it joins a frontier.
pub type EdgeFilter = dyn Fn(&Edge) -> bool + Send + Sync;
