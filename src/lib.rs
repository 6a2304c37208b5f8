//! # DeltaGraph
//!
//! A property-graph database core that stores graphs as sparse adjacency
//! matrices and answers graph queries by translating them into sparse
//! linear algebra over a semiring.
//!
//! ## Architecture
//!
//! ```text
//! Query planner (host)
//!     |
//! [algebra]     MUL/ADD/TRANSPOSE expression trees + traversal orderer
//!     |
//! [graph]       node/edge records, label & relation matrices,
//!     |         adjacency, node-labels, statistics, sync policies
//! [matrix]      delta matrices: base + pending additions/deletions,
//!     |         transpose twins, multi-edge encoding, lazy flush
//! [sparse]      generic sparse matrices, semirings, row iterators
//!
//! [traverse]    all paths / all shortest paths / BFS over the same
//!               matrices, via delta iterators
//! [mvcc]        version broker: snapshot reads, versioned object frees
//! ```
//!
//! Storage is column-for-column: a graph of `N` nodes is a set of
//! logically `N x N` boolean and `u64` matrices. An edge create is two
//! matrix cell updates; a traversal step is a masked matrix product or a
//! row scan. Mutations land in per-matrix delta overlays and are merged
//! into the base lazily, so hot write paths never rebuild a matrix.
//!
//! ## Usage
//!
//! ```rust
//! use deltagraph::graph::{Direction, Graph};
//! use deltagraph::ids::NO_RELATION;
//!
//! let mut g = Graph::new("social");
//! let person = g.add_label("Person");
//! let knows = g.add_relation("KNOWS");
//!
//! let alice = g.create_node(&[person]).unwrap();
//! let bob = g.create_node(&[person]).unwrap();
//! let e = g.create_edge(alice, bob, knows).unwrap();
//!
//! let edges = g.node_edges(alice, Direction::Both, NO_RELATION).unwrap();
//! assert_eq!(edges[0].id, e);
//! ```
//!
//! Out of scope here, consumed through narrow interfaces: the query
//! parser and AST, command dispatch, serialization, secondary indices,
//! and the reply layer.

pub mod algebra;
pub mod config;
pub mod error;
pub mod execution;
pub mod graph;
pub mod ids;
pub mod matrix;
pub mod mvcc;
pub mod pool;
pub mod sparse;
pub mod traverse;
pub mod value;

// Re-export the types nearly every consumer touches
pub use config::Config;
pub use error::{GraphError, GraphResult};
pub use graph::{Direction, Edge, Graph, SharedGraph, SyncPolicy};
pub use matrix::{DeltaIterator, DeltaMatrix};
pub use mvcc::VersionBroker;
pub use traverse::Path;
pub use value::Value;
