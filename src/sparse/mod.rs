//! # Sparse Linear Algebra Backend
//!
//! Generic sparse matrices plus the semiring operations the graph core
//! evaluates traversals with. The delta-matrix layer composes three of
//! these per logical matrix; traversal operators multiply them.
//!
//! ## Architecture
//!
//! ```text
//! SparseMatrix<T>            row-major map of maps, tracked nvals
//!   |-- element ops          get / set / remove / clear / resize
//!   |-- whole-matrix ops     transpose, extract, apply, reduce,
//!   |                        masked assigns
//!   `-- RowIterator          row-wise scan with seek_row / jump
//! ops
//!   |-- Semiring<A, B, C>    first-class (+, x) pair for mxm
//!   `-- BinaryOp<A, B, C>    first-class combiner for eWiseAdd
//! ```
//!
//! Elements are `bool` or `u64`; the type is fixed at compile time and the
//! combinators are plain function values, so there is no opcode dispatch
//! on the hot path.

pub mod iter;
pub mod matrix;
pub mod ops;

pub use iter::RowIterator;
pub use matrix::{Element, SparseMatrix};
pub use ops::{
    BinaryOp, Semiring, ANY_PAIR_BOOL, ANY_PAIR_U64, BOOL_OR_AND, SECOND_BOOL, SECOND_U64,
    U64_PLUS_TIMES,
};

/// Matrix coordinate
pub type Coord = u64;
