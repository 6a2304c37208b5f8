//! Graph Core Error Types

use thiserror::Error;

/// Errors surfaced by the graph core.
///
/// Bulk operations that touch many cells do not roll back on a per-cell
/// [`GraphError::NotFound`]; they count the miss and continue. Allocation
/// failures unwind the enclosing operation after freeing partial state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Deletion or lookup of an absent entry
    #[error("entry not found")]
    NotFound,

    /// An expected cell has no entry
    #[error("no value at requested position")]
    NoValue,

    /// Iterator has yielded its final tuple; not an error condition
    #[error("iterator exhausted")]
    Exhausted,

    /// Allocation failed; the enclosing operation has unwound
    #[error("out of memory")]
    OutOfMemory,

    /// Caller violated a documented precondition
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A reader asked for a version older than any retained snapshot
    #[error("version {0} is no longer retained")]
    VersionConflict(i64),

    /// Division by zero in a scalar arithmetic path
    #[error("division by zero")]
    DivisionByZero,

    /// Numeric overflow in a scalar arithmetic path
    #[error("numeric overflow")]
    Overflow,
}

/// Result type for graph core operations
pub type GraphResult<T> = Result<T, GraphError>;

impl GraphError {
    /// Build an [`GraphError::InvalidArgument`] from anything displayable.
    ///
    /// Precondition violations are caller errors; debug builds escalate
    /// them to a panic at the call site via `debug_assert!`.
    pub fn invalid<M: std::fmt::Display>(msg: M) -> Self {
        GraphError::InvalidArgument(msg.to_string())
    }
}
