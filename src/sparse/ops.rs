//! Semirings and binary operators as first-class values, plus the
//! whole-matrix operations built on them.
//!
//! The graph core uses a small fixed set: boolean OR-AND for structural
//! products, ANY-PAIR when only the pattern matters, and SECOND to let
//! pending additions overwrite base entries during a flush.

use crate::sparse::matrix::{Element, SparseMatrix};

/// Binary combiner `C = f(A, B)`.
#[derive(Clone, Copy)]
pub struct BinaryOp<A, B, C> {
    pub f: fn(A, B) -> C,
}

/// Semiring: `add` folds partial products, `mul` combines paired entries.
#[derive(Clone, Copy)]
pub struct Semiring<A, B, C> {
    pub add: fn(C, C) -> C,
    pub mul: fn(A, B) -> C,
}

/// Boolean OR-AND semiring
pub const BOOL_OR_AND: Semiring<bool, bool, bool> = Semiring {
    add: |a, b| a || b,
    mul: |a, b| a && b,
};

/// uint64 PLUS-TIMES semiring
pub const U64_PLUS_TIMES: Semiring<u64, u64, u64> = Semiring {
    add: u64::wrapping_add,
    mul: u64::wrapping_mul,
};

/// ANY-PAIR over bool: structural product, value is the pattern bit
pub const ANY_PAIR_BOOL: Semiring<bool, bool, bool> = Semiring {
    add: |a, _| a,
    mul: |_, _| true,
};

/// ANY-PAIR over uint64
pub const ANY_PAIR_U64: Semiring<u64, u64, u64> = Semiring {
    add: |a, _| a,
    mul: |_, _| 1,
};

/// SECOND over bool: the right-hand entry wins
pub const SECOND_BOOL: BinaryOp<bool, bool, bool> = BinaryOp { f: |_, b| b };

/// SECOND over uint64
pub const SECOND_U64: BinaryOp<u64, u64, u64> = BinaryOp { f: |_, b| b };

/// `C = A · B` over the given semiring. `C` is cleared first; its
/// dimensions must be `A.nrows x B.ncols`.
pub fn mxm<A: Element, B: Element, C: Element>(
    c: &mut SparseMatrix<C>,
    semiring: Semiring<A, B, C>,
    a: &SparseMatrix<A>,
    b: &SparseMatrix<B>,
) {
    debug_assert_eq!(a.ncols(), b.nrows());
    debug_assert_eq!(c.nrows(), a.nrows());
    debug_assert_eq!(c.ncols(), b.ncols());

    c.clear();
    for (&i, a_row) in a.rows() {
        for (&k, &av) in a_row {
            for (j, bv) in b.row_iter(k) {
                let prod = (semiring.mul)(av, bv);
                // fold into C[i,j]
                let _ = c.set_with(i, j, prod, semiring.add);
            }
        }
    }
}

/// `C = A (+) B` element-wise union with `op` deciding collisions.
pub fn ewise_add<T: Element>(
    c: &mut SparseMatrix<T>,
    op: BinaryOp<T, T, T>,
    a: &SparseMatrix<T>,
    b: &SparseMatrix<T>,
) {
    debug_assert_eq!(a.nrows(), b.nrows());
    debug_assert_eq!(a.ncols(), b.ncols());

    c.clear();
    c.resize(a.nrows(), a.ncols());
    c.union_with(a, op.f);
    c.union_with(b, op.f);
}

/// Structural difference of patterns: cells of `a` absent from `mask`.
pub fn pattern_minus<A: Element, M: Element>(
    a: &SparseMatrix<A>,
    mask: &SparseMatrix<M>,
) -> SparseMatrix<A> {
    let mut out = a.clone();
    out.erase_masked(mask);
    out
}
