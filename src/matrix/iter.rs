//! Delta-matrix iteration.
//!
//! One logical iterator behaves as two chained row scans: first the base
//! `M` with entries masked by `DM` skipped, then the pending additions in
//! `DP`. Each logical cell is yielded at most once; order is row-major
//! within each stream, `M` first.
//!
//! The iterator borrows the matrix, so the borrow checker enforces the
//! snapshot contract: the matrix cannot be mutated while an iterator is
//! attached. Cross-version consistency is the MVCC broker's job.

use crate::matrix::{DeltaElement, DeltaMatrix};
use crate::sparse::{Coord, RowIterator};

/// Two-stream iterator over the logical content of a [`DeltaMatrix`].
pub struct DeltaIterator<'a, T: DeltaElement> {
    matrix: &'a DeltaMatrix<T>,
    m_it: RowIterator<'a, T>,
    dp_it: RowIterator<'a, T>,
}

impl<'a, T: DeltaElement> DeltaIterator<'a, T> {
    /// Attach over the full row range.
    pub fn attach(matrix: &'a DeltaMatrix<T>) -> Self {
        Self::attach_range(matrix, 0, Coord::MAX)
    }

    /// Attach scoped to rows `[min_row, max_row]`.
    pub fn attach_range(matrix: &'a DeltaMatrix<T>, min_row: Coord, max_row: Coord) -> Self {
        DeltaIterator {
            matrix,
            m_it: RowIterator::attach_range(matrix.base(), min_row, max_row),
            dp_it: RowIterator::attach_range(matrix.delta_plus(), min_row, max_row),
        }
    }

    /// Rescope to a single row and restart.
    pub fn iterate_row(&mut self, row: Coord) {
        self.iterate_range(row, row);
    }

    /// Rescope to `[min_row, max_row]` and restart.
    pub fn iterate_range(&mut self, min_row: Coord, max_row: Coord) {
        self.m_it.set_range(min_row, max_row);
        self.dp_it.set_range(min_row, max_row);
    }

    /// Skip both streams forward to the first stored row at or after
    /// `row`, keeping the current upper bound.
    pub fn jump_to_row(&mut self, row: Coord) {
        self.m_it.seek_row(row);
        self.dp_it.seek_row(row);
    }

    /// Restart from the beginning of the configured range.
    pub fn reset(&mut self) {
        self.m_it.reset();
        self.dp_it.reset();
    }

    pub fn is_depleted(&self) -> bool {
        self.m_it.is_depleted() && self.dp_it.is_depleted()
    }

    /// Next logical `(row, col, value)`; `None` once both streams are
    /// exhausted.
    pub fn next_entry(&mut self) -> Option<(Coord, Coord, T)> {
        // walk M, skipping entries marked in delta-minus
        while let Some((i, j, v)) = self.m_it.next_entry() {
            if !self.matrix.delta_minus().contains(i, j) {
                return Some((i, j, v));
            }
        }
        self.dp_it.next_entry()
    }
}

impl<T: DeltaElement> Iterator for DeltaIterator<'_, T> {
    type Item = (Coord, Coord, T);

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry()
    }
}
