//! Row-wise sparse matrix iterator.
//!
//! Cursor-based scan in row-major order, scoped to a `[min_row, max_row]`
//! range. The cursor re-seeks through the row map on every step, which
//! keeps it restartable and correctly resumes from the first non-empty row
//! at or after the requested position on hypersparse matrices.

use crate::sparse::matrix::{Element, SparseMatrix};
use crate::sparse::Coord;
use std::ops::Bound::{Excluded, Included, Unbounded};

/// Iterator over the stored cells of a [`SparseMatrix`].
pub struct RowIterator<'a, T: Element> {
    matrix: &'a SparseMatrix<T>,
    min_row: Coord,
    max_row: Coord,
    /// Last yielded coordinate; `None` until the first `next`
    cursor: Option<(Coord, Coord)>,
    depleted: bool,
}

impl<'a, T: Element> RowIterator<'a, T> {
    /// Attach to a matrix over the full row range.
    pub fn attach(matrix: &'a SparseMatrix<T>) -> Self {
        RowIterator {
            matrix,
            min_row: 0,
            max_row: Coord::MAX,
            cursor: None,
            depleted: matrix.nvals() == 0,
        }
    }

    /// Attach scoped to `[min_row, max_row]`.
    pub fn attach_range(matrix: &'a SparseMatrix<T>, min_row: Coord, max_row: Coord) -> Self {
        let mut it = Self::attach(matrix);
        it.set_range(min_row, max_row);
        it
    }

    /// Rescope to `[min_row, max_row]` and restart.
    pub fn set_range(&mut self, min_row: Coord, max_row: Coord) {
        self.min_row = min_row;
        self.max_row = max_row;
        self.reset();
    }

    /// Restart from the beginning of the configured range.
    pub fn reset(&mut self) {
        self.cursor = None;
        self.depleted = self.matrix.nvals() == 0;
    }

    /// Reposition at the first stored row at or after `row`, keeping the
    /// configured upper bound.
    pub fn seek_row(&mut self, row: Coord) {
        self.min_row = row;
        self.reset();
    }

    pub fn is_depleted(&self) -> bool {
        self.depleted
    }

    /// Advance and return the next `(row, col, value)` tuple.
    pub fn next_entry(&mut self) -> Option<(Coord, Coord, T)> {
        if self.depleted {
            return None;
        }

        // continue within the cursor's row past the last yielded column
        if let Some((row, col)) = self.cursor {
            if let Some(row_map) = self.matrix.rows().get(&row) {
                if let Some((&j, &v)) = row_map.range((Excluded(col), Unbounded)).next() {
                    self.cursor = Some((row, j));
                    return Some((row, j, v));
                }
            }
            return self.advance_row(row);
        }

        // first call: find the first non-empty row in range
        let start = self.min_row;
        match self
            .matrix
            .rows()
            .range((Included(start), Included(self.max_row)))
            .find_map(|(&i, row_map)| row_map.iter().next().map(|(&j, &v)| (i, j, v)))
        {
            Some((i, j, v)) => {
                self.cursor = Some((i, j));
                Some((i, j, v))
            }
            None => {
                self.depleted = true;
                None
            }
        }
    }

    fn advance_row(&mut self, after: Coord) -> Option<(Coord, Coord, T)> {
        if after >= self.max_row {
            self.depleted = true;
            return None;
        }
        match self
            .matrix
            .rows()
            .range((Excluded(after), Included(self.max_row)))
            .find_map(|(&i, row_map)| row_map.iter().next().map(|(&j, &v)| (i, j, v)))
        {
            Some((i, j, v)) => {
                self.cursor = Some((i, j));
                Some((i, j, v))
            }
            None => {
                self.depleted = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(entries: &[(Coord, Coord, u64)]) -> SparseMatrix<u64> {
        let mut m = SparseMatrix::new(16, 16);
        for &(i, j, v) in entries {
            m.set(i, j, v).unwrap();
        }
        m
    }

    #[test]
    fn test_row_major_order() {
        let m = matrix(&[(2, 1, 21), (0, 3, 3), (2, 0, 20), (5, 5, 55)]);
        let mut it = RowIterator::attach(&m);
        let mut seen = Vec::new();
        while let Some(t) = it.next_entry() {
            seen.push(t);
        }
        assert_eq!(seen, vec![(0, 3, 3), (2, 0, 20), (2, 1, 21), (5, 5, 55)]);
        assert!(it.is_depleted());
    }

    #[test]
    fn test_range_scan_skips_empty_rows() {
        let m = matrix(&[(1, 0, 1), (9, 2, 9)]);
        let mut it = RowIterator::attach_range(&m, 2, 9);
        assert_eq!(it.next_entry(), Some((9, 2, 9)));
        assert_eq!(it.next_entry(), None);
    }

    #[test]
    fn test_seek_row_restarts() {
        let m = matrix(&[(1, 0, 1), (4, 1, 4), (8, 0, 8)]);
        let mut it = RowIterator::attach(&m);
        assert_eq!(it.next_entry(), Some((1, 0, 1)));
        it.seek_row(5);
        assert_eq!(it.next_entry(), Some((8, 0, 8)));
        assert_eq!(it.next_entry(), None);
    }
}
