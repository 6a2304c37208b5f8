//! Generic sparse matrix storage.
//!
//! Rows are kept in a `BTreeMap<row, BTreeMap<col, T>>` so that single-cell
//! insert/remove (the delta layer's hot path) stays cheap while row-major
//! iteration and range seeks stay ordered. `nvals` is tracked explicitly.

use crate::error::{GraphError, GraphResult};
use crate::sparse::Coord;
use std::collections::BTreeMap;

/// Element types storable in a sparse matrix.
pub trait Element: Copy + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// Identity used when a present entry is read as a plain pattern bit.
    fn pattern() -> Self;
}

impl Element for bool {
    fn pattern() -> Self {
        true
    }
}

impl Element for u64 {
    fn pattern() -> Self {
        1
    }
}

/// Sparse matrix over element type `T`.
#[derive(Debug, Clone, Default)]
pub struct SparseMatrix<T: Element> {
    nrows: Coord,
    ncols: Coord,
    nvals: u64,
    rows: BTreeMap<Coord, BTreeMap<Coord, T>>,
}

impl<T: Element> SparseMatrix<T> {
    pub fn new(nrows: Coord, ncols: Coord) -> Self {
        SparseMatrix {
            nrows,
            ncols,
            nvals: 0,
            rows: BTreeMap::new(),
        }
    }

    pub fn nrows(&self) -> Coord {
        self.nrows
    }

    pub fn ncols(&self) -> Coord {
        self.ncols
    }

    pub fn nvals(&self) -> u64 {
        self.nvals
    }

    pub(crate) fn rows(&self) -> &BTreeMap<Coord, BTreeMap<Coord, T>> {
        &self.rows
    }

    fn check_bounds(&self, i: Coord, j: Coord) -> GraphResult<()> {
        if i >= self.nrows || j >= self.ncols {
            debug_assert!(false, "index ({i},{j}) out of {}x{}", self.nrows, self.ncols);
            return Err(GraphError::invalid(format!(
                "index ({i},{j}) outside {}x{} matrix",
                self.nrows, self.ncols
            )));
        }
        Ok(())
    }

    /// Change matrix dimensions. Shrinking drops out-of-range entries;
    /// in practice the graph only ever grows its matrices.
    pub fn resize(&mut self, nrows: Coord, ncols: Coord) {
        if nrows < self.nrows {
            let dropped = self.rows.split_off(&nrows);
            for row in dropped.values() {
                self.nvals -= row.len() as u64;
            }
        }
        if ncols < self.ncols {
            self.rows.retain(|_, row| {
                let tail = row.split_off(&ncols);
                self.nvals -= tail.len() as u64;
                !row.is_empty()
            });
        }
        self.nrows = nrows;
        self.ncols = ncols;
    }

    pub fn get(&self, i: Coord, j: Coord) -> Option<T> {
        self.rows.get(&i).and_then(|row| row.get(&j)).copied()
    }

    pub fn contains(&self, i: Coord, j: Coord) -> bool {
        self.rows.get(&i).is_some_and(|row| row.contains_key(&j))
    }

    /// Set `A[i,j] = v`, overwriting any prior entry.
    pub fn set(&mut self, i: Coord, j: Coord, v: T) -> GraphResult<()> {
        self.check_bounds(i, j)?;
        let prior = self.rows.entry(i).or_default().insert(j, v);
        if prior.is_none() {
            self.nvals += 1;
        }
        Ok(())
    }

    /// Accumulate into `A[i,j]` with `combine(existing, v)`; plain set when
    /// the cell is empty.
    pub fn set_with<F: FnOnce(T, T) -> T>(
        &mut self,
        i: Coord,
        j: Coord,
        v: T,
        combine: F,
    ) -> GraphResult<()> {
        self.check_bounds(i, j)?;
        let row = self.rows.entry(i).or_default();
        match row.get_mut(&j) {
            Some(existing) => *existing = combine(*existing, v),
            None => {
                row.insert(j, v);
                self.nvals += 1;
            }
        }
        Ok(())
    }

    /// Remove `A[i,j]`; [`GraphError::NoValue`] if absent.
    pub fn remove(&mut self, i: Coord, j: Coord) -> GraphResult<T> {
        self.check_bounds(i, j)?;
        let row = self.rows.get_mut(&i).ok_or(GraphError::NoValue)?;
        let v = row.remove(&j).ok_or(GraphError::NoValue)?;
        if row.is_empty() {
            self.rows.remove(&i);
        }
        self.nvals -= 1;
        Ok(v)
    }

    /// Drop every entry, keeping dimensions.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.nvals = 0;
    }

    /// Build the transpose.
    pub fn transpose(&self) -> SparseMatrix<T> {
        let mut t = SparseMatrix::new(self.ncols, self.nrows);
        for (&i, row) in &self.rows {
            for (&j, &v) in row {
                t.rows.entry(j).or_default().insert(i, v);
            }
        }
        t.nvals = self.nvals;
        t
    }

    /// Extract the sub-matrix of rows `[row_lo, row_hi]` into a matrix of
    /// identical dimensions.
    pub fn extract_rows(&self, row_lo: Coord, row_hi: Coord) -> SparseMatrix<T> {
        let mut out = SparseMatrix::new(self.nrows, self.ncols);
        for (&i, row) in self.rows.range(row_lo..=row_hi) {
            out.nvals += row.len() as u64;
            out.rows.insert(i, row.clone());
        }
        out
    }

    /// Apply a unary function to every stored entry in place.
    pub fn apply<F: FnMut(Coord, Coord, &mut T)>(&mut self, mut f: F) {
        for (&i, row) in &mut self.rows {
            for (&j, v) in row.iter_mut() {
                f(i, j, v);
            }
        }
    }

    /// Fold every stored entry.
    pub fn reduce<A, F: FnMut(A, Coord, Coord, T) -> A>(&self, init: A, mut f: F) -> A {
        let mut acc = init;
        for (&i, row) in &self.rows {
            for (&j, &v) in row {
                acc = f(acc, i, j, v);
            }
        }
        acc
    }

    /// Remove from `self` every cell present in `mask`.
    ///
    /// This is the erase step of a delta flush: the deletion overlay acts
    /// as a structural complement mask over the base.
    pub fn erase_masked<M: Element>(&mut self, mask: &SparseMatrix<M>) {
        for (&i, mask_row) in mask.rows() {
            let Some(row) = self.rows.get_mut(&i) else { continue };
            for &j in mask_row.keys() {
                if row.remove(&j).is_some() {
                    self.nvals -= 1;
                }
            }
            if row.is_empty() {
                self.rows.remove(&i);
            }
        }
    }

    /// Copy every cell of `other` into `self` (structural union); on
    /// collision `combine(self_entry, other_entry)` decides the survivor.
    pub fn union_with<F: FnMut(T, T) -> T>(&mut self, other: &SparseMatrix<T>, mut combine: F) {
        for (&i, other_row) in other.rows() {
            let row = self.rows.entry(i).or_default();
            for (&j, &v) in other_row {
                match row.get_mut(&j) {
                    Some(existing) => *existing = combine(*existing, v),
                    None => {
                        row.insert(j, v);
                        self.nvals += 1;
                    }
                }
            }
        }
    }

    /// Iterate `(row, col, value)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, Coord, T)> + '_ {
        self.rows
            .iter()
            .flat_map(|(&i, row)| row.iter().map(move |(&j, &v)| (i, j, v)))
    }

    /// Iterate the stored cells of a single row.
    pub fn row_iter(&self, i: Coord) -> impl Iterator<Item = (Coord, T)> + '_ {
        self.rows
            .get(&i)
            .into_iter()
            .flat_map(|row| row.iter().map(|(&j, &v)| (j, v)))
    }

    /// Structural pattern of the matrix: every stored cell as `true`.
    pub fn to_pattern(&self) -> SparseMatrix<bool> {
        let mut out = SparseMatrix::new(self.nrows, self.ncols);
        for (i, j, _) in self.iter() {
            let _ = out.set(i, j, true);
        }
        out
    }

    /// Approximate heap usage in bytes.
    pub fn memory_usage(&self) -> usize {
        let entry = std::mem::size_of::<(Coord, T)>() + std::mem::size_of::<usize>();
        std::mem::size_of::<Self>()
            + self.rows.len() * std::mem::size_of::<(Coord, usize)>()
            + self.nvals as usize * entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove_tracks_nvals() {
        let mut m: SparseMatrix<u64> = SparseMatrix::new(4, 4);
        m.set(0, 1, 10).unwrap();
        m.set(0, 1, 11).unwrap();
        m.set(2, 3, 12).unwrap();
        assert_eq!(m.nvals(), 2);
        assert_eq!(m.get(0, 1), Some(11));

        assert_eq!(m.remove(0, 1).unwrap(), 11);
        assert_eq!(m.remove(0, 1), Err(GraphError::NoValue));
        assert_eq!(m.nvals(), 1);
    }

    #[test]
    fn test_transpose() {
        let mut m: SparseMatrix<bool> = SparseMatrix::new(3, 3);
        m.set(0, 2, true).unwrap();
        m.set(1, 0, true).unwrap();
        let t = m.transpose();
        assert!(t.contains(2, 0));
        assert!(t.contains(0, 1));
        assert_eq!(t.nvals(), 2);
    }

    #[test]
    fn test_erase_masked() {
        let mut m: SparseMatrix<u64> = SparseMatrix::new(3, 3);
        m.set(0, 0, 1).unwrap();
        m.set(0, 1, 2).unwrap();
        let mut mask: SparseMatrix<bool> = SparseMatrix::new(3, 3);
        mask.set(0, 0, true).unwrap();
        mask.set(2, 2, true).unwrap();

        m.erase_masked(&mask);
        assert_eq!(m.nvals(), 1);
        assert!(!m.contains(0, 0));
        assert!(m.contains(0, 1));
    }

    #[test]
    fn test_shrinking_resize_drops_entries() {
        let mut m: SparseMatrix<bool> = SparseMatrix::new(4, 4);
        m.set(3, 3, true).unwrap();
        m.set(1, 1, true).unwrap();
        m.resize(2, 2);
        assert_eq!(m.nvals(), 1);
        assert!(m.contains(1, 1));
    }
}
