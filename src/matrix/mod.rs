//! # Delta-Matrix Layer
//!
//! A mutable, versioned sparse matrix built from three underlying sparse
//! matrices: a stable base `M`, a pending-addition overlay `DP`
//! (delta-plus) and a boolean pending-deletion overlay `DM` (delta-minus).
//! The logical content is `(M masked by !DM) + DP`; overlays are merged
//! into the base lazily by [`DeltaMatrix::wait`].
//!
//! ## State invariants
//!
//! For any cell `(i,j)`, at all times:
//! 1. `DP` and `DM` are disjoint.
//! 2. never `M[i,j] && DP[i,j] && !DM[i,j]` (an addition over an existing
//!    base entry must have gone through multi-edge promotion instead)
//! 3. never `DM[i,j]` without `M[i,j]` (no deletion of an absent entry)
//!
//! Debug builds re-validate the touched cell after every mutation.
//!
//! ## Concurrency
//!
//! Mutators take `&mut self`; the graph store wraps each matrix in a
//! `parking_lot::RwLock`, which plays the role of the per-matrix mutex.
//! Readers hold the read side for the lifetime of their iterator and rely
//! on the MVCC version contract for snapshot consistency.

pub mod entry;
pub mod iter;

pub use entry::{Entry, EdgeArena};
pub use iter::DeltaIterator;

use crate::error::{GraphError, GraphResult};
use crate::ids::EdgeId;
use crate::sparse::ops::{self, BinaryOp, Semiring, ANY_PAIR_BOOL};
use crate::sparse::{Coord, Element, SparseMatrix};
use entry::{is_single_edge, tag_slot, MSB_MASK_CMP};
use tracing::trace;

/// Pending-change count at which a non-forced [`DeltaMatrix::wait`]
/// merges the overlays into the base.
pub const DEFAULT_FLUSH_THRESHOLD: u64 = 10_000;

/// Elements usable in a delta matrix.
///
/// `multi_slot` decodes the multi-edge arena reference out of a cell
/// value; only `u64` cells of a multi-edge matrix ever carry one.
pub trait DeltaElement: Element {
    fn multi_slot(self) -> Option<usize> {
        None
    }
}

impl DeltaElement for bool {}

impl DeltaElement for u64 {
    fn multi_slot(self) -> Option<usize> {
        if is_single_edge(self) {
            None
        } else {
            Some((self & MSB_MASK_CMP) as usize)
        }
    }
}

/// Semiring treating the delta matrix purely as a pattern: any present
/// cell multiplies to `true`.
pub fn pattern_semiring<T: DeltaElement>() -> Semiring<bool, T, bool> {
    Semiring {
        add: |a, _| a,
        mul: |_, _| true,
    }
}

/// Sparse matrix with pending-addition and pending-deletion overlays.
#[derive(Debug, Clone)]
pub struct DeltaMatrix<T: DeltaElement> {
    m: SparseMatrix<T>,
    delta_plus: SparseMatrix<T>,
    delta_minus: SparseMatrix<bool>,
    /// Any unflushed change exists
    dirty: bool,
    /// Cells may carry the multi-edge encoding (u64 matrices only)
    multi_edge: bool,
    flush_threshold: u64,
    /// Transpose twin, kept in sync before any mutator returns
    transposed: Option<Box<DeltaMatrix<T>>>,
    arena: EdgeArena,
}

impl<T: DeltaElement> DeltaMatrix<T> {
    pub fn new(nrows: Coord, ncols: Coord, multi_edge: bool, maintain_transpose: bool) -> Self {
        let transposed = maintain_transpose
            .then(|| Box::new(DeltaMatrix::new(ncols, nrows, multi_edge, false)));
        DeltaMatrix {
            m: SparseMatrix::new(nrows, ncols),
            delta_plus: SparseMatrix::new(nrows, ncols),
            delta_minus: SparseMatrix::new(nrows, ncols),
            dirty: false,
            multi_edge,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            transposed,
            arena: EdgeArena::new(),
        }
    }

    pub fn nrows(&self) -> Coord {
        self.m.nrows()
    }

    pub fn ncols(&self) -> Coord {
        self.m.ncols()
    }

    /// Logical entry count: base entries not marked deleted, plus pending
    /// additions.
    pub fn nvals(&self) -> u64 {
        self.m.nvals() - self.delta_minus.nvals() + self.delta_plus.nvals()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self) {
        self.dirty = true;
        if let Some(t) = self.transposed.as_mut() {
            t.dirty = true;
        }
    }

    /// Any overlay entry awaiting a flush?
    pub fn pending(&self) -> bool {
        self.delta_plus.nvals() > 0 || self.delta_minus.nvals() > 0
    }

    /// Would [`DeltaMatrix::wait`] merge the overlays into the base?
    /// Callers that must snapshot the outgoing base for concurrent
    /// readers check this before waiting.
    pub fn flush_due(&self, force_sync: bool) -> bool {
        force_sync || self.delta_plus.nvals() + self.delta_minus.nvals() >= self.flush_threshold
    }

    pub fn multi_edge(&self) -> bool {
        self.multi_edge
    }

    pub fn set_multi_edge(&mut self, multi_edge: bool) {
        self.multi_edge = multi_edge;
        if let Some(t) = self.transposed.as_mut() {
            t.multi_edge = multi_edge;
        }
    }

    pub fn set_flush_threshold(&mut self, threshold: u64) {
        self.flush_threshold = threshold;
        if let Some(t) = self.transposed.as_mut() {
            t.flush_threshold = threshold;
        }
    }

    /// Transpose twin, if maintained.
    pub fn transposed(&self) -> Option<&DeltaMatrix<T>> {
        self.transposed.as_deref()
    }

    pub(crate) fn base(&self) -> &SparseMatrix<T> {
        &self.m
    }

    pub(crate) fn delta_plus(&self) -> &SparseMatrix<T> {
        &self.delta_plus
    }

    pub(crate) fn delta_minus(&self) -> &SparseMatrix<bool> {
        &self.delta_minus
    }

    /// Multi-edge arena backing this matrix's tagged cells.
    pub fn arena(&self) -> &EdgeArena {
        &self.arena
    }

    /// Grow to `nrows x ncols`, propagating to the overlays and the twin.
    pub fn resize(&mut self, nrows: Coord, ncols: Coord) {
        self.m.resize(nrows, ncols);
        self.delta_plus.resize(nrows, ncols);
        self.delta_minus.resize(nrows, ncols);
        if let Some(t) = self.transposed.as_mut() {
            t.resize(ncols, nrows);
        }
    }

    /// Logical read: `DP` first, then `M` masked by `DM`.
    pub fn get(&self, i: Coord, j: Coord) -> Option<T> {
        if let Some(v) = self.delta_plus.get(i, j) {
            return Some(v);
        }
        if self.delta_minus.contains(i, j) {
            return None;
        }
        self.m.get(i, j)
    }

    pub fn contains(&self, i: Coord, j: Coord) -> bool {
        self.get(i, j).is_some()
    }

    fn remove_inner(&mut self, i: Coord, j: Coord) -> GraphResult<()> {
        let in_dm = self.delta_minus.contains(i, j);
        let in_m = self.m.contains(i, j) && !in_dm;
        let in_dp = self.delta_plus.contains(i, j);

        if !(in_m || in_dp) {
            return Err(GraphError::NotFound);
        }

        if in_m {
            self.delta_minus.set(i, j, true)?;
        }

        if in_dp {
            let v = self.delta_plus.remove(i, j)?;
            if self.multi_edge {
                if let Some(slot) = v.multi_slot() {
                    self.arena.release(slot);
                }
            }
        }

        self.dirty = true;
        self.validate_state(i, j);
        Ok(())
    }

    /// Remove the whole cell `(i,j)`.
    ///
    /// Fails with [`GraphError::NotFound`] when the cell is logically
    /// absent; the twin is updated first so an error leaves both sides
    /// untouched.
    pub fn remove(&mut self, i: Coord, j: Coord) -> GraphResult<()> {
        if let Some(t) = self.transposed.as_mut() {
            t.remove_inner(j, i)?;
        }
        self.remove_inner(i, j)
    }

    /// Remove every cell present in `mask`, routing each through the
    /// overlay rules: pending additions are dropped, base entries are
    /// marked in `DM`. Used by the bulk node-deletion path, which clears
    /// whole rows of the node-labels matrix in one pass.
    pub fn remove_masked(&mut self, mask: &SparseMatrix<bool>) {
        debug_assert!(self.transposed.is_none());
        for (i, j, _) in mask.iter() {
            if self.delta_plus.contains(i, j) {
                let _ = self.delta_plus.remove(i, j);
            } else if self.m.contains(i, j) && !self.delta_minus.contains(i, j) {
                let _ = self.delta_minus.set(i, j, true);
            }
        }
        self.dirty = true;
    }

    /// Merge the overlays into the base when forced or when the pending
    /// count crosses the flush threshold. The twin flushes first under
    /// the same policy. Clears the dirty flag either way.
    pub fn wait(&mut self, force_sync: bool) {
        if let Some(t) = self.transposed.as_mut() {
            t.wait(force_sync);
        }

        if self.flush_due(force_sync) {
            self.sync();
        }

        self.dirty = false;
    }

    fn sync(&mut self) {
        let deletions = self.delta_minus.nvals();
        let additions = self.delta_plus.nvals();

        if deletions > 0 {
            // multi-edge values erased from the base give their slots back
            if self.multi_edge {
                for (i, j, _) in self.delta_minus.iter() {
                    if let Some(slot) = self.m.get(i, j).and_then(DeltaElement::multi_slot) {
                        self.arena.release(slot);
                    }
                }
            }
            self.m.erase_masked(&self.delta_minus);
            self.delta_minus.clear();
        }

        if additions > 0 {
            // SECOND: delta-plus wins over any colliding base entry
            self.m.union_with(&self.delta_plus, |_, b| b);
            self.delta_plus.clear();
        }

        if deletions + additions > 0 {
            trace!(
                deletions,
                additions,
                nvals = self.m.nvals(),
                "delta matrix flushed"
            );
        }
    }

    /// Materialise the logical view without mutating the instance.
    pub fn export(&self) -> SparseMatrix<T> {
        let mut out = ops::pattern_minus(&self.m, &self.delta_minus);
        out.union_with(&self.delta_plus, |_, b| b);
        out
    }

    /// Deep copy, overlays and twin included.
    pub fn dup(&self) -> Self {
        self.clone()
    }

    /// Drop all content, keeping dimensions and configuration.
    pub fn clear(&mut self) {
        self.m.clear();
        self.delta_plus.clear();
        self.delta_minus.clear();
        self.arena = EdgeArena::new();
        self.dirty = false;
        if let Some(t) = self.transposed.as_mut() {
            t.clear();
        }
    }

    /// Approximate heap usage in bytes, twin included.
    pub fn memory_usage(&self) -> usize {
        self.m.memory_usage()
            + self.delta_plus.memory_usage()
            + self.delta_minus.memory_usage()
            + self.arena.memory_usage()
            + self.transposed.as_ref().map_or(0, |t| t.memory_usage())
    }

    /// Attach an iterator over the full row range.
    pub fn iter(&self) -> DeltaIterator<'_, T> {
        DeltaIterator::attach(self)
    }

    /// Attach an iterator scoped to `[min_row, max_row]`.
    pub fn iter_range(&self, min_row: Coord, max_row: Coord) -> DeltaIterator<'_, T> {
        DeltaIterator::attach_range(self, min_row, max_row)
    }

    /// `C = A * self`, computed as `(A * (M + DP)) masked by !(A * DM)`:
    /// the product of the base plus additions, with rows reaching deleted
    /// entries struck out.
    pub fn mxm(
        &self,
        c: &mut SparseMatrix<bool>,
        semiring: Semiring<bool, T, bool>,
        a: &SparseMatrix<bool>,
    ) {
        let mut mask = None;
        if self.delta_minus.nvals() > 0 {
            let mut mk = SparseMatrix::new(a.nrows(), self.delta_minus.ncols());
            ops::mxm(&mut mk, ANY_PAIR_BOOL, a, &self.delta_minus);
            if mk.nvals() > 0 {
                mask = Some(mk);
            }
        }

        let mut accum = None;
        if self.delta_plus.nvals() > 0 {
            let mut ac = SparseMatrix::new(a.nrows(), self.delta_plus.ncols());
            ops::mxm(&mut ac, semiring, a, &self.delta_plus);
            if ac.nvals() > 0 {
                accum = Some(ac);
            }
        }

        c.resize(a.nrows(), self.m.ncols());
        ops::mxm(c, semiring, a, &self.m);

        if let Some(mask) = mask {
            c.erase_masked(&mask);
        }
        if let Some(accum) = accum {
            c.union_with(&accum, |x, _| x);
        }
    }

    /// `C = A (+) B`. Inputs with pending overlays are materialised first.
    pub fn ewise_add(
        c: &mut SparseMatrix<T>,
        op: BinaryOp<T, T, T>,
        a: &DeltaMatrix<T>,
        b: &DeltaMatrix<T>,
    ) {
        let am = if a.pending() { a.export() } else { a.m.clone() };
        let bm = if b.pending() { b.export() } else { b.m.clone() };
        ops::ewise_add(c, op, &am, &bm);
    }

    /// Debug contract: the touched cell never ends up in one of the three
    /// impossible overlay states.
    pub fn validate_state(&self, i: Coord, j: Coord) {
        if cfg!(debug_assertions) {
            let in_m = self.m.contains(i, j);
            let in_dp = self.delta_plus.contains(i, j);
            let in_dm = self.delta_minus.contains(i, j);

            debug_assert!(
                !(in_m && in_dp && !in_dm),
                "addition duplicates a live base entry at ({i},{j})"
            );
            debug_assert!(
                !(!in_m && !in_dp && in_dm),
                "deletion of an absent entry at ({i},{j})"
            );
            debug_assert!(
                !(!in_m && in_dp && in_dm),
                "deletion of a pending entry left both overlays set at ({i},{j})"
            );
        }
    }
}

impl DeltaMatrix<bool> {
    fn set_bool_inner(&mut self, i: Coord, j: Coord) -> GraphResult<()> {
        let in_dm = self.delta_minus.contains(i, j);
        let in_m = self.m.contains(i, j);
        let in_dp = self.delta_plus.contains(i, j);

        debug_assert!(!(in_dp && in_dm));

        // idempotent when logically present
        if in_dp || (in_m && !in_dm) {
            return Ok(());
        }

        if in_dm {
            // marked for deletion: clear the mark, the base entry survives
            self.delta_minus.remove(i, j)?;
        } else {
            self.delta_plus.set(i, j, true)?;
        }

        self.dirty = true;
        self.validate_state(i, j);
        Ok(())
    }

    /// `C(i,j) = true`; idempotent.
    pub fn set(&mut self, i: Coord, j: Coord) -> GraphResult<()> {
        debug_assert!(!self.multi_edge, "boolean matrices cannot be multi-edge");
        if let Some(t) = self.transposed.as_mut() {
            t.set_bool_inner(j, i)?;
        }
        self.set_bool_inner(i, j)
    }
}

/// Accumulate `x` into a single cell of `target`, promoting a scalar to a
/// multi-edge arena slot or appending to an existing one.
fn accumulate_edge(
    target: &mut SparseMatrix<u64>,
    arena: &mut EdgeArena,
    i: Coord,
    j: Coord,
    x: u64,
) -> GraphResult<()> {
    match target.get(i, j) {
        None => target.set(i, j, x),
        Some(existing) => match Entry::decode(existing) {
            Entry::Single(id) => {
                let slot = arena.alloc(vec![id, x]);
                target.set(i, j, tag_slot(slot))
            }
            Entry::Multi(slot) => {
                arena.push(slot, x);
                Ok(())
            }
        },
    }
}

impl DeltaMatrix<u64> {
    fn set_u64_inner(&mut self, i: Coord, j: Coord, x: u64) -> GraphResult<()> {
        if self.delta_minus.contains(i, j) {
            // the base held a single edge the caller already removed;
            // clear the mark and overwrite in place
            self.delta_minus.remove(i, j)?;
            if let Some(slot) = self.m.get(i, j).and_then(DeltaElement::multi_slot) {
                self.arena.release(slot);
            }
            self.m.set(i, j, x)?;
        } else if self.m.contains(i, j) {
            if self.multi_edge {
                accumulate_edge(&mut self.m, &mut self.arena, i, j, x)?;
            } else {
                self.m.set(i, j, x)?;
            }
        } else if self.multi_edge {
            accumulate_edge(&mut self.delta_plus, &mut self.arena, i, j, x)?;
        } else {
            self.delta_plus.set(i, j, x)?;
        }

        self.dirty = true;
        self.validate_state(i, j);
        Ok(())
    }

    /// `C(i,j) = x` with multi-edge accumulation.
    pub fn set(&mut self, i: Coord, j: Coord, x: u64) -> GraphResult<()> {
        if let Some(t) = self.transposed.as_mut() {
            t.set_u64_inner(j, i, x)?;
        }
        self.set_u64_inner(i, j, x)
    }

    fn remove_entry_inner(&mut self, i: Coord, j: Coord, v: EdgeId) -> GraphResult<()> {
        debug_assert!(self.multi_edge);

        let in_dm = self.delta_minus.contains(i, j);
        let in_m = self.m.contains(i, j) && !in_dm;
        let in_dp = self.delta_plus.contains(i, j);

        if !(in_m || in_dp) {
            return Err(GraphError::NotFound);
        }

        // a live cell exists in exactly one of base and delta-plus
        debug_assert!(in_m != in_dp);

        if in_m {
            match Entry::decode(self.m.get(i, j).ok_or(GraphError::NoValue)?) {
                Entry::Single(id) => {
                    if id != v {
                        return Err(GraphError::NotFound);
                    }
                    self.delta_minus.set(i, j, true)?;
                    self.dirty = true;
                }
                Entry::Multi(slot) => {
                    if let Some(survivor) = self.arena.remove_id(slot, v)? {
                        self.m.set(i, j, survivor)?;
                    }
                }
            }
        }

        if in_dp {
            match Entry::decode(self.delta_plus.get(i, j).ok_or(GraphError::NoValue)?) {
                Entry::Single(id) => {
                    if id != v {
                        return Err(GraphError::NotFound);
                    }
                    self.delta_plus.remove(i, j)?;
                    self.dirty = true;
                }
                Entry::Multi(slot) => {
                    if let Some(survivor) = self.arena.remove_id(slot, v)? {
                        self.delta_plus.set(i, j, survivor)?;
                    }
                }
            }
        }

        self.validate_state(i, j);
        Ok(())
    }

    /// Remove the single edge id `v` from the cell `(i,j)`, collapsing a
    /// two-element multi-edge cell back to the scalar form. A cell never
    /// ends up holding an empty list.
    pub fn remove_entry(&mut self, i: Coord, j: Coord, v: EdgeId) -> GraphResult<()> {
        if let Some(t) = self.transposed.as_mut() {
            t.remove_entry_inner(j, i, v)?;
        }
        self.remove_entry_inner(i, j, v)
    }

    /// Decode every edge id held by a cell value.
    pub fn edge_ids(&self, cell: u64) -> Vec<EdgeId> {
        match Entry::decode(cell) {
            Entry::Single(id) => vec![id],
            Entry::Multi(slot) => self.arena.ids(slot).to_vec(),
        }
    }

    /// True when the cell value holds the given edge id.
    pub fn cell_contains_edge(&self, cell: u64, id: EdgeId) -> bool {
        match Entry::decode(cell) {
            Entry::Single(e) => e == id,
            Entry::Multi(slot) => self.arena.ids(slot).contains(&id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_set_remove_set_round_trip() {
        let mut d: DeltaMatrix<bool> = DeltaMatrix::new(4, 4, false, false);
        d.set(1, 2).unwrap();
        assert!(d.contains(1, 2));
        assert_eq!(d.nvals(), 1);

        d.wait(true);
        assert!(!d.pending());
        assert!(d.contains(1, 2));

        // deletion of a flushed entry lands in delta-minus
        d.remove(1, 2).unwrap();
        assert!(!d.contains(1, 2));
        assert_eq!(d.delta_minus.nvals(), 1);

        // re-adding clears the mark and restores the base entry
        d.set(1, 2).unwrap();
        assert!(d.contains(1, 2));
        assert_eq!(d.delta_minus.nvals(), 0);
        assert_eq!(d.delta_plus.nvals(), 0);
    }

    #[test]
    fn test_remove_absent_is_not_found() {
        let mut d: DeltaMatrix<bool> = DeltaMatrix::new(2, 2, false, false);
        assert_eq!(d.remove(0, 0), Err(GraphError::NotFound));
    }

    #[test]
    fn test_transpose_twin_mirrors() {
        let mut d: DeltaMatrix<bool> = DeltaMatrix::new(3, 3, false, true);
        d.set(0, 2).unwrap();
        assert!(d.transposed().is_some_and(|t| t.contains(2, 0)));

        d.wait(true);
        d.remove(0, 2).unwrap();
        assert!(d.transposed().is_some_and(|t| !t.contains(2, 0)));
    }

    #[test]
    fn test_multi_edge_promotion_and_collapse() {
        let mut d: DeltaMatrix<u64> = DeltaMatrix::new(2, 2, true, true);
        d.set(0, 1, 10).unwrap();
        d.set(0, 1, 11).unwrap();

        let cell = d.get(0, 1).unwrap();
        assert_eq!(d.edge_ids(cell), vec![10, 11]);

        d.remove_entry(0, 1, 10).unwrap();
        assert_eq!(d.get(0, 1), Some(11));

        d.remove_entry(0, 1, 11).unwrap();
        assert!(!d.contains(0, 1));
    }

    #[test]
    fn test_flush_merges_and_clears_overlays() {
        let mut d: DeltaMatrix<u64> = DeltaMatrix::new(4, 4, true, false);
        d.set(0, 1, 1).unwrap();
        d.set(2, 3, 2).unwrap();
        d.wait(true);
        d.remove(0, 1).unwrap();
        d.set(3, 3, 3).unwrap();

        let before = d.nvals();
        d.wait(true);
        assert_eq!(d.nvals(), before);
        assert!(!d.pending());
        assert!(!d.is_dirty());
        assert!(!d.contains(0, 1));
        assert_eq!(d.get(3, 3), Some(3));
    }

    #[test]
    fn test_mxm_sees_logical_view() {
        // adjacency 0->1 flushed, 1->2 pending, 0->1 also deleted after
        let mut b: DeltaMatrix<bool> = DeltaMatrix::new(3, 3, false, false);
        b.set(0, 1).unwrap();
        b.wait(true);
        b.set(1, 2).unwrap();

        let mut frontier = SparseMatrix::new(1, 3);
        frontier.set(0, 0, true).unwrap();
        frontier.set(0, 1, true).unwrap();

        let mut c = SparseMatrix::new(1, 3);
        b.mxm(&mut c, pattern_semiring(), &frontier);
        assert!(c.contains(0, 1));
        assert!(c.contains(0, 2));

        b.remove(0, 1).unwrap();
        b.mxm(&mut c, pattern_semiring(), &frontier);
        assert!(!c.contains(0, 1));
        assert!(c.contains(0, 2));
    }

    #[test]
    fn test_export_matches_gets() {
        let mut d: DeltaMatrix<u64> = DeltaMatrix::new(3, 3, false, false);
        d.set(0, 0, 5).unwrap();
        d.wait(true);
        d.remove(0, 0).unwrap();
        d.set(1, 1, 6).unwrap();

        let flat = d.export();
        assert!(!flat.contains(0, 0));
        assert_eq!(flat.get(1, 1), Some(6));
        // export leaves the overlays untouched
        assert!(d.pending());
    }
}
