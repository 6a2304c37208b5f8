//! # Graph Store
//!
//! Owns the node and edge records plus every matrix describing the graph:
//! per-label diagonal matrices, per-relation multi-edge matrices (with
//! maintained transposes), the global adjacency matrix (with transpose),
//! and the node-labels matrix. Enforces id allocation, matrix sizing, and
//! statistics.
//!
//! ## Locking and versioning
//!
//! Structural access goes through [`SharedGraph`], a writer-preferring
//! read/write lock around the store. Its guards carry the MVCC contract:
//! acquiring a read guard pins the latest published version for the
//! calling thread, acquiring a write guard opens the next version, and
//! dropping the write guard publishes it. When a flush is about to merge
//! overlays into a matrix base, the outgoing state is registered with the
//! active version so a query observing that version keeps a consistent
//! snapshot until its last reference drops.
//!
//! Individual matrices carry their own `RwLock` so matrix accessors can
//! run the installed [`SyncPolicy`] (resize / flush) even on the read
//! path. Borrowed matrix guards are valid only while the holder keeps
//! its graph lock.

pub mod delete;
pub mod entities;
pub mod entity_store;
pub mod schema;
pub mod statistics;
pub mod sync_policy;

pub use entities::{Direction, Edge, EdgeRecord, NodeRecord};
pub use entity_store::EntityStore;
pub use schema::{GraphSchema, SchemaLayout, Store};
pub use statistics::GraphStatistics;
pub use sync_policy::SyncPolicy;

use crate::error::{GraphError, GraphResult};
use crate::ids::{EdgeId, LabelId, NodeId, RelationId, NO_RELATION, UNKNOWN_RELATION};
use crate::matrix::entry::is_single_edge;
use crate::matrix::{DeltaElement, DeltaMatrix, DEFAULT_FLUSH_THRESHOLD};
use crate::mvcc::{Version, VersionBroker};
use arc_swap::ArcSwap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Default slot pre-allocation for new graphs.
pub const DEFAULT_NODE_CAP: usize = 16_384;
pub const DEFAULT_EDGE_CAP: usize = 16_384;

/// A property graph stored as sparse matrices.
pub struct Graph {
    name: String,
    nodes: EntityStore<NodeRecord>,
    edges: EntityStore<EdgeRecord>,
    labels: Vec<RwLock<DeltaMatrix<bool>>>,
    relations: Vec<RwLock<DeltaMatrix<u64>>>,
    adjacency: RwLock<DeltaMatrix<bool>>,
    node_labels: RwLock<DeltaMatrix<bool>>,
    /// Shared all-absent matrix returned for unresolved labels
    zero_matrix: RwLock<DeltaMatrix<bool>>,
    stats: GraphStatistics,
    schema: GraphSchema,
    policy: ArcSwap<SyncPolicy>,
    flush_threshold: u64,
    /// Version broker backing snapshot reads over this graph
    broker: Arc<VersionBroker>,
}

impl Graph {
    pub fn new(name: &str) -> Self {
        Self::with_capacity(name, DEFAULT_NODE_CAP, DEFAULT_EDGE_CAP)
    }

    pub fn with_capacity(name: &str, node_cap: usize, edge_cap: usize) -> Self {
        let nodes = EntityStore::new(node_cap);
        let edges = EntityStore::new(edge_cap);
        let n = nodes.item_cap() as u64;

        Graph {
            name: name.to_string(),
            nodes,
            edges,
            labels: Vec::new(),
            relations: Vec::new(),
            adjacency: RwLock::new(DeltaMatrix::new(n, n, false, true)),
            node_labels: RwLock::new(DeltaMatrix::new(n, n, false, false)),
            zero_matrix: RwLock::new(DeltaMatrix::new(n, n, false, false)),
            stats: GraphStatistics::new(),
            schema: GraphSchema::new(),
            policy: ArcSwap::from_pointee(SyncPolicy::FlushResize),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            broker: Arc::new(VersionBroker::new()),
        }
    }

    /// Build a graph sized and tuned per the loaded configuration.
    pub fn from_config(name: &str, config: &crate::config::Config) -> Self {
        let mut g = Self::with_capacity(
            name,
            config.matrix.node_capacity,
            config.matrix.edge_capacity,
        );
        g.set_flush_threshold(config.matrix.flush_threshold);
        g
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    //--------------------------------------------------------------------------
    // counters
    //--------------------------------------------------------------------------

    pub fn node_count(&self) -> usize {
        self.nodes.item_count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.item_count()
    }

    pub fn deleted_node_count(&self) -> usize {
        self.nodes.deleted_count()
    }

    pub fn deleted_edge_count(&self) -> usize {
        self.edges.deleted_count()
    }

    /// Live plus recycled node slots.
    pub fn uncompacted_node_count(&self) -> usize {
        self.nodes.item_count() + self.nodes.deleted_count()
    }

    pub fn labeled_node_count(&self, label: LabelId) -> u64 {
        usize::try_from(label).map_or(0, |l| self.stats.node_count(l))
    }

    pub fn relation_edge_count(&self, relation: RelationId) -> u64 {
        usize::try_from(relation).map_or(0, |r| self.stats.edge_count(r))
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// All matrices are logically square with this dimension.
    pub fn required_matrix_dim(&self) -> u64 {
        self.nodes.item_cap() as u64
    }

    /// The broker managing this graph's read/write versions.
    pub fn version_broker(&self) -> &Arc<VersionBroker> {
        &self.broker
    }

    pub fn schema(&self) -> &GraphSchema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut GraphSchema {
        &mut self.schema
    }

    /// Serializable schema metadata for the host layer.
    pub fn schema_layout(&self) -> SchemaLayout {
        self.schema.layout(&self.name)
    }

    pub fn allocate_nodes(&mut self, n: usize) {
        self.nodes.accommodate(n);
    }

    pub fn allocate_edges(&mut self, n: usize) {
        self.edges.accommodate(n);
    }

    /// Wire the configured flush threshold into every matrix.
    pub fn set_flush_threshold(&mut self, threshold: u64) {
        self.flush_threshold = threshold;
        self.adjacency.write().set_flush_threshold(threshold);
        self.node_labels.write().set_flush_threshold(threshold);
        for l in &self.labels {
            l.write().set_flush_threshold(threshold);
        }
        for r in &self.relations {
            r.write().set_flush_threshold(threshold);
        }
    }

    //--------------------------------------------------------------------------
    // sync policy
    //--------------------------------------------------------------------------

    /// Install the matrix access policy; lock-free, so callable from any
    /// context.
    pub fn set_matrix_policy(&self, policy: SyncPolicy) {
        self.policy.store(Arc::new(policy));
    }

    pub fn matrix_policy(&self) -> SyncPolicy {
        **self.policy.load()
    }

    /// Snapshot a matrix about to have its overlays merged into the base
    /// and park the snapshot with the active version, so a concurrent
    /// query pinned to that version still observes a consistent state.
    fn register_superseded<T: DeltaElement>(
        &self,
        m: &DeltaMatrix<T>,
        force: bool,
        version: Option<Version>,
    ) {
        if !m.pending() || !m.flush_due(force) {
            return;
        }
        if let Some(v) = version {
            let _ = self.broker.register_object_at(v, Box::new(m.dup()));
        }
    }

    fn sync_matrix<T: DeltaElement>(&self, lock: &RwLock<DeltaMatrix<T>>) {
        let dim = self.required_matrix_dim();
        match self.matrix_policy() {
            SyncPolicy::FlushResize => {
                let stale = {
                    let m = lock.read();
                    m.nrows() != dim || m.ncols() != dim || m.is_dirty()
                };
                if stale {
                    let mut m = lock.write();
                    if m.nrows() != dim || m.ncols() != dim {
                        m.resize(dim, dim);
                    }
                    if m.is_dirty() {
                        self.register_superseded(&m, false, VersionBroker::current_version());
                        m.wait(false);
                    }
                }
            }
            SyncPolicy::ResizeOnly => {
                let stale = {
                    let m = lock.read();
                    m.nrows() != dim || m.ncols() != dim
                };
                if stale {
                    let mut m = lock.write();
                    if m.nrows() != dim || m.ncols() != dim {
                        m.resize(dim, dim);
                    }
                }
            }
            SyncPolicy::Nop => {}
        }
    }

    //--------------------------------------------------------------------------
    // matrix accessors
    //--------------------------------------------------------------------------

    /// Label matrix `L`; the zero matrix for an unresolved label id.
    pub fn label_matrix(&self, label: LabelId) -> RwLockReadGuard<'_, DeltaMatrix<bool>> {
        match usize::try_from(label).ok().filter(|&l| l < self.labels.len()) {
            Some(l) => {
                let lock = &self.labels[l];
                self.sync_matrix(lock);
                lock.read()
            }
            None => self.zero_matrix(),
        }
    }

    /// Relation matrix `R_r`.
    pub fn relation_matrix(
        &self,
        relation: RelationId,
    ) -> GraphResult<RwLockReadGuard<'_, DeltaMatrix<u64>>> {
        let idx = usize::try_from(relation)
            .ok()
            .filter(|&r| r < self.relations.len())
            .ok_or_else(|| GraphError::invalid(format!("unknown relation id {relation}")))?;
        let lock = &self.relations[idx];
        self.sync_matrix(lock);
        Ok(lock.read())
    }

    pub fn adjacency_matrix(&self) -> RwLockReadGuard<'_, DeltaMatrix<bool>> {
        self.sync_matrix(&self.adjacency);
        self.adjacency.read()
    }

    pub fn node_label_matrix(&self) -> RwLockReadGuard<'_, DeltaMatrix<bool>> {
        self.sync_matrix(&self.node_labels);
        self.node_labels.read()
    }

    /// The shared read-only all-absent matrix.
    pub fn zero_matrix(&self) -> RwLockReadGuard<'_, DeltaMatrix<bool>> {
        self.zero_matrix.read()
    }

    /// Flush or resize every matrix according to `force_flush`; matrices
    /// are drained in parallel. Superseded bases are registered under the
    /// caller's active version, captured here because the fan-out threads
    /// do not carry it in their thread-local slots.
    pub fn apply_pending(&self, force_flush: bool) {
        let version = VersionBroker::current_version();
        rayon::scope(|s| {
            s.spawn(move |_| {
                let mut m = self.adjacency.write();
                self.register_superseded(&m, force_flush, version);
                m.wait(force_flush);
            });
            s.spawn(move |_| {
                let mut m = self.node_labels.write();
                self.register_superseded(&m, force_flush, version);
                m.wait(force_flush);
            });
            for l in &self.labels {
                s.spawn(move |_| {
                    let mut m = l.write();
                    self.register_superseded(&m, force_flush, version);
                    m.wait(force_flush);
                });
            }
            for r in &self.relations {
                s.spawn(move |_| {
                    let mut m = r.write();
                    self.register_superseded(&m, force_flush, version);
                    m.wait(force_flush);
                });
            }
        });
    }

    /// Any matrix holding unflushed deltas?
    pub fn pending(&self) -> bool {
        if self.adjacency.read().pending() || self.node_labels.read().pending() {
            return true;
        }
        self.labels.iter().any(|l| l.read().pending())
            || self.relations.iter().any(|r| r.read().pending())
    }

    //--------------------------------------------------------------------------
    // schema registration
    //--------------------------------------------------------------------------

    /// Register a label, appending its diagonal matrix; idempotent by
    /// name.
    pub fn add_label(&mut self, name: &str) -> LabelId {
        let id = self.schema.add_label(name);
        if id as usize == self.labels.len() {
            let n = self.required_matrix_dim();
            let mut m = DeltaMatrix::new(n, n, false, false);
            m.set_flush_threshold(self.flush_threshold);
            self.labels.push(RwLock::new(m));
            self.stats.introduce_label();
        }
        id
    }

    /// Register a relation, appending its multi-edge matrix and transpose
    /// twin; idempotent by name.
    pub fn add_relation(&mut self, name: &str) -> RelationId {
        let id = self.schema.add_relation(name);
        if id as usize == self.relations.len() {
            let n = self.required_matrix_dim();
            let mut m = DeltaMatrix::new(n, n, true, true);
            m.set_flush_threshold(self.flush_threshold);
            self.relations.push(RwLock::new(m));
            self.stats.introduce_relation();
        }
        id
    }

    //--------------------------------------------------------------------------
    // entity CRUD
    //--------------------------------------------------------------------------

    /// Resize every matrix when the node capacity has outgrown them.
    fn grow_matrices_to_capacity(&mut self) {
        let dim = self.required_matrix_dim();
        if self.adjacency.read().nrows() >= dim {
            return;
        }
        debug!(dim, "growing graph matrices");
        self.adjacency.write().resize(dim, dim);
        self.node_labels.write().resize(dim, dim);
        self.zero_matrix.write().resize(dim, dim);
        for l in &self.labels {
            l.write().resize(dim, dim);
        }
        for r in &self.relations {
            r.write().resize(dim, dim);
        }
    }

    /// Allocate a node, mark its labels in the label and node-labels
    /// matrices, and bump per-label statistics.
    pub fn create_node(&mut self, labels: &[LabelId]) -> GraphResult<NodeId> {
        for &l in labels {
            if usize::try_from(l).ok().filter(|&i| i < self.labels.len()).is_none() {
                debug_assert!(false, "unregistered label {l}");
                return Err(GraphError::invalid(format!("unknown label id {l}")));
            }
        }

        let id = self.nodes.allocate(NodeRecord {
            attributes: Default::default(),
            labels: labels.to_vec(),
        });
        self.grow_matrices_to_capacity();

        for &l in labels {
            let idx = l as usize;
            self.labels[idx].write().set(id, id)?;
            self.node_labels.write().set(id, l as u64)?;
            self.stats.inc_node_count(idx, 1);
        }
        Ok(id)
    }

    /// Connect `src -> dest` under `relation`. Both endpoints must exist
    /// and the relation must be registered.
    pub fn create_edge(
        &mut self,
        src: NodeId,
        dest: NodeId,
        relation: RelationId,
    ) -> GraphResult<EdgeId> {
        let ridx = usize::try_from(relation)
            .ok()
            .filter(|&r| r < self.relations.len())
            .ok_or_else(|| {
                debug_assert!(false, "unregistered relation {relation}");
                GraphError::invalid(format!("unknown relation id {relation}"))
            })?;
        if !self.nodes.contains(src) || !self.nodes.contains(dest) {
            debug_assert!(false, "edge endpoint missing");
            return Err(GraphError::invalid("edge endpoint does not exist"));
        }

        let id = self.edges.allocate(EdgeRecord {
            attributes: Default::default(),
            src,
            dest,
            relation,
        });
        self.grow_matrices_to_capacity();

        self.adjacency.write().set(src, dest)?;
        self.relations[ridx].write().set(src, dest, id)?;
        self.stats.inc_edge_count(ridx, 1);
        Ok(id)
    }

    pub fn get_node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(id)
    }

    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut NodeRecord> {
        self.nodes.get_mut(id)
    }

    /// Materialise an edge from its record.
    pub fn get_edge(&self, id: EdgeId) -> Option<Edge> {
        self.edges.get(id).map(|rec| Edge {
            id,
            src: rec.src,
            dest: rec.dest,
            relation: rec.relation,
        })
    }

    pub fn get_edge_record(&self, id: EdgeId) -> Option<&EdgeRecord> {
        self.edges.get(id)
    }

    pub fn get_edge_record_mut(&mut self, id: EdgeId) -> Option<&mut EdgeRecord> {
        self.edges.get_mut(id)
    }

    /// The relation an edge belongs to.
    pub fn edge_relation(&self, id: EdgeId) -> GraphResult<RelationId> {
        self.edges
            .get(id)
            .map(|rec| rec.relation)
            .ok_or(GraphError::NotFound)
    }

    /// Remove an edge from its relation matrix and, when it was the last
    /// connection between its endpoints, from the adjacency matrix.
    pub fn delete_edge(&mut self, id: EdgeId) -> GraphResult<()> {
        let (src, dest, relation) = {
            let rec = self.edges.get(id).ok_or(GraphError::NotFound)?;
            (rec.src, rec.dest, rec.relation)
        };
        let ridx = relation as usize;

        let cell = self.relations[ridx]
            .read()
            .get(src, dest)
            .ok_or(GraphError::NotFound)?;

        self.stats.dec_edge_count(ridx, 1);
        self.relations[ridx].write().remove_entry(src, dest, id)?;

        if is_single_edge(cell) {
            // the pair lost its only edge under this relation; clear the
            // adjacency bit unless another relation still connects them
            let connected = self
                .relations
                .iter()
                .enumerate()
                .any(|(i, m)| i != ridx && m.read().contains(src, dest));
            if !connected {
                self.adjacency.write().remove(src, dest)?;
            }
        }

        self.edges.delete(id);
        Ok(())
    }

    /// Delete a node the caller has already detached (no incident edges).
    pub fn delete_node(&mut self, id: NodeId) -> GraphResult<()> {
        if !self.nodes.contains(id) {
            return Err(GraphError::NotFound);
        }
        debug_assert!(
            self.node_edges(id, Direction::Both, NO_RELATION)
                .is_ok_and(|es| es.is_empty()),
            "deleting a node with incident edges"
        );

        for l in self.labels_of(id) {
            let idx = l as usize;
            self.labels[idx].write().remove(id, id)?;
            self.node_labels.write().remove(id, l as u64)?;
            self.stats.dec_node_count(idx, 1);
        }

        self.nodes.delete(id);
        Ok(())
    }

    //--------------------------------------------------------------------------
    // lookups
    //--------------------------------------------------------------------------

    /// Labels attached to a node, read from the node-labels matrix row.
    pub fn labels_of(&self, node: NodeId) -> Vec<LabelId> {
        let nl = self.node_label_matrix();
        let mut it = nl.iter_range(node, node);
        let mut out = Vec::new();
        while let Some((_, l, _)) = it.next_entry() {
            out.push(l as LabelId);
        }
        out
    }

    fn collect_connecting(&self, src: NodeId, dest: NodeId, ridx: usize, out: &mut Vec<Edge>) {
        let m = self.relations[ridx].read();
        if let Some(cell) = m.get(src, dest) {
            for id in m.edge_ids(cell) {
                out.push(Edge {
                    id,
                    src,
                    dest,
                    relation: ridx as RelationId,
                });
            }
        }
    }

    /// Every edge `src -> dest`, under one relation or all of them.
    pub fn edges_connecting(
        &self,
        src: NodeId,
        dest: NodeId,
        relation: RelationId,
    ) -> GraphResult<Vec<Edge>> {
        let mut out = Vec::new();
        // unresolved relation names match nothing
        if relation == UNKNOWN_RELATION {
            return Ok(out);
        }

        if relation == NO_RELATION {
            for ridx in 0..self.relations.len() {
                self.collect_connecting(src, dest, ridx, &mut out);
            }
        } else {
            usize::try_from(relation)
                .ok()
                .filter(|&r| r < self.relations.len())
                .ok_or_else(|| GraphError::invalid(format!("unknown relation id {relation}")))?;
            self.collect_connecting(src, dest, relation as usize, &mut out);
        }
        Ok(out)
    }

    /// Incoming and/or outgoing edges of a node.
    pub fn node_edges(
        &self,
        node: NodeId,
        dir: Direction,
        relation: RelationId,
    ) -> GraphResult<Vec<Edge>> {
        let mut out = Vec::new();
        if relation == UNKNOWN_RELATION {
            return Ok(out);
        }

        let outgoing = matches!(dir, Direction::Outgoing | Direction::Both);
        let incoming = matches!(dir, Direction::Incoming | Direction::Both);

        if relation == NO_RELATION {
            if outgoing {
                let adj = self.adjacency_matrix();
                let mut it = adj.iter_range(node, node);
                while let Some((_, dest, _)) = it.next_entry() {
                    out.extend(self.edges_connecting(node, dest, NO_RELATION)?);
                }
            }
            if incoming {
                let adj = self.adjacency_matrix();
                let t = adj
                    .transposed()
                    .ok_or_else(|| GraphError::invalid("adjacency has no transpose"))?;
                let mut it = t.iter_range(node, node);
                while let Some((_, src, _)) = it.next_entry() {
                    out.extend(self.edges_connecting(src, node, NO_RELATION)?);
                }
            }
            return Ok(out);
        }

        let m = self.relation_matrix(relation)?;
        if outgoing {
            let mut it = m.iter_range(node, node);
            while let Some((_, dest, cell)) = it.next_entry() {
                for id in m.edge_ids(cell) {
                    out.push(Edge {
                        id,
                        src: node,
                        dest,
                        relation,
                    });
                }
            }
        }
        if incoming {
            let t = m
                .transposed()
                .ok_or_else(|| GraphError::invalid("relation matrix has no transpose"))?;
            let mut it = t.iter_range(node, node);
            while let Some((_, src, cell)) = it.next_entry() {
                for id in t.edge_ids(cell) {
                    out.push(Edge {
                        id,
                        src,
                        dest: node,
                        relation,
                    });
                }
            }
        }
        Ok(out)
    }

    /// Scan live node ids in id order.
    pub fn scan_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|(id, _)| id)
    }

    /// Scan live edges in id order.
    pub fn scan_edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edges.iter().map(|(id, rec)| Edge {
            id,
            src: rec.src,
            dest: rec.dest,
            relation: rec.relation,
        })
    }

    /// Reconstruct every matrix from entity iteration alone; used after
    /// the host decoder has repopulated the entity stores.
    pub fn rebuild_matrices(&mut self) -> GraphResult<()> {
        let dim = self.required_matrix_dim();
        self.adjacency.write().clear();
        self.node_labels.write().clear();
        for l in &self.labels {
            l.write().clear();
        }
        for r in &self.relations {
            r.write().clear();
        }
        self.grow_matrices_to_capacity();
        self.stats = GraphStatistics::new();
        for _ in 0..self.labels.len() {
            self.stats.introduce_label();
        }
        for _ in 0..self.relations.len() {
            self.stats.introduce_relation();
        }

        let node_labels: Vec<(NodeId, Vec<LabelId>)> = self
            .nodes
            .iter()
            .map(|(id, rec)| (id, rec.labels.clone()))
            .collect();
        for (id, labels) in node_labels {
            for l in labels {
                let idx = usize::try_from(l)
                    .ok()
                    .filter(|&i| i < self.labels.len())
                    .ok_or_else(|| GraphError::invalid(format!("unknown label id {l}")))?;
                self.labels[idx].write().set(id, id)?;
                self.node_labels.write().set(id, l as u64)?;
                self.stats.inc_node_count(idx, 1);
            }
        }

        let edges: Vec<Edge> = self.scan_edges().collect();
        for e in edges {
            let ridx = usize::try_from(e.relation)
                .ok()
                .filter(|&i| i < self.relations.len())
                .ok_or_else(|| GraphError::invalid(format!("unknown relation id {}", e.relation)))?;
            self.adjacency.write().set(e.src, e.dest)?;
            self.relations[ridx].write().set(e.src, e.dest, e.id)?;
            self.stats.inc_edge_count(ridx, 1);
        }

        self.apply_pending(true);
        debug!(dim, "graph matrices rebuilt from entities");
        Ok(())
    }
}

//------------------------------------------------------------------------------
// shared graph lock
//------------------------------------------------------------------------------

/// Writer-preferring shared handle around a [`Graph`].
///
/// `parking_lot`'s fair locking prevents writer starvation: a queued
/// writer blocks later readers. The `writelocked` flag is cleared BEFORE
/// the underlying lock is released, so a reader scheduled right after the
/// unlock can never observe itself as a writer.
///
/// The guards drive the version broker: readers pin the latest published
/// version for their whole hold, writers open the next version on
/// acquisition and publish it on release.
pub struct SharedGraph {
    inner: RwLock<Graph>,
    writelocked: AtomicBool,
    broker: Arc<VersionBroker>,
}

impl SharedGraph {
    pub fn new(graph: Graph) -> Self {
        let broker = Arc::clone(graph.version_broker());
        SharedGraph {
            inner: RwLock::new(graph),
            writelocked: AtomicBool::new(false),
            broker,
        }
    }

    /// The broker backing this graph's snapshot versions.
    pub fn version_broker(&self) -> &Arc<VersionBroker> {
        &self.broker
    }

    /// Many readers may hold simultaneously; never granted while a writer
    /// holds the lock. Pins the latest version for the calling thread.
    pub fn acquire_read(&self) -> GraphReadGuard<'_> {
        let guard = self.inner.read();
        self.broker.get_read_version();
        GraphReadGuard {
            guard,
            broker: &self.broker,
        }
    }

    /// Exclusive access; opens the next version for the calling thread.
    pub fn acquire_write(&self) -> GraphWriteGuard<'_> {
        let guard = self.inner.write();
        self.broker.get_write_version();
        self.writelocked.store(true, Ordering::Release);
        GraphWriteGuard {
            guard: ManuallyDrop::new(guard),
            writelocked: &self.writelocked,
            broker: &self.broker,
        }
    }

    pub fn is_write_locked(&self) -> bool {
        self.writelocked.load(Ordering::Acquire)
    }
}

/// Read guard returning the pinned version when it drops; objects a
/// writer superseded meanwhile are freed with the last such return.
pub struct GraphReadGuard<'a> {
    guard: RwLockReadGuard<'a, Graph>,
    broker: &'a VersionBroker,
}

impl std::ops::Deref for GraphReadGuard<'_> {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        &self.guard
    }
}

impl Drop for GraphReadGuard<'_> {
    fn drop(&mut self) {
        let _ = self.broker.return_read_version();
    }
}

/// Write guard clearing the `writelocked` flag and publishing the write
/// version before unlocking.
pub struct GraphWriteGuard<'a> {
    guard: ManuallyDrop<RwLockWriteGuard<'a, Graph>>,
    writelocked: &'a AtomicBool,
    broker: &'a VersionBroker,
}

impl std::ops::Deref for GraphWriteGuard<'_> {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        &self.guard
    }
}

impl std::ops::DerefMut for GraphWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Graph {
        &mut *self.guard
    }
}

impl Drop for GraphWriteGuard<'_> {
    fn drop(&mut self) {
        // flag first, then publish, then unlock: a reader entering right
        // after the unlock sees the new version and a clear flag
        self.writelocked.store(false, Ordering::Release);
        let _ = self.broker.return_write_version();
        // SAFETY: the guard is dropped exactly once, here
        unsafe { ManuallyDrop::drop(&mut self.guard) }
    }
}
