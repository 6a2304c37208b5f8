//! Per-label and per-relation cardinality statistics.
//!
//! Counts are updated incrementally as entities are created and deleted;
//! the traversal orderer and the host's info commands read them. Signed
//! arithmetic guards against transient underflow during bulk deletion.

/// Incrementally maintained graph statistics.
#[derive(Debug, Clone, Default)]
pub struct GraphStatistics {
    /// Node count per label id
    node_count: Vec<i64>,
    /// Edge count per relation id
    edge_count: Vec<i64>,
}

impl GraphStatistics {
    pub fn new() -> Self {
        GraphStatistics::default()
    }

    /// Extend the node-count table for a newly registered label.
    pub fn introduce_label(&mut self) {
        self.node_count.push(0);
    }

    /// Extend the edge-count table for a newly registered relation.
    pub fn introduce_relation(&mut self) {
        self.edge_count.push(0);
    }

    pub fn inc_node_count(&mut self, label: usize, amount: i64) {
        self.node_count[label] += amount;
    }

    pub fn dec_node_count(&mut self, label: usize, amount: i64) {
        debug_assert!(self.node_count[label] >= amount);
        self.node_count[label] -= amount;
    }

    pub fn inc_edge_count(&mut self, relation: usize, amount: i64) {
        self.edge_count[relation] += amount;
    }

    pub fn dec_edge_count(&mut self, relation: usize, amount: i64) {
        debug_assert!(self.edge_count[relation] >= amount);
        self.edge_count[relation] -= amount;
    }

    /// Nodes carrying the given label.
    pub fn node_count(&self, label: usize) -> u64 {
        self.node_count.get(label).copied().unwrap_or(0).max(0) as u64
    }

    /// Edges of the given relation type.
    pub fn edge_count(&self, relation: usize) -> u64 {
        self.edge_count.get(relation).copied().unwrap_or(0).max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_track_introductions() {
        let mut stats = GraphStatistics::new();
        stats.introduce_label();
        stats.introduce_relation();
        stats.inc_node_count(0, 3);
        stats.dec_node_count(0, 1);
        stats.inc_edge_count(0, 2);

        assert_eq!(stats.node_count(0), 2);
        assert_eq!(stats.edge_count(0), 2);
        assert_eq!(stats.node_count(9), 0);
    }
}
